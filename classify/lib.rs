#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod data;
pub mod estimate;
pub mod evaluate;
pub mod impute;
pub mod irls;
pub mod model;
pub mod pipeline;
pub mod synthetic;
pub mod visualizer;
