//! Sigmoid chart: the analytic logistic curve with the per-ID predictions on top.

use crate::config::PlotSettings;
use crate::model::sigmoid;
use crate::synthetic::PredictionRow;
use ndarray::Array1;
use plotly::common::{Line, Marker, Mode, Position};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to write the plot to '{path}': {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
    #[error(
        "Could not start the plot viewer '{launcher}': {source}. Use --no-plot or --plot-html on a machine without a desktop."
    )]
    ViewerUnavailable {
        launcher: String,
        source: std::io::Error,
    },
    #[error("The plot viewer '{launcher}' exited with {status}.")]
    ViewerFailed {
        launcher: String,
        status: ExitStatus,
    },
}

const VIEWER_FILE_NAME: &str = "logit-risk-sigmoid.html";

pub const PLOT_TITLE: &str = "Sigmoid Function and Breast Cancer Predictions";

/// `samples` evenly spaced points on `[x_min, x_max]` and the sigmoid at each.
pub fn sigmoid_curve(x_min: f64, x_max: f64, samples: usize) -> (Array1<f64>, Array1<f64>) {
    let xs = Array1::linspace(x_min, x_max, samples);
    let ys = xs.mapv(sigmoid);
    (xs, ys)
}

/// Curve trace plus one labelled marker per ID, placed at
/// (sigmoid value, probability).
pub fn build_sigmoid_plot(rows: &[PredictionRow], settings: &PlotSettings) -> Plot {
    let (xs, ys) = sigmoid_curve(settings.x_min, settings.x_max, settings.samples);

    let curve = Scatter::new(xs.to_vec(), ys.to_vec())
        .name("Sigmoid Function")
        .mode(Mode::Lines)
        .line(Line::new().color("blue"));

    let points = Scatter::new(
        rows.iter().map(|r| r.sigmoid_value).collect::<Vec<_>>(),
        rows.iter().map(|r| r.probability).collect::<Vec<_>>(),
    )
    .name("Breast Cancer Predictions")
    .mode(Mode::MarkersText)
    .text_array(rows.iter().map(|r| r.person_id.to_string()).collect::<Vec<_>>())
    .text_position(Position::TopRight)
    .marker(Marker::new().color("red"));

    let mut plot = Plot::new();
    plot.add_trace(curve);
    plot.add_trace(points);
    plot.set_layout(
        Layout::new()
            .title(PLOT_TITLE)
            .x_axis(Axis::new().title("Sigmoid Value").show_grid(true))
            .y_axis(Axis::new().title("Probability of Breast Cancer").show_grid(true))
            .show_legend(true),
    );
    plot
}

fn write_html(plot: &Plot, path: &Path) -> Result<(), PlotError> {
    fs::write(path, plot.to_html()).map_err(|source| PlotError::WriteFailed {
        path: path.display().to_string(),
        source,
    })
}

/// The configured viewer, or the platform's default opener.
fn viewer_command(settings: &PlotSettings, target: &Path) -> Command {
    if let Some(viewer) = &settings.viewer {
        let mut command = Command::new(viewer);
        command.arg(target);
        return command;
    }
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    command.arg(target);
    command
}

/// Writes the chart to HTML and/or opens it in a viewer, per `settings`.
pub fn render(plot: &Plot, settings: &PlotSettings) -> Result<(), PlotError> {
    if let Some(path) = &settings.html_path {
        write_html(plot, path)?;
        log::info!("Sigmoid plot written to {}", path.display());
    }
    if !settings.show {
        return Ok(());
    }

    let target: PathBuf = match &settings.html_path {
        Some(path) => path.clone(),
        None => {
            let path = std::env::temp_dir().join(VIEWER_FILE_NAME);
            write_html(plot, &path)?;
            path
        }
    };
    let mut command = viewer_command(settings, &target);
    let launcher = command.get_program().to_string_lossy().into_owned();
    log::debug!("Opening {} with '{launcher}'", target.display());
    let status = command
        .status()
        .map_err(|source| PlotError::ViewerUnavailable {
            launcher: launcher.clone(),
            source,
        })?;
    if !status.success() {
        return Err(PlotError::ViewerFailed { launcher, status });
    }
    Ok(())
}
