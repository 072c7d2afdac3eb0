// ========================================================================================
//
//                         THE RUN ORCHESTRATOR: LOGIT-RISK
//
// ========================================================================================
//
// This binary conducts one linear pass over the library:
//
// 1.  **Configuration:** merge the optional TOML file with command-line overrides.
// 2.  **Data:** load the spreadsheet export, drop incomplete rows, select columns.
// 3.  **Fit:** train the imputation + logistic regression pipeline once.
// 4.  **Predict:** score the synthetic ID batch through the pipeline and the
//     sigmoid transformer.
// 5.  **Evaluate:** report accuracy on the leading training rows.
// 6.  **Plot:** draw the sigmoid curve with the predictions overlaid.

use clap::{Parser, ValueEnum};
use logit_risk::config::{RunConfig, Solver};
use logit_risk::data::load_training_data;
use logit_risk::evaluate::evaluate_head;
use logit_risk::pipeline::ClassifierPipeline;
use logit_risk::synthetic::{
    SyntheticBatch, format_prediction_table, predict_batch, write_predictions,
};
use logit_risk::visualizer::{build_sigmoid_plot, render};
use std::path::PathBuf;
use std::process;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Clone, Copy, ValueEnum)]
enum SolverCli {
    Irls,
    Bfgs,
}

impl From<SolverCli> for Solver {
    fn from(value: SolverCli) -> Self {
        match value {
            SolverCli::Irls => Solver::Irls,
            SolverCli::Bfgs => Solver::Bfgs,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "logit-risk",
    version,
    about = "Fit a logistic regression risk model and plot its predictions on the sigmoid curve",
    long_about = "Reads a CSV/TSV export of a spreadsheet with smoker, alcoholic, pregnant and \
                  'breast cancer' columns, fits a mean-imputation + logistic regression pipeline, \
                  prints predicted probabilities for synthetic IDs and the training accuracy, and \
                  plots the predictions on the sigmoid curve."
)]
struct Cli {
    /// Path to the input CSV/TSV file. Overrides `data.path` from the config file.
    data: Option<PathBuf>,

    /// Optional TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Optimizer used to fit the classifier
    #[arg(long, value_enum)]
    solver: Option<SolverCli>,

    /// Do not open the plot viewer
    #[arg(long)]
    no_plot: bool,

    /// Also write the plot to this HTML file
    #[arg(long, value_name = "PATH")]
    plot_html: Option<PathBuf>,

    /// Write the prediction table to this TSV file
    #[arg(long, value_name = "PATH")]
    predictions_out: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Applies command-line overrides on top of the (possibly default) file configuration.
fn resolve_config(cli: Cli) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            RunConfig::load(path)?
        }
        None => RunConfig::default(),
    };

    if let Some(data) = cli.data {
        config.data.path = Some(data);
    }
    if let Some(solver) = cli.solver {
        config.model.solver = solver.into();
    }
    if cli.no_plot {
        config.plot.show = false;
    }
    if let Some(path) = cli.plot_html {
        config.plot.html_path = Some(path);
    }
    if let Some(path) = cli.predictions_out {
        config.output.predictions = Some(path);
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;
    let data_path = config.data_path()?;

    // --- Data ---
    let data = load_training_data(data_path, &config.data)?;

    // --- Fit ---
    let pipeline =
        ClassifierPipeline::fit(data.features.view(), data.target.view(), &config.model)?;

    // --- Predict ---
    let means = data
        .feature_means()
        .ok_or("training data has no rows to average")?;
    let batch = SyntheticBatch::from_means(means.view(), config.synthetic.count);
    let rows = predict_batch(&pipeline, &batch)?;

    println!("Predicted probabilities and sigmoid values of breast cancer for all IDs:");
    print!("{}", format_prediction_table(&rows));

    if let Some(path) = &config.output.predictions {
        write_predictions(&rows, path)?;
        log::info!("Predictions saved to: {}", path.display());
    }

    // --- Evaluate ---
    let evaluation = evaluate_head(&pipeline, &data, config.evaluation.rows)?;
    println!("Model Evaluation Metrics:");
    println!("Accuracy: {:?}", evaluation.accuracy);

    // --- Plot ---
    let plot = build_sigmoid_plot(&rows, &config.plot);
    render(&plot, &config.plot)?;

    Ok(())
}
