//! Command-line surface (§6.2's "CLI" offline counterpart to the HTTP
//! API), built on `clap`'s `#[derive(Parser)]` / `#[derive(Subcommand)]`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline/batch driver for the regime-decision engine", long_about = None)]
pub struct Cli {
    /// Path to a DecisionConfig TOML file (falls back to built-in defaults + env overrides).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `DecisionConfig::database_url` for this invocation.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Brain Orchestrator once over a world state + forecast bundle.
    Decide {
        /// JSON file holding `{ "world": WorldState, "forecasts": ForecastBundle }`.
        #[arg(long)]
        input: PathBuf,
    },
    /// Run the Per-Horizon Calibrator over a dataset and persist the resulting version.
    Calibrate {
        /// JSON file holding `{ "dataset": CalibrationDataset, "search": SearchConfig }`.
        #[arg(long)]
        input: PathBuf,
    },
    /// Run the Walk-Forward Simulator over a sample sequence and persist the report.
    Simulate {
        /// JSON file holding `{ "samples": [SimulationSample], "span_years": f64 }`.
        #[arg(long)]
        input: PathBuf,
    },
    /// Evaluate the Promotion Gate against a simulation report and, if it
    /// recommends promotion, swap the active calibration version.
    Promote {
        /// JSON file holding a `PromoteCommandInput` (see `commands::promote`).
        #[arg(long)]
        input: PathBuf,
    },
}
