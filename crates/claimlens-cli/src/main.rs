//! `claimlens` — reserve estimation and explanation for FNOL narratives.

mod analyze;
mod artifacts;
mod display;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::artifacts::ArtifactBundle;

/// The demo narrative from the original reserve-optimization study.
const DEFAULT_NARRATIVE: &str = "Employee was struck by a falling pallet in the warehouse, \
resulting in a fractured leg and emergency hospitalization.";

#[derive(Parser)]
#[command(
    name = "claimlens",
    version,
    about = "Estimate claim reserves from FNOL narratives, with SHAP explanations"
)]
struct Cli {
    /// Directory containing the pretrained artifacts.
    #[arg(long, default_value = "models", env = "CLAIMLENS_MODELS_DIR", global = true)]
    models_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one claim narrative.
    Analyze {
        /// Narrative text (defaults to the sample warehouse incident).
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the narrative from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// How many attribution drivers to display.
        #[arg(long, default_value_t = 12)]
        top: usize,

        /// Emit the full report as JSON instead of the card view.
        #[arg(long)]
        json: bool,
    },
    /// Summarize the loaded artifacts.
    Inspect,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load once; any failure here is fatal before the first request.
    let mut bundle = ArtifactBundle::load(&cli.models_dir)
        .context("failed to load model artifacts; no analysis is possible")?;

    match cli.command {
        Command::Analyze {
            text,
            file,
            top,
            json,
        } => {
            let narrative = match (text, file) {
                (Some(t), _) => t,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading narrative from {}", path.display()))?,
                (None, None) => DEFAULT_NARRATIVE.to_string(),
            };

            let report = analyze::run_analysis(&mut bundle, narrative.trim())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                display::print_report(&report, top);
            }
        }
        Command::Inspect => display::print_inspect(&bundle),
    }

    Ok(())
}
