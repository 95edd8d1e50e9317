//! decision-cli: offline/batch driver for the regime-decision engine
//! (§6.2), exposing `decide`, `calibrate`, `simulate`, and `promote` as
//! subcommands for use without the HTTP layer — e.g. scheduled batch jobs or
//! local experimentation.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use decision_store::{InMemoryDecisionStore, SqlDecisionStore};
use regime_core::DecisionConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "decision_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = DecisionConfig::load(cli.config.as_deref())?;
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    match cli.command {
        Commands::Decide { input } => {
            commands::decide(&input)?;
        }
        Commands::Calibrate { input } => match SqlDecisionStore::new(&config.database_url).await {
            Ok(store) => commands::calibrate(&input, &store).await?,
            Err(err) => {
                tracing::warn!(%err, "falling back to in-memory decision-store");
                commands::calibrate(&input, &InMemoryDecisionStore::new()).await?
            }
        },
        Commands::Simulate { input } => match SqlDecisionStore::new(&config.database_url).await {
            Ok(store) => commands::simulate(&input, &store).await?,
            Err(err) => {
                tracing::warn!(%err, "falling back to in-memory decision-store");
                commands::simulate(&input, &InMemoryDecisionStore::new()).await?
            }
        },
        Commands::Promote { input } => match SqlDecisionStore::new(&config.database_url).await {
            Ok(store) => commands::promote(&input, &store).await?,
            Err(err) => {
                tracing::warn!(%err, "falling back to in-memory decision-store");
                commands::promote(&input, &InMemoryDecisionStore::new()).await?
            }
        },
    }

    Ok(())
}
