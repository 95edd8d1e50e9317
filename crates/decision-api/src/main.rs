//! decision-api: thin HTTP dispatch layer over the regime/allocation engine
//! crates (§6.3). Routes parse query/body, call into a core crate, and
//! serialize the `{ok, ...}` / `{ok: false, error, message}` envelope — no
//! business logic lives here.

mod error;
mod response;
mod routes;
mod state;

use std::path::PathBuf;

use decision_store::{InMemoryDecisionStore, SqlDecisionStore};
use regime_core::DecisionConfig;
use state::{AppState, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "decision_api=info".into()),
        )
        .init();

    let config_path = std::env::var("DECISION_CONFIG_PATH").ok().map(PathBuf::from);
    let config = DecisionConfig::load(config_path.as_deref())?;

    let store = match SqlDecisionStore::new(&config.database_url).await {
        Ok(sql) => {
            tracing::info!(database_url = %config.database_url, "connected decision-store");
            Store::Sql(sql)
        }
        Err(err) => {
            tracing::warn!(%err, "falling back to in-memory decision-store");
            Store::Memory(InMemoryDecisionStore::new())
        }
    };

    let bind_address = config.bind_address.clone();
    let state = AppState::new(store, config);
    let app = routes::app_router(state);

    tracing::info!(%bind_address, "decision-api listening");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
