//! Shared application state: a small `Clone` struct wrapping an `Arc`
//! around whatever can't be cheaply cloned, in the `AppState`/
//! `State<AppState>` style axum services commonly use.

use std::sync::Arc;

use async_trait::async_trait;
use decision_store::{DecisionStore, InMemoryDecisionStore, SqlDecisionStore};
use regime_core::types::{Date, MacroRegimeState};
use serde::{de::DeserializeOwned, Serialize};

/// Either backend, so `AppState` never needs a trait object for a trait with
/// generic methods (which would not be object-safe).
pub enum Store {
    Sql(SqlDecisionStore),
    Memory(InMemoryDecisionStore),
}

#[async_trait]
impl DecisionStore for Store {
    async fn upsert_regime_state(&self, state: &MacroRegimeState) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.upsert_regime_state(state).await,
            Store::Memory(s) => s.upsert_regime_state(state).await,
        }
    }

    async fn load_regime_history(&self, asset: &str, from: Date, to: Date) -> anyhow::Result<Vec<MacroRegimeState>> {
        match self {
            Store::Sql(s) => s.load_regime_history(asset, from, to).await,
            Store::Memory(s) => s.load_regime_history(asset, from, to).await,
        }
    }

    async fn put_regime_memory_state<T: Serialize + Send + Sync>(&self, scope: &str, value: &T) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.put_regime_memory_state(scope, value).await,
            Store::Memory(s) => s.put_regime_memory_state(scope, value).await,
        }
    }

    async fn get_regime_memory_state<T: DeserializeOwned>(&self, scope: &str) -> anyhow::Result<Option<T>> {
        match self {
            Store::Sql(s) => s.get_regime_memory_state(scope).await,
            Store::Memory(s) => s.get_regime_memory_state(scope).await,
        }
    }

    async fn put_calibration_version<T: Serialize + Send + Sync>(
        &self,
        version_id: &str,
        asset: &str,
        value: &T,
    ) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.put_calibration_version(version_id, asset, value).await,
            Store::Memory(s) => s.put_calibration_version(version_id, asset, value).await,
        }
    }

    async fn get_calibration_version<T: DeserializeOwned>(&self, version_id: &str) -> anyhow::Result<Option<T>> {
        match self {
            Store::Sql(s) => s.get_calibration_version(version_id).await,
            Store::Memory(s) => s.get_calibration_version(version_id).await,
        }
    }

    async fn list_calibration_versions_for_asset<T: DeserializeOwned>(
        &self,
        asset: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<T>> {
        match self {
            Store::Sql(s) => s.list_calibration_versions_for_asset(asset, limit).await,
            Store::Memory(s) => s.list_calibration_versions_for_asset(asset, limit).await,
        }
    }

    async fn set_active_params<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.set_active_params(asset, value).await,
            Store::Memory(s) => s.set_active_params(asset, value).await,
        }
    }

    async fn get_active_params<T: DeserializeOwned>(&self, asset: &str) -> anyhow::Result<Option<T>> {
        match self {
            Store::Sql(s) => s.get_active_params(asset).await,
            Store::Memory(s) => s.get_active_params(asset).await,
        }
    }

    async fn append_param_history<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.append_param_history(asset, value).await,
            Store::Memory(s) => s.append_param_history(asset, value).await,
        }
    }

    async fn put_tuning_run<T: Serialize + Send + Sync>(&self, run_id: &str, value: &T) -> anyhow::Result<()> {
        match self {
            Store::Sql(s) => s.put_tuning_run(run_id, value).await,
            Store::Memory(s) => s.put_tuning_run(run_id, value).await,
        }
    }

    async fn get_tuning_run<T: DeserializeOwned>(&self, run_id: &str) -> anyhow::Result<Option<T>> {
        match self {
            Store::Sql(s) => s.get_tuning_run(run_id).await,
            Store::Memory(s) => s.get_tuning_run(run_id).await,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<regime_core::DecisionConfig>,
}

impl AppState {
    pub fn new(store: Store, config: regime_core::DecisionConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}
