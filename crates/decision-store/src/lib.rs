//! Persistent store (§6.2).
//!
//! Collections are key/value with secondary indices, addressed through the
//! `DecisionStore` trait so the pipeline never depends on a concrete
//! backend. `SqlDecisionStore` persists via `sqlx::AnyPool`;
//! `InMemoryDecisionStore` backs tests and the dev fallback described in
//! §5 "Engine cache" / §7 degraded-mode behavior.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regime_core::types::{Date, MacroRegimeState};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Row;

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn upsert_regime_state(&self, state: &MacroRegimeState) -> Result<()>;
    async fn load_regime_history(&self, asset: &str, from: Date, to: Date) -> Result<Vec<MacroRegimeState>>;

    async fn put_regime_memory_state<T: Serialize + Send + Sync>(&self, scope: &str, value: &T) -> Result<()>
    where
        T: 'async_trait;
    async fn get_regime_memory_state<T: DeserializeOwned>(&self, scope: &str) -> Result<Option<T>>;

    async fn put_calibration_version<T: Serialize + Send + Sync>(
        &self,
        version_id: &str,
        asset: &str,
        value: &T,
    ) -> Result<()>
    where
        T: 'async_trait;
    async fn get_calibration_version<T: DeserializeOwned>(&self, version_id: &str) -> Result<Option<T>>;
    async fn list_calibration_versions_for_asset<T: DeserializeOwned>(&self, asset: &str, limit: i64) -> Result<Vec<T>>;

    async fn set_active_params<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()>
    where
        T: 'async_trait;
    async fn get_active_params<T: DeserializeOwned>(&self, asset: &str) -> Result<Option<T>>;

    async fn append_param_history<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()>
    where
        T: 'async_trait;

    async fn put_tuning_run<T: Serialize + Send + Sync>(&self, run_id: &str, value: &T) -> Result<()>
    where
        T: 'async_trait;
    async fn get_tuning_run<T: DeserializeOwned>(&self, run_id: &str) -> Result<Option<T>>;
}

pub struct SqlDecisionStore {
    pool: AnyPool,
}

impl SqlDecisionStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("connecting to {database_url}"))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        let schema = include_str!("../schema.sql");
        for statement in schema.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Optimistic upsert: attempt an INSERT; on a unique-constraint
    /// violation, fall back to an UPDATE. Portable across the backends the
    /// `any` driver supports without relying on dialect-specific
    /// `ON CONFLICT` syntax.
    async fn upsert_keyed(
        &self,
        table: &str,
        key_col: &str,
        time_col: &str,
        key: &str,
        payload: &str,
        now: &str,
    ) -> Result<()> {
        let insert_sql = format!("INSERT INTO {table} ({key_col}, payload, {time_col}) VALUES ($1, $2, $3)");
        let insert_result = sqlx::query(&insert_sql)
            .bind(key)
            .bind(payload)
            .bind(now)
            .execute(&self.pool)
            .await;

        if insert_result.is_ok() {
            return Ok(());
        }

        let update_sql = format!("UPDATE {table} SET payload = $1, {time_col} = $2 WHERE {key_col} = $3");
        sqlx::query(&update_sql)
            .bind(payload)
            .bind(now)
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("upserting into {table}"))?;
        Ok(())
    }

    async fn load_payload<T: DeserializeOwned>(&self, table: &str, key_col: &str, key: &str) -> Result<Option<T>> {
        let sql = format!("SELECT payload FROM {table} WHERE {key_col} = $1");
        let row = sqlx::query(&sql).bind(key).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DecisionStore for SqlDecisionStore {
    async fn upsert_regime_state(&self, state: &MacroRegimeState) -> Result<()> {
        let payload = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        let key = format!("{}|{}", state.asset, state.date);
        // regime_state's primary key is (asset, date); model it as a single
        // composite key column value to reuse the generic upsert helper.
        let exists: Option<(String,)> = sqlx::query_as(
            "SELECT asset FROM regime_state WHERE asset = $1 AND date = $2",
        )
        .bind(&state.asset)
        .bind(state.date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        if exists.is_some() {
            sqlx::query("UPDATE regime_state SET payload = $1, created_at = $2 WHERE asset = $3 AND date = $4")
                .bind(&payload)
                .bind(&now)
                .bind(&state.asset)
                .bind(state.date.to_string())
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("INSERT INTO regime_state (asset, date, payload, created_at) VALUES ($1, $2, $3, $4)")
                .bind(&state.asset)
                .bind(state.date.to_string())
                .bind(&payload)
                .bind(&now)
                .execute(&self.pool)
                .await?;
        }
        let _ = key;
        Ok(())
    }

    async fn load_regime_history(&self, asset: &str, from: Date, to: Date) -> Result<Vec<MacroRegimeState>> {
        let rows = sqlx::query(
            "SELECT payload FROM regime_state WHERE asset = $1 AND date >= $2 AND date <= $3 ORDER BY date ASC",
        )
        .bind(asset)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                Ok(serde_json::from_str(&payload)?)
            })
            .collect()
    }

    async fn put_regime_memory_state<T: Serialize + Send + Sync>(&self, scope: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        self.upsert_keyed("regime_memory_state", "scope", "updated_at", scope, &payload, &now).await
    }

    async fn get_regime_memory_state<T: DeserializeOwned>(&self, scope: &str) -> Result<Option<T>> {
        self.load_payload("regime_memory_state", "scope", scope).await
    }

    async fn put_calibration_version<T: Serialize + Send + Sync>(
        &self,
        version_id: &str,
        asset: &str,
        value: &T,
    ) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO calibration_versions (version_id, asset, payload, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(version_id)
        .bind(asset)
        .bind(&payload)
        .bind(&now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting calibration version {version_id}"))?;
        Ok(())
    }

    async fn get_calibration_version<T: DeserializeOwned>(&self, version_id: &str) -> Result<Option<T>> {
        self.load_payload("calibration_versions", "version_id", version_id).await
    }

    async fn list_calibration_versions_for_asset<T: DeserializeOwned>(&self, asset: &str, limit: i64) -> Result<Vec<T>> {
        let rows = sqlx::query(
            "SELECT payload FROM calibration_versions WHERE asset = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(asset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                Ok(serde_json::from_str(&payload)?)
            })
            .collect()
    }

    async fn set_active_params<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        self.upsert_keyed("adaptive_active_params", "asset", "updated_at", asset, &payload, &now).await
    }

    async fn get_active_params<T: DeserializeOwned>(&self, asset: &str) -> Result<Option<T>> {
        self.load_payload("adaptive_active_params", "asset", asset).await
    }

    async fn append_param_history<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO adaptive_param_history (asset, payload, created_at) VALUES ($1, $2, $3)")
            .bind(asset)
            .bind(&payload)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn put_tuning_run<T: Serialize + Send + Sync>(&self, run_id: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        self.upsert_keyed("tuning_runs", "run_id", "created_at", run_id, &payload, &now).await
    }

    async fn get_tuning_run<T: DeserializeOwned>(&self, run_id: &str) -> Result<Option<T>> {
        self.load_payload("tuning_runs", "run_id", run_id).await
    }
}

/// In-process fallback store, used by tests and by callers that degrade to
/// memory-only persistence when no database is configured.
#[derive(Default)]
pub struct InMemoryDecisionStore {
    regime_state: DashMap<(String, Date), MacroRegimeState>,
    regime_memory_state: DashMap<String, serde_json::Value>,
    calibration_versions: DashMap<String, (String, DateTime<Utc>, serde_json::Value)>,
    active_params: DashMap<String, serde_json::Value>,
    param_history: DashMap<String, Vec<serde_json::Value>>,
    tuning_runs: DashMap<String, serde_json::Value>,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn upsert_regime_state(&self, state: &MacroRegimeState) -> Result<()> {
        self.regime_state.insert((state.asset.clone(), state.date), state.clone());
        Ok(())
    }

    async fn load_regime_history(&self, asset: &str, from: Date, to: Date) -> Result<Vec<MacroRegimeState>> {
        let mut out: Vec<MacroRegimeState> = self
            .regime_state
            .iter()
            .filter(|e| e.key().0 == asset && e.key().1 >= from && e.key().1 <= to)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|s| s.date);
        Ok(out)
    }

    async fn put_regime_memory_state<T: Serialize + Send + Sync>(&self, scope: &str, value: &T) -> Result<()> {
        self.regime_memory_state.insert(scope.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    async fn get_regime_memory_state<T: DeserializeOwned>(&self, scope: &str) -> Result<Option<T>> {
        match self.regime_memory_state.get(scope) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    async fn put_calibration_version<T: Serialize + Send + Sync>(
        &self,
        version_id: &str,
        asset: &str,
        value: &T,
    ) -> Result<()> {
        self.calibration_versions
            .insert(version_id.to_string(), (asset.to_string(), Utc::now(), serde_json::to_value(value)?));
        Ok(())
    }

    async fn get_calibration_version<T: DeserializeOwned>(&self, version_id: &str) -> Result<Option<T>> {
        match self.calibration_versions.get(version_id) {
            Some(entry) => Ok(Some(serde_json::from_value(entry.2.clone())?)),
            None => Ok(None),
        }
    }

    async fn list_calibration_versions_for_asset<T: DeserializeOwned>(&self, asset: &str, limit: i64) -> Result<Vec<T>> {
        let mut rows: Vec<(DateTime<Utc>, serde_json::Value)> = self
            .calibration_versions
            .iter()
            .filter(|e| e.value().0 == asset)
            .map(|e| (e.value().1, e.value().2.clone()))
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        rows.truncate(limit.max(0) as usize);
        rows.into_iter().map(|(_, v)| Ok(serde_json::from_value(v)?)).collect()
    }

    async fn set_active_params<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()> {
        self.active_params.insert(asset.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    async fn get_active_params<T: DeserializeOwned>(&self, asset: &str) -> Result<Option<T>> {
        match self.active_params.get(asset) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    async fn append_param_history<T: Serialize + Send + Sync>(&self, asset: &str, value: &T) -> Result<()> {
        self.param_history
            .entry(asset.to_string())
            .or_default()
            .push(serde_json::to_value(value)?);
        Ok(())
    }

    async fn put_tuning_run<T: Serialize + Send + Sync>(&self, run_id: &str, value: &T) -> Result<()> {
        self.tuning_runs.insert(run_id.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    async fn get_tuning_run<T: DeserializeOwned>(&self, run_id: &str) -> Result<Option<T>> {
        match self.tuning_runs.get(run_id) {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regime_core::types::MacroRegime;

    fn sample_state(asset: &str, date: Date) -> MacroRegimeState {
        MacroRegimeState {
            asset: asset.to_string(),
            date,
            dominant: MacroRegime::Neutral,
            posterior: [0.2; 5],
            persistence: 0.5,
            transition_hint: None,
            days_in_state: 1,
            flips_30d: 0,
            stability: 1.0,
        }
    }

    #[tokio::test]
    async fn in_memory_store_roundtrips_regime_history() {
        let store = InMemoryDecisionStore::new();
        let d1 = Date::from_ymd_opt(2024, 1, 1).unwrap();
        let d2 = Date::from_ymd_opt(2024, 1, 2).unwrap();
        store.upsert_regime_state(&sample_state("SPX", d1)).await.unwrap();
        store.upsert_regime_state(&sample_state("SPX", d2)).await.unwrap();

        let history = store.load_regime_history("SPX", d1, d2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, d1);
    }

    #[tokio::test]
    async fn in_memory_store_upserts_active_params() {
        let store = InMemoryDecisionStore::new();
        store.set_active_params("SPX", &"v1".to_string()).await.unwrap();
        store.set_active_params("SPX", &"v2".to_string()).await.unwrap();
        let active: Option<String> = store.get_active_params("SPX").await.unwrap();
        assert_eq!(active, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn in_memory_store_lists_calibration_versions_newest_first() {
        let store = InMemoryDecisionStore::new();
        store.put_calibration_version("v1", "SPX", &1u32).await.unwrap();
        store.put_calibration_version("v2", "SPX", &2u32).await.unwrap();
        let versions: Vec<u32> = store.list_calibration_versions_for_asset("SPX", 10).await.unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn sql_store_roundtrips_against_in_memory_sqlite() {
        let store = SqlDecisionStore::new("sqlite::memory:").await.unwrap();
        let d1 = Date::from_ymd_opt(2024, 1, 1).unwrap();
        store.upsert_regime_state(&sample_state("SPX", d1)).await.unwrap();
        let history = store.load_regime_history("SPX", d1, d1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].asset, "SPX");
    }
}
