//! A per-environment connection pool over `sqlx::any`, so one gateway
//! process can serve `postgres://`, `mysql://`, and `sqlite://` environment
//! backends side by side (`spec.md` §4.B "heterogeneous backends").

use std::time::Duration;

use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::Row;

pub type SqlPool = sqlx::AnyPool;

static INSTALL_DRIVERS: std::sync::Once = std::sync::Once::new();

pub async fn connect(
    database_url: &str,
    max_size: u32,
    acquire_timeout: Duration,
) -> Result<SqlPool, sqlx::Error> {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
    AnyPoolOptions::new()
        .max_connections(max_size)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Best-effort typed decode of one column into a JSON value: tries the
/// common SQL scalar types in turn and falls back to `Null` for anything a
/// backend can't report through `sqlx::any`'s narrowed type set.
pub fn column_to_json(row: &AnyRow, alias: &str) -> serde_json::Value {
    if let Ok(v) = row.try_get::<i64, _>(alias) {
        return serde_json::Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(alias) {
        return serde_json::Number::from_f64(v)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<bool, _>(alias) {
        return serde_json::Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(alias) {
        return serde_json::Value::from(v);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(alias) {
        return v.map(serde_json::Value::from).unwrap_or(serde_json::Value::Null);
    }
    serde_json::Value::Null
}
