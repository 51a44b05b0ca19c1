//! `POST`/`PUT`/`PATCH`/`DELETE` per `spec.md` §4.E: column allow-list and
//! required-field validation, then a single parameterised statement
//! executed inside a transaction.

use regex::Regex;
use serde_json::{Map, Value};
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

use portway_common::MutationEnvelope;
use portway_registry::{ColumnMapping, SqlEndpoint};

use crate::error::{FieldError, SqlError};
use crate::pool::SqlPool;

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s.as_str()),
        Value::Number(n) => query.bind(n.as_f64().unwrap_or_default()),
        Value::Bool(b) => query.bind(*b),
        _ => query.bind(Option::<String>::None),
    }
}

fn validate_regex(
    column_validation: &std::collections::BTreeMap<String, portway_registry::ColumnValidationRule>,
    alias: &str,
    value: &Value,
) -> Result<(), FieldError> {
    let Some(rule) = column_validation.get(alias) else {
        return Ok(());
    };
    let Value::String(s) = value else {
        return Ok(());
    };
    let re = Regex::new(&rule.regex)
        .map_err(|e| FieldError::new(alias, format!("invalid ColumnValidation regex: {e}")))?;
    if re.is_match(s) {
        Ok(())
    } else {
        Err(FieldError::new(alias, rule.message.clone()))
    }
}

fn allowed_map(endpoint: &SqlEndpoint) -> Vec<ColumnMapping> {
    endpoint.allowed_columns()
}

fn find_alias<'a>(columns: &'a [ColumnMapping], alias: &str) -> Option<&'a ColumnMapping> {
    columns.iter().find(|c| c.alias == alias)
}

/// Validates a request body's keys against `AllowedColumns`, and (for
/// inserts or PUT) that every required column is present. Collects every
/// field failure rather than stopping at the first, per `spec.md` §8
/// scenario 2's `details` array.
fn validate_body(
    endpoint: &SqlEndpoint,
    body: &Map<String, Value>,
    require_all_required_columns: bool,
) -> Result<Vec<ColumnMapping>, SqlError> {
    let columns = allowed_map(endpoint);
    let mut used = Vec::new();
    let mut errors = Vec::new();
    for key in body.keys() {
        let Some(mapping) = find_alias(&columns, key) else {
            errors.push(FieldError::new(key, "unknown column"));
            continue;
        };
        if let Some(value) = body.get(key) {
            if let Err(e) = validate_regex(&endpoint.column_validation, key, value) {
                errors.push(e);
            }
        }
        used.push(mapping.clone());
    }
    if require_all_required_columns {
        for required in &endpoint.required_columns {
            if !body.contains_key(required) {
                errors.push(FieldError::new(required, "required"));
            }
        }
    }
    if !errors.is_empty() {
        return Err(SqlError::Validation(errors));
    }
    Ok(used)
}

pub async fn insert(
    pool: &SqlPool,
    endpoint: &SqlEndpoint,
    body: &Map<String, Value>,
) -> Result<MutationEnvelope, SqlError> {
    let used = validate_body(endpoint, body, true)?;
    if used.is_empty() {
        return Err(SqlError::Validation(vec![FieldError::new(
            "",
            "request body has no columns",
        )]));
    }

    if let Some(procedure) = &endpoint.procedure {
        let placeholders = vec!["?"; used.len()].join(", ");
        let sql = format!("EXEC [{}].[{procedure}] {placeholders}", endpoint.schema);
        let mut query = sqlx::query(&sql);
        for mapping in &used {
            query = bind_value(query, &body[mapping.alias.as_str()]);
        }
        query.execute(pool).await?;
        return Ok(MutationEnvelope::success("executed"));
    }

    let db_cols: Vec<&str> = used.iter().map(|m| m.db_column.as_str()).collect();
    let placeholders = vec!["?"; used.len()].join(", ");
    let sql = format!(
        "INSERT INTO [{}].[{}] ({}) VALUES ({placeholders})",
        endpoint.schema,
        endpoint.object_name,
        db_cols
            .iter()
            .map(|c| format!("[{c}]"))
            .collect::<Vec<_>>()
            .join(", "),
    );
    let mut tx = pool.begin().await?;
    let mut query = sqlx::query(&sql);
    for mapping in &used {
        query = bind_value(query, &body[mapping.alias.as_str()]);
    }
    query.execute(&mut *tx).await?;
    tx.commit().await?;

    let envelope = MutationEnvelope::success("created");
    let envelope = match endpoint.primary_key.as_deref().and_then(|pk| body.get(pk)) {
        Some(pk_value) => envelope.with_id(pk_value.clone()),
        None => envelope,
    };
    Ok(envelope)
}

pub async fn update(
    pool: &SqlPool,
    endpoint: &SqlEndpoint,
    id: &str,
    body: &Map<String, Value>,
    require_full_set: bool,
) -> Result<MutationEnvelope, SqlError> {
    let pk_alias = endpoint
        .primary_key
        .as_ref()
        .ok_or(SqlError::PrimaryKeyRequired)?;
    let used = validate_body(endpoint, body, require_full_set)?;
    if used.is_empty() {
        return Err(SqlError::Validation(vec![FieldError::new(
            "",
            "request body has no columns",
        )]));
    }
    let columns = allowed_map(endpoint);
    let pk_db = find_alias(&columns, pk_alias)
        .map(|m| m.db_column.clone())
        .ok_or(SqlError::PrimaryKeyRequired)?;

    let assignments = used
        .iter()
        .map(|m| format!("[{}] = ?", m.db_column))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE [{}].[{}] SET {assignments} WHERE [{pk_db}] = ?",
        endpoint.schema, endpoint.object_name,
    );

    let mut tx = pool.begin().await?;
    let mut query = sqlx::query(&sql);
    for mapping in &used {
        query = bind_value(query, &body[mapping.alias.as_str()]);
    }
    query = query.bind(id.to_owned());
    let result = query.execute(&mut *tx).await?;
    tx.commit().await?;

    if result.rows_affected() == 0 {
        return Err(SqlError::NotFound);
    }
    Ok(MutationEnvelope::success("updated").with_rows_affected(result.rows_affected()))
}

pub async fn delete(
    pool: &SqlPool,
    endpoint: &SqlEndpoint,
    id: &str,
) -> Result<MutationEnvelope, SqlError> {
    let pk_alias = endpoint
        .primary_key
        .as_ref()
        .ok_or(SqlError::PrimaryKeyRequired)?;
    let columns = allowed_map(endpoint);
    let pk_db = find_alias(&columns, pk_alias)
        .map(|m| m.db_column.clone())
        .ok_or(SqlError::PrimaryKeyRequired)?;

    let mut tx = pool.begin().await?;
    let result = if let Some(procedure) = &endpoint.procedure {
        let sql = format!("EXEC [{}].[{procedure}] ?", endpoint.schema);
        sqlx::query(&sql).bind(id.to_owned()).execute(&mut *tx).await?
    } else {
        let sql = format!(
            "DELETE FROM [{}].[{}] WHERE [{pk_db}] = ?",
            endpoint.schema, endpoint.object_name,
        );
        sqlx::query(&sql).bind(id.to_owned()).execute(&mut *tx).await?
    };
    tx.commit().await?;

    if result.rows_affected() == 0 {
        return Err(SqlError::NotFound);
    }
    Ok(MutationEnvelope::success("deleted").with_rows_affected(result.rows_affected()))
}
