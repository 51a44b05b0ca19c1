//! Executes a compiled table-valued-function/procedure call (`portway_odata::tvf`)
//! and maps the resulting rowset using the driver's own reported column
//! names, since a TVF/procedure has no `AllowedColumns` alias map.

use sqlx::any::AnyRow;
use sqlx::{Column, Row};

use portway_odata::CompiledCall;

use crate::bind::bind_all;
use crate::error::SqlError;
use crate::placeholder::to_any_placeholders;
use crate::pool::{column_to_json, SqlPool};

fn row_to_json(row: &AnyRow) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    for column in row.columns() {
        let name = column.name().to_owned();
        let value = column_to_json(row, &name);
        object.insert(name, value);
    }
    serde_json::Value::Object(object)
}

pub async fn call(pool: &SqlPool, compiled: &CompiledCall) -> Result<Vec<serde_json::Value>, SqlError> {
    let sql = to_any_placeholders(&compiled.sql);
    let query = bind_all(sqlx::query(&sql), &compiled.params);
    let rows = query.fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}
