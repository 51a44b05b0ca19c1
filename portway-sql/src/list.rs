//! `GET` (list) per `spec.md` §4.E: compile the OData query, run it,
//! produce `{count, value, nextLink?}`.

use portway_common::ListEnvelope;
use portway_odata::{
    compile_filter, compile_orderby, compile_paging, compile_projection, ColumnMap, ODataQuery,
};
use portway_registry::SqlEndpoint;

use crate::bind::bind_all;
use crate::error::SqlError;
use crate::pool::{column_to_json, SqlPool};

fn column_map(endpoint: &SqlEndpoint) -> ColumnMap {
    ColumnMap::new(
        endpoint
            .allowed_columns()
            .into_iter()
            .map(|m| (m.alias, m.db_column)),
    )
}

pub(crate) struct CompiledList {
    pub sql: String,
    pub params: Vec<portway_odata::Literal>,
    pub aliases: Vec<String>,
    pub effective_top: u32,
    pub effective_skip: u32,
}

/// The pure, driver-independent half of `list()`: everything up to "what
/// SQL text and bindings would we run", so it can be unit tested without a
/// pool.
pub(crate) fn compile(endpoint: &SqlEndpoint, query: &ODataQuery) -> Result<CompiledList, SqlError> {
    let columns = column_map(endpoint);
    let projection = compile_projection(&query.select, &columns)?;

    let mut where_clause = String::new();
    let mut params = Vec::new();
    if let Some(expr) = &query.filter {
        let compiled = compile_filter(expr, &columns)?;
        where_clause = format!(" WHERE {}", compiled.sql);
        params = compiled.params;
    }

    let pk_db = endpoint
        .primary_key
        .as_deref()
        .and_then(|pk| columns.db_column(pk));
    let orderby = compile_orderby(&query.orderby, &columns, pk_db)?;
    let (paging, effective_top, effective_skip) =
        compile_paging(query.top, query.skip, endpoint.max_rows);

    let sql = format!(
        "SELECT {projection} FROM [{}].[{}]{where_clause} {orderby} {paging}",
        endpoint.schema, endpoint.object_name,
    );

    let aliases: Vec<String> = if query.select.is_empty() {
        columns.aliases().map(str::to_owned).collect()
    } else {
        query.select.clone()
    };

    Ok(CompiledList {
        sql,
        params,
        aliases,
        effective_top,
        effective_skip,
    })
}

pub async fn list(
    pool: &SqlPool,
    endpoint: &SqlEndpoint,
    query: &ODataQuery,
) -> Result<ListEnvelope, SqlError> {
    let compiled = compile(endpoint, query)?;
    let executable = crate::placeholder::to_any_placeholders(&compiled.sql);
    let CompiledList {
        params,
        aliases,
        effective_top,
        effective_skip,
        ..
    } = compiled;

    let sql_query = bind_all(sqlx::query(&executable), &params);
    let rows = sql_query.fetch_all(pool).await?;

    let value: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            for alias in &aliases {
                object.insert(alias.clone(), column_to_json(row, alias));
            }
            serde_json::Value::Object(object)
        })
        .collect();

    let next_link = if value.len() as u32 == effective_top {
        Some(format!(
            "?$top={effective_top}&$skip={}",
            effective_skip + effective_top
        ))
    } else {
        None
    };

    Ok(ListEnvelope::new(value, next_link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use portway_registry::{EndpointMeta, HttpMethod, ObjectType};
    use serde_json::Map;

    fn items_endpoint() -> SqlEndpoint {
        SqlEndpoint {
            meta: EndpointMeta {
                name: "Items".to_owned(),
                namespace: None,
                allowed_methods: vec![HttpMethod::Get],
                is_private: false,
                extra: Map::new(),
            },
            schema: "dbo".to_owned(),
            object_name: "Items".to_owned(),
            object_type: ObjectType::Table,
            primary_key: Some("Code".to_owned()),
            allowed_columns_raw: vec!["Code:ItemCode".to_owned(), "Desc:Description".to_owned()],
            required_columns: vec![],
            column_validation: Default::default(),
            parameters: vec![],
            procedure: None,
            max_rows: 1000,
        }
    }

    #[test]
    fn compiles_filtered_select_with_ordering_and_paging() {
        let endpoint = items_endpoint();
        let query = ODataQuery::parse(&[
            ("$select".to_owned(), "Code".to_owned()),
            ("$top".to_owned(), "2".to_owned()),
            ("$filter".to_owned(), "Code eq 'A1'".to_owned()),
        ])
        .unwrap();
        let compiled = compile(&endpoint, &query).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT [ItemCode] AS [Code] FROM [dbo].[Items] WHERE [ItemCode] = @p0 ORDER BY [ItemCode] OFFSET 0 ROWS FETCH NEXT 2 ROWS ONLY"
        );
        assert_eq!(compiled.params.len(), 1);
        assert_eq!(compiled.effective_top, 2);
    }

    #[test]
    fn falls_back_to_primary_key_ordering_when_orderby_is_absent() {
        let endpoint = items_endpoint();
        let query = ODataQuery::default();
        let compiled = compile(&endpoint, &query).unwrap();
        assert!(compiled.sql.contains("ORDER BY [ItemCode]"));
    }
}
