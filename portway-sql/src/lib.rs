//! The SQL Handler (`spec.md` §4.E): executes `GET`/`POST`/`PUT`/`PATCH`/
//! `DELETE` against a [`SqlEndpoint`] using the compiled OData query
//! (`portway-odata`) or the table-valued-function/procedure call
//! compiler.

mod bind;
pub mod error;
mod list;
mod mutate;
mod placeholder;
mod pool;
mod tvf_exec;

pub use error::SqlError;
pub use pool::{connect, SqlPool};

use portway_common::{ListEnvelope, MutationEnvelope};
use portway_odata::{ParamValue, TvfParamSpec};
use portway_odata::ODataQuery;
use portway_registry::{ObjectType, SqlEndpoint};
use serde_json::{Map, Value};

/// Executes the SQL-endpoint contract of `spec.md` §4.E against one
/// environment's pool.
pub struct SqlHandler<'a> {
    pool: &'a SqlPool,
}

impl<'a> SqlHandler<'a> {
    pub fn new(pool: &'a SqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        endpoint: &SqlEndpoint,
        query: &ODataQuery,
    ) -> Result<ListEnvelope, SqlError> {
        list::list(self.pool, endpoint, query).await
    }

    pub async fn insert(
        &self,
        endpoint: &SqlEndpoint,
        body: &Map<String, serde_json::Value>,
    ) -> Result<MutationEnvelope, SqlError> {
        mutate::insert(self.pool, endpoint, body).await
    }

    /// `is_patch = true` only validates the keys actually present in
    /// `body`; `is_patch = false` (PUT) requires the full required-column
    /// set, per `spec.md` §4.E.
    pub async fn update(
        &self,
        endpoint: &SqlEndpoint,
        id: &str,
        body: &Map<String, serde_json::Value>,
        is_patch: bool,
    ) -> Result<MutationEnvelope, SqlError> {
        mutate::update(self.pool, endpoint, id, body, !is_patch).await
    }

    pub async fn delete(&self, endpoint: &SqlEndpoint, id: &str) -> Result<MutationEnvelope, SqlError> {
        mutate::delete(self.pool, endpoint, id).await
    }

    /// Invokes a `TableValuedFunction`/`StoredProcedure` endpoint with its
    /// positional parameters already resolved to [`ParamValue`]s.
    pub async fn call(
        &self,
        endpoint: &SqlEndpoint,
        specs: &[TvfParamSpec],
        values: &[ParamValue],
    ) -> Result<Vec<Value>, SqlError> {
        let as_tvf = matches!(endpoint.object_type, ObjectType::TableValuedFunction);
        let compiled = portway_odata::compile_call(
            &endpoint.schema,
            &endpoint.object_name,
            as_tvf,
            specs,
            values,
        )?;
        tvf_exec::call(self.pool, &compiled).await
    }
}
