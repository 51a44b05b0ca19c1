//! Routes a request at a [`SqlEndpoint`] to `portway-sql` (`spec.md` §4.E):
//! `GET` lists a table/view or invokes a TVF/procedure; `POST` inserts or
//! calls a procedure; `PUT`/`PATCH`/`DELETE` mutate by primary key.

use std::collections::HashMap;

use actix_web::HttpRequest;
use portway_common::{ListEnvelope, MutationEnvelope, PortwayError};
use portway_odata::{ODataQuery, ParamValue, TvfParamSpec};
use portway_registry::{ObjectType, ParamSource, SqlEndpoint};
use portway_sql::SqlHandler;
use regex::Regex;
use serde_json::{Map, Value};

pub enum SqlResponse {
    List(ListEnvelope),
    Rows(Vec<Value>),
    Mutation(MutationEnvelope),
}

fn resolve_param_value(
    param: &portway_registry::TvfParameter,
    path_rest: &[String],
    query: &HashMap<String, String>,
    req: &HttpRequest,
) -> Result<ParamValue, PortwayError> {
    let raw = match param.source {
        ParamSource::Path => param
            .position
            .and_then(|p| path_rest.get((p - 1) as usize))
            .cloned(),
        ParamSource::Query => param.key.as_ref().and_then(|k| query.get(k)).cloned(),
        ParamSource::Header => param
            .key
            .as_ref()
            .and_then(|k| req.headers().get(k))
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    match raw {
        Some(raw) => {
            if let Some(pattern) = &param.pattern {
                let re = Regex::new(pattern)
                    .map_err(|e| PortwayError::internal(format!("invalid parameter pattern: {e}")))?;
                if !re.is_match(&raw) {
                    return Err(PortwayError::bad_request(format!(
                        "parameter `{}` does not match the required pattern",
                        param.name
                    )));
                }
            }
            Ok(ParamValue::Provided(raw))
        }
        None if param.default.is_some() => Ok(ParamValue::Defaulted),
        None => Ok(ParamValue::Missing),
    }
}

async fn call_tvf(
    handler: &SqlHandler<'_>,
    endpoint: &SqlEndpoint,
    path_rest: &[String],
    query: &HashMap<String, String>,
    req: &HttpRequest,
) -> Result<Vec<Value>, PortwayError> {
    let specs: Vec<TvfParamSpec> = endpoint
        .parameters
        .iter()
        .map(|p| TvfParamSpec {
            name: p.name.clone(),
            sql_type: p.sql_type.clone(),
            required: p.required,
            default: p.default.clone(),
        })
        .collect();

    let mut values = Vec::with_capacity(endpoint.parameters.len());
    for param in &endpoint.parameters {
        values.push(resolve_param_value(param, path_rest, query, req)?);
    }

    Ok(handler.call(endpoint, &specs, &values).await?)
}

pub async fn list(
    handler: &SqlHandler<'_>,
    endpoint: &SqlEndpoint,
    path_rest: &[String],
    query_pairs: &[(String, String)],
    req: &HttpRequest,
) -> Result<SqlResponse, PortwayError> {
    match endpoint.object_type {
        ObjectType::Table | ObjectType::View => {
            let query = ODataQuery::parse(query_pairs)
                .map_err(|e| PortwayError::bad_request(e.to_string()))?;
            let envelope = handler.list(endpoint, &query).await?;
            Ok(SqlResponse::List(envelope))
        }
        ObjectType::TableValuedFunction | ObjectType::StoredProcedure => {
            let query_map: HashMap<String, String> = query_pairs.iter().cloned().collect();
            let rows = call_tvf(handler, endpoint, path_rest, &query_map, req).await?;
            Ok(SqlResponse::Rows(rows))
        }
    }
}

pub async fn insert(
    handler: &SqlHandler<'_>,
    endpoint: &SqlEndpoint,
    body: &Map<String, Value>,
) -> Result<MutationEnvelope, PortwayError> {
    Ok(handler.insert(endpoint, body).await?)
}

pub async fn update(
    handler: &SqlHandler<'_>,
    endpoint: &SqlEndpoint,
    id: &str,
    body: &Map<String, Value>,
    is_patch: bool,
) -> Result<MutationEnvelope, PortwayError> {
    Ok(handler.update(endpoint, id, body, is_patch).await?)
}

pub async fn delete(
    handler: &SqlHandler<'_>,
    endpoint: &SqlEndpoint,
    id: &str,
) -> Result<MutationEnvelope, PortwayError> {
    Ok(handler.delete(endpoint, id).await?)
}
