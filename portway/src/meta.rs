//! `GET /{prefix}/{env}/_meta/endpoints` (`spec.md` §6): a plain JSON listing
//! of public endpoint descriptors, standing in for full OpenAPI/Scalar
//! generation which is explicitly out of scope for this core.

use actix_web::{web, HttpResponse};
use portway_common::PortwayError;
use portway_registry::EndpointDefinition;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct EndpointSummary {
    full_path: String,
    kind: &'static str,
    allowed_methods: Vec<String>,
}

fn kind_of(definition: &EndpointDefinition) -> &'static str {
    match definition {
        EndpointDefinition::Sql(_) => "sql",
        EndpointDefinition::Proxy(_) => "proxy",
        EndpointDefinition::Composite(_) => "composite",
        EndpointDefinition::File(_) => "file",
        EndpointDefinition::Static(_) => "static",
    }
}

pub async fn list_endpoints(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, PortwayError> {
    let env = path.into_inner();
    if !state.environments.is_allowed(&env) {
        return Err(PortwayError::not_found(format!("Environment '{env}' is not allowed")));
    }

    let snapshot = state.registry.current();
    let mut endpoints: Vec<EndpointSummary> = snapshot
        .public_endpoints()
        .map(|def| EndpointSummary {
            full_path: def.full_path(),
            kind: kind_of(def),
            allowed_methods: def
                .meta()
                .allowed_methods
                .iter()
                .map(|m| format!("{m:?}").to_ascii_uppercase())
                .collect(),
        })
        .collect();
    endpoints.sort_by(|a, b| a.full_path.cmp(&b.full_path));

    Ok(HttpResponse::Ok().json(serde_json::json!({ "endpoints": endpoints })))
}
