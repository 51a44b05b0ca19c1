//! The Dispatcher (`spec.md` §4.I): the single entry point every request
//! flows through — environment check, bearer auth, scope/environment
//! checks, endpoint lookup, method check, then delegation to the handler
//! named by the endpoint's `Kind`.

pub mod auth;
pub mod composite;
pub mod files;
pub mod path;
pub mod proxy;
pub mod sql;
pub mod static_ep;
pub mod webhook;

use actix_multipart::Multipart;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use portway_auth::VerifiedToken;
use portway_common::{MutationEnvelope, PortwayError};
use portway_registry::{EndpointDefinition, HttpMethod, ObjectType};
use serde_json::{Map, Value};

use crate::state::AppState;

fn query_pairs(req: &HttpRequest) -> Vec<(String, String)> {
    url::form_urlencoded::parse(req.query_string().as_bytes())
        .into_owned()
        .collect()
}

fn query_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Buffers a streaming payload up to `cap` bytes, matching the proxy
/// handler's `MaxProxyBufferBytes` discipline (`spec.md` §4.F) for every
/// non-multipart route that needs the body materialised.
async fn buffer_payload(payload: &mut web::Payload, cap: usize) -> Result<Bytes, PortwayError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| PortwayError::bad_request(format!("invalid request body: {e}")))?;
        if buf.len() + chunk.len() > cap {
            return Err(PortwayError::payload_too_large("request body exceeds MaxProxyBufferBytes"));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn parse_body(body: &web::Bytes) -> Result<Map<String, Value>, PortwayError> {
    if body.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PortwayError::bad_request("request body must be a JSON object")),
        Err(e) => Err(PortwayError::bad_request(format!("invalid JSON body: {e}"))),
    }
}

fn method_from_request(req: &HttpRequest) -> Result<HttpMethod, PortwayError> {
    HttpMethod::from_http(req.method().as_str())
        .ok_or_else(|| PortwayError::method_not_allowed("unsupported HTTP method"))
}

/// `spec.md` §4.I steps 1-6, shared by every route kind: environment
/// allow-list, bearer verification, scope/environment wildcard checks, and
/// (for routes backed by a registry entry) the private/method checks.
struct AuthorizedRequest<'a> {
    env: &'a str,
    method: HttpMethod,
    token: VerifiedToken,
}

async fn authorize_environment_and_token<'a>(
    state: &AppState,
    req: &HttpRequest,
    env: &'a str,
) -> Result<AuthorizedRequest<'a>, PortwayError> {
    if !state.environments.is_allowed(env) {
        return Err(PortwayError::forbidden(format!("Environment '{env}' is not allowed")));
    }
    let token = auth::verify(&state.token_store, req).await?;
    auth::check_environment(&token, env)?;
    let method = method_from_request(req)?;
    Ok(AuthorizedRequest { env, method, token })
}

pub async fn handle(state: web::Data<AppState>, req: HttpRequest, mut payload: web::Payload) -> Result<HttpResponse, PortwayError> {
    let (env, segments) = path::parse(&state.settings.path_prefix, req.path())
        .ok_or_else(|| PortwayError::not_found("unrecognised path"))?;
    let authorized = authorize_environment_and_token(&state, &req, env).await?;

    let snapshot = state.registry.current();
    let segment_refs: Vec<&str> = segments.iter().copied().collect();
    let route = path::classify(&segment_refs, &snapshot)
        .ok_or_else(|| PortwayError::not_found("unknown endpoint"))?;

    // A file upload owns the raw stream directly (multipart parses its own
    // framing); every other route buffers the body up front.
    if let path::Route::Files { endpoint, rest } = &route {
        if req.method().as_str() == "POST" {
            let definition = snapshot
                .find(endpoint)
                .ok_or_else(|| PortwayError::not_found("unknown file endpoint"))?;
            auth::check_scope(&authorized.token, &definition.full_path())?;
            let EndpointDefinition::File(file_endpoint) = definition else {
                return Err(PortwayError::not_found("not a file endpoint"));
            };
            if file_endpoint.meta.is_private {
                return Err(PortwayError::not_found("unknown file endpoint"));
            }
            let multipart = Multipart::new(req.headers(), payload);
            let record = files::upload(&req, endpoint, file_endpoint, authorized.env, multipart).await?;
            return Ok(HttpResponse::Created().json(record));
        }
        let _ = rest;
    }

    let body = buffer_payload(&mut payload, state.settings.max_proxy_buffer_bytes).await?;

    match route {
        path::Route::Endpoint { full_path, rest } => {
            let definition = snapshot
                .find(&full_path)
                .ok_or_else(|| PortwayError::not_found("unknown endpoint"))?;
            auth::check_scope(&authorized.token, &definition.full_path())?;
            if definition.is_private() {
                return Err(PortwayError::not_found("unknown endpoint"));
            }
            if !definition.meta().allows_method(authorized.method) {
                return Err(PortwayError::method_not_allowed(format!(
                    "method {} is not allowed on {full_path}",
                    req.method()
                )));
            }
            dispatch_endpoint(&state, &req, &body, authorized.env, definition, &rest).await
        }
        path::Route::Composite { endpoint } => {
            let definition = snapshot
                .find(endpoint)
                .ok_or_else(|| PortwayError::not_found("unknown composite endpoint"))?;
            auth::check_scope(&authorized.token, &definition.full_path())?;
            let EndpointDefinition::Composite(composite) = definition else {
                return Err(PortwayError::not_found("not a composite endpoint"));
            };
            if composite.meta.is_private {
                return Err(PortwayError::not_found("unknown composite endpoint"));
            }
            dispatch_composite(&state, authorized.env, composite, &body).await
        }
        path::Route::Files { endpoint, rest } => {
            let definition = snapshot
                .find(endpoint)
                .ok_or_else(|| PortwayError::not_found("unknown file endpoint"))?;
            auth::check_scope(&authorized.token, &definition.full_path())?;
            let EndpointDefinition::File(file_endpoint) = definition else {
                return Err(PortwayError::not_found("not a file endpoint"));
            };
            if file_endpoint.meta.is_private {
                return Err(PortwayError::not_found("unknown file endpoint"));
            }
            let rest: Vec<String> = rest.into_iter().map(str::to_owned).collect();
            dispatch_file(&req, endpoint, file_endpoint, authorized.env, &rest).await
        }
        path::Route::Webhook { id } => {
            let full_path = format!("webhook/{id}");
            auth::check_scope(&authorized.token, &full_path)?;
            let sink_url = state
                .environments
                .webhook_sink_url(authorized.env)
                .ok_or_else(|| PortwayError::not_found(format!("no webhook sink configured for '{}'", authorized.env)))?;
            let status = webhook::forward(&state.http_client, sink_url, id, &req, body).await?;
            Ok(HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status).unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
            )
            .json(MutationEnvelope::success("forwarded")))
        }
    }
}

async fn dispatch_endpoint(
    state: &AppState,
    req: &HttpRequest,
    body: &web::Bytes,
    env: &str,
    definition: &EndpointDefinition,
    rest: &[String],
) -> Result<HttpResponse, PortwayError> {
    match definition {
        EndpointDefinition::Sql(endpoint) => {
            let pool = state
                .sql_pool(env)
                .ok_or_else(|| PortwayError::internal(format!("no SQL pool configured for '{env}'")))?;
            let handler = portway_sql::SqlHandler::new(pool);
            let pairs = query_pairs(req);
            match req.method().as_str() {
                "GET" => match sql::list(&handler, endpoint, rest, &pairs, req).await? {
                    sql::SqlResponse::List(envelope) => Ok(HttpResponse::Ok().json(envelope)),
                    sql::SqlResponse::Rows(rows) => Ok(HttpResponse::Ok().json(rows)),
                    sql::SqlResponse::Mutation(envelope) => Ok(HttpResponse::Ok().json(envelope)),
                },
                "POST" => {
                    let payload = parse_body(body)?;
                    if matches!(endpoint.object_type, ObjectType::StoredProcedure) {
                        let rows = sql::list(&handler, endpoint, rest, &pairs, req).await?;
                        match rows {
                            sql::SqlResponse::Rows(rows) => Ok(HttpResponse::Ok().json(rows)),
                            _ => Ok(HttpResponse::Ok().json(MutationEnvelope::success("ok"))),
                        }
                    } else {
                        let envelope = sql::insert(&handler, endpoint, &payload).await?;
                        Ok(HttpResponse::Created().json(envelope))
                    }
                }
                "PUT" | "PATCH" | "MERGE" => {
                    let id = query_param(&pairs, "id")
                        .ok_or_else(|| PortwayError::bad_request("missing required `id` query parameter"))?;
                    let payload = parse_body(body)?;
                    let is_patch = !req.method().as_str().eq_ignore_ascii_case("PUT");
                    let envelope = sql::update(&handler, endpoint, id, &payload, is_patch).await?;
                    Ok(HttpResponse::Ok().json(envelope))
                }
                "DELETE" => {
                    let id = query_param(&pairs, "id")
                        .ok_or_else(|| PortwayError::bad_request("missing required `id` query parameter"))?;
                    let envelope = sql::delete(&handler, endpoint, id).await?;
                    Ok(HttpResponse::Ok().json(envelope))
                }
                other => Err(PortwayError::method_not_allowed(format!("unsupported method {other}"))),
            }
        }
        EndpointDefinition::Proxy(endpoint) => {
            let forward_request = proxy::build_forward_request(req, env, rest.to_vec(), query_pairs(req), body.clone());
            proxy::forward(&state.http_client, endpoint, forward_request, state.settings.max_proxy_buffer_bytes).await
        }
        EndpointDefinition::Static(endpoint) => match static_ep::get(endpoint, req, &query_pairs(req))? {
            static_ep::StaticResponse::NotModified { etag } => {
                Ok(HttpResponse::NotModified().insert_header((header::ETAG, etag)).finish())
            }
            static_ep::StaticResponse::Ok {
                body,
                content_type,
                etag,
                last_modified,
            } => Ok(HttpResponse::Ok()
                .insert_header((header::CONTENT_TYPE, content_type))
                .insert_header((header::ETAG, etag))
                .insert_header((header::LAST_MODIFIED, last_modified.to_string()))
                .body(body)),
        },
        EndpointDefinition::Composite(_) | EndpointDefinition::File(_) => {
            Err(PortwayError::not_found("endpoint must be reached via its dedicated route"))
        }
    }
}

async fn dispatch_composite(
    state: &AppState,
    env: &str,
    composite: &portway_registry::CompositeEndpoint,
    body: &web::Bytes,
) -> Result<HttpResponse, PortwayError> {
    let request_body: Value = if body.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body).map_err(|e| PortwayError::bad_request(format!("invalid JSON body: {e}")))?
    };

    let snapshot = state.registry.current();
    let invoker = composite::RegistryInvoker {
        snapshot: &snapshot,
        client: &state.http_client,
        env,
        max_buffer_bytes: state.settings.max_proxy_buffer_bytes,
    };

    let outcome = portway_proxy::execute_composite(composite, request_body, &invoker)
        .await
        .map_err(|e| PortwayError::bad_request(e.to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": outcome.success,
        "stepResults": outcome.step_results,
    })))
}

/// Handles every `Files` route except `POST` (upload), which [`handle`]
/// dispatches directly against the raw payload stream before it is buffered.
async fn dispatch_file(
    req: &HttpRequest,
    endpoint_name: &str,
    endpoint: &portway_registry::FileEndpoint,
    env: &str,
    rest: &[String],
) -> Result<HttpResponse, PortwayError> {
    match req.method().as_str() {
        "GET" if rest.first().map(String::as_str) == Some("list") => {
            let pairs = query_pairs(req);
            let prefix = query_param(&pairs, "prefix");
            let records = files::list(endpoint_name, endpoint, env, prefix)?;
            Ok(HttpResponse::Ok().json(records))
        }
        "GET" => {
            let file_id = rest
                .first()
                .ok_or_else(|| PortwayError::bad_request("missing fileId path segment"))?;
            let (record, bytes) = files::fetch(endpoint_name, endpoint, env, file_id)?;
            Ok(HttpResponse::Ok()
                .insert_header((header::CONTENT_TYPE, record.content_type.clone()))
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", record.file_name),
                ))
                .body(bytes))
        }
        "DELETE" => {
            let file_id = rest
                .first()
                .ok_or_else(|| PortwayError::bad_request("missing fileId path segment"))?;
            files::delete(endpoint_name, endpoint, env, file_id)?;
            Ok(HttpResponse::Ok().json(MutationEnvelope::success("deleted")))
        }
        other => Err(PortwayError::method_not_allowed(format!("unsupported method {other}"))),
    }
}
