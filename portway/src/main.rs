//! Portway: a configuration-driven API gateway. Entry point wires settings,
//! the endpoint registry (with its file-watcher), per-environment SQL pools,
//! the outbound proxy client and the auth token store into one [`AppState`],
//! then starts the actix-web server.

mod dispatch;
mod meta;
mod state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::dev::Service;
use actix_web::{web, App, HttpServer};
use portway_auth::TokenStore;
use portway_common::{CorrelationId, X_CORRELATION_ID};
use portway_registry::EndpointRegistry;
use portway_settings::Settings;
use state::AppState;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let settings = Settings::with_env_and_config_file(config_path.as_deref())?;

    log::info!("loading endpoint registry from {}", settings.descriptors_root);
    let registry = Arc::new(EndpointRegistry::load(&settings.descriptors_root));
    let report_errors = |errs: &[(std::path::PathBuf, String)]| {
        for (path, message) in errs {
            log::warn!("descriptor {} failed to load: {message}", path.display());
        }
    };
    report_errors(&registry.current().load_errors);

    // Dropping this guard stops the watch; it lives for the process lifetime.
    let _watcher = portway_registry::watcher::watch(registry.clone())
        .map_err(|e| log::warn!("failed to start descriptor watcher: {e}"))
        .ok();

    let token_store = Arc::new(TokenStore::new(&settings.token_db_url)?);

    let environments = settings.registry();
    let mut sql_pools = HashMap::new();
    for env in environments.names() {
        let env_settings = environments
            .resolve(env)
            .expect("name came from the same registry");
        match portway_sql::connect(
            &env_settings.database_url,
            env_settings.database_pool_max_size,
            Duration::from_secs(env_settings.database_pool_connection_timeout_secs),
        )
        .await
        {
            Ok(pool) => {
                sql_pools.insert(env.to_owned(), pool);
            }
            Err(e) => log::warn!("environment '{env}' has no usable SQL pool: {e}"),
        }
    }

    let http_client = portway_proxy::build_client(Duration::from_secs(settings.default_deadline_secs))?;

    let host = settings.host.clone();
    let port = settings.port;
    let path_prefix = settings.path_prefix.clone();
    let cors_allowed_origin = settings.cors_allowed_origin.clone();

    let state = web::Data::new(AppState {
        settings,
        environments,
        registry,
        token_store,
        sql_pools,
        http_client,
    });

    log::info!("portway listening on {host}:{port}");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(build_cors(cors_allowed_origin.as_deref()))
            .wrap(actix_web::middleware::Logger::default())
            .wrap_fn(|req, srv| {
                let incoming = req
                    .headers()
                    .get(X_CORRELATION_ID)
                    .and_then(|v| v.to_str().ok())
                    .map(CorrelationId::from_header)
                    .unwrap_or_default();
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;
                    res.headers_mut().insert(
                        actix_web::http::header::HeaderName::from_static("x-correlation-id"),
                        actix_web::http::header::HeaderValue::from_str(incoming.as_str())
                            .unwrap_or_else(|_| actix_web::http::header::HeaderValue::from_static("invalid")),
                    );
                    Ok(res)
                }
            })
            .route(&meta_route_pattern(&path_prefix), web::get().to(meta::list_endpoints))
            .default_service(web::route().to(dispatch::handle))
    })
    .bind((host, port))?
    .run();

    server.await?;
    Ok(())
}

fn meta_route_pattern(path_prefix: &str) -> String {
    let trimmed = path_prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/{env}/_meta/endpoints".to_owned()
    } else {
        format!("/{trimmed}/{{env}}/_meta/endpoints")
    }
}

fn build_cors(allowed_origin: Option<&str>) -> Cors {
    match allowed_origin {
        Some("*") => Cors::default().allow_any_origin(),
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default(),
    }
}
