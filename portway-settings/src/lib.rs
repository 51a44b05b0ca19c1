//! Application settings and the environment registry (`spec.md` §4.B).
//!
//! Settings are layered file → environment variables, following
//! `syncserver_settings::Settings::with_env_and_config_file`: a config file
//! is merged first (if supplied), then `PORTWAY_*` environment variables
//! (double-underscore separated, e.g. `PORTWAY_ENVIRONMENTS__PROD__DATABASE_URL`)
//! override it.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

static PREFIX: &str = "portway";

/// One entry in `spec.md`'s Environment Registry: a named deployment target
/// (`prod`, `dev`, ...) with its own backing connection string and storage
/// root. `Resolve`/`IsAllowed` live on [`EnvironmentRegistry`] below.
#[derive(Clone, Debug, Deserialize)]
pub struct EnvironmentSettings {
    /// Connection string handed to the SQL handler's pool for this env.
    pub database_url: String,
    pub database_pool_max_size: u32,
    pub database_pool_connection_timeout_secs: u64,
    /// Base URL used to resolve relative `TargetUrlTemplate`s for proxy
    /// endpoints in this environment.
    pub proxy_base_url: Option<String>,
    /// Root directory under which file-endpoint storage for this env lives;
    /// joined as `StorageRoot/<env>/<fileId>` per `spec.md` §4.H.
    pub file_storage_root: String,
    /// Destination the `POST /{env}/webhook/<id>` pass-through forwards its
    /// body to; `None` disables the route for this environment.
    pub webhook_sink_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// URL path prefix, default empty per `spec.md` §6.
    pub path_prefix: String,
    pub human_logs: bool,

    /// The master secret tokens are hashed relative to; see `portway-auth`.
    pub token_db_url: String,

    /// Root of the descriptor tree scanned by the endpoint registry.
    pub descriptors_root: String,

    /// Default request deadline in seconds (`spec.md` §5).
    pub default_deadline_secs: u64,

    /// Cap on buffered proxy request bodies when content-length is unknown.
    pub max_proxy_buffer_bytes: usize,

    pub statsd_host: Option<String>,
    pub statsd_port: u16,

    pub cors_allowed_origin: Option<String>,

    pub environments: HashMap<String, EnvironmentSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            path_prefix: String::new(),
            human_logs: true,
            token_db_url: "sqlite://portway_tokens.db".to_owned(),
            descriptors_root: "./endpoints".to_owned(),
            default_deadline_secs: 30,
            max_proxy_buffer_bytes: 10 * 1024 * 1024,
            statsd_host: None,
            statsd_port: 8125,
            cors_allowed_origin: None,
            environments: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from an optional config file, then environment
    /// variable overrides. Error messages name the missing key and the
    /// environment variable that would set it, for 3AM-friendly debugging.
    pub fn with_env_and_config_file(filename: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(config_filename) = filename {
            builder = builder.add_source(File::with_name(config_filename));
        }

        builder = builder.add_source(
            Environment::with_prefix(&PREFIX.to_uppercase())
                .separator("__")
                .try_parsing(true),
        );

        match builder.build()?.try_deserialize::<Self>() {
            Ok(settings) => Ok(settings),
            Err(ConfigError::NotFound(key)) => {
                eprintln!(
                    "Missing configuration value `{}`. Set it in the config file or via `{}_{}`.",
                    key,
                    PREFIX.to_uppercase(),
                    key.to_uppercase()
                );
                Err(ConfigError::NotFound(key))
            }
            Err(e) => {
                eprintln!("Configuration error: {:?}", e);
                Err(e)
            }
        }
    }

    pub fn registry(&self) -> EnvironmentRegistry {
        EnvironmentRegistry {
            environments: self.environments.clone(),
        }
    }

    #[cfg(debug_assertions)]
    pub fn test_settings() -> Self {
        let mut settings = Self::default();
        settings.environments.insert(
            "test".to_owned(),
            EnvironmentSettings {
                database_url: "sqlite::memory:".to_owned(),
                database_pool_max_size: 1,
                database_pool_connection_timeout_secs: 5,
                proxy_base_url: Some("http://localhost:0".to_owned()),
                file_storage_root: "./target/test-files".to_owned(),
                webhook_sink_url: None,
            },
        );
        settings
    }
}

/// `spec.md` §4.B: `IsAllowed(env) -> bool`, `Resolve(env) -> ConnectionHandle`.
/// The handle here is the per-environment settings; pool acquisition with a
/// deadline happens in `portway-sql`/`portway-files`, which look up the
/// settings through this registry.
#[derive(Clone, Debug)]
pub struct EnvironmentRegistry {
    environments: HashMap<String, EnvironmentSettings>,
}

impl EnvironmentRegistry {
    pub fn is_allowed(&self, env: &str) -> bool {
        self.environments.contains_key(env)
    }

    pub fn resolve(&self, env: &str) -> Option<&EnvironmentSettings> {
        self.environments.get(env)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.keys().map(String::as_str)
    }

    pub fn pool_acquire_timeout(&self, env: &str) -> Duration {
        self.environments
            .get(env)
            .map(|e| Duration::from_secs(e.database_pool_connection_timeout_secs))
            .unwrap_or(Duration::from_secs(10))
    }

    pub fn webhook_sink_url(&self, env: &str) -> Option<&str> {
        self.environments
            .get(env)
            .and_then(|e| e.webhook_sink_url.as_deref())
    }
}
