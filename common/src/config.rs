// common/src/config.rs
use config::{Config as ConfigFile, Environment, File};
pub use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use url::Url;

/// Central configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,

    /// Assertion signing secret. Either this or `secret_file` must be set.
    pub secret: Option<String>,
    pub secret_file: Option<PathBuf>,

    /// Enables the password login fallback when set
    pub static_password: Option<String>,

    /// Base URL of the identity platform API
    pub api_base_url: String,
    /// Deployment context; "dev" enables development mode
    pub context: String,

    pub upstreams: HashMap<String, UpstreamConfig>,
    /// Same shape as `upstreams`, as a JSON document (for plain env setups)
    pub upstreams_json: Option<String>,
    pub redirect_on_unauthenticated: Option<String>,

    pub cookie_name: String,
    pub cookie_ttl_secs: i64,
    pub session_retention_secs: i64,
    pub session_sweep_interval_secs: u64,

    pub identity_timeout_secs: u64,
    pub upstream_connect_timeout_secs: u64,

    pub log_http_bodies: bool,
}

/// One proxied upstream, keyed by path prefix in [`Config::upstreams`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    pub upstream_url: Url,
    #[serde(default)]
    pub strip_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            secret: None,
            secret_file: None,
            static_password: None,
            api_base_url: "https://api.mittwald.de".to_string(),
            context: String::new(),
            upstreams: HashMap::new(),
            upstreams_json: None,
            redirect_on_unauthenticated: None,
            cookie_name: "mstudio_ext_session".to_string(),
            cookie_ttl_secs: 3600,
            session_retention_secs: 3600,
            session_sweep_interval_secs: 60,
            identity_timeout_secs: 10,
            upstream_connect_timeout_secs: 10,
            log_http_bodies: false,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // GATEWAY_COOKIE_NAME, GATEWAY_UPSTREAMS_JSON, ...
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when sources are unreadable
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load configuration: {}", e);
                tracing::info!("Falling back to default configuration");
                Self::default()
            }
        }
    }

    pub fn is_development(&self) -> bool {
        self.context == "dev"
    }

    /// Resolve the assertion signing secret from its configured source
    pub fn signing_secret(&self) -> Result<Vec<u8>, ConfigError> {
        if let Some(secret) = self.secret.as_deref().filter(|s| !s.is_empty()) {
            return Ok(secret.as_bytes().to_vec());
        }

        if let Some(path) = &self.secret_file {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                ConfigError::Message(format!(
                    "could not read secret file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let secret = contents.trim();
            if !secret.is_empty() {
                return Ok(secret.as_bytes().to_vec());
            }
        }

        Err(ConfigError::Message(
            "one of `secret` or `secret_file` must be set".to_string(),
        ))
    }

    /// All configured upstreams, longest prefix first
    pub fn upstream_routes(&self) -> Result<Vec<(String, UpstreamConfig)>, ConfigError> {
        let mut routes = self.upstreams.clone();

        if let Some(json) = self.upstreams_json.as_deref().filter(|s| !s.trim().is_empty()) {
            let parsed: HashMap<String, UpstreamConfig> = serde_json::from_str(json)
                .map_err(|e| ConfigError::Message(format!("invalid upstreams_json: {}", e)))?;
            routes.extend(parsed);
        }

        let mut routes: Vec<_> = routes.into_iter().collect();
        routes.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Ok(routes)
    }
}
