// gateway/src/main.rs
use actix_web::{App, HttpServer};
use chrono::Duration as ChronoDuration;
use common::{setup_tracing, Config};
use gateway::identity::HttpIdentityClient;
use gateway::options::AuthOptions;
use gateway::proxy::UpstreamClient;
use gateway::store::{MemoryInstanceStore, MemorySessionStore, SecretHasher};
use gateway::webhooks::{CachingKeyProvider, PlatformKeyProvider};
use gateway::Gateway;
use std::io;
use std::sync::Arc;
use std::time::Duration;

fn startup_error(context: &str, error: impl std::fmt::Display) -> io::Error {
    tracing::error!("{}: {}", context, error);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, error))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Setup tracing before configuration so loading is logged
    setup_tracing(&std::env::var("GATEWAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

    // Load configuration
    let config = Config::from_env();

    let options = AuthOptions::from_config(&config)
        .map_err(|e| startup_error("Invalid authentication settings", e))?;
    let routes = config
        .upstream_routes()
        .map_err(|e| startup_error("Invalid upstream configuration", e))?;
    if routes.is_empty() {
        tracing::warn!("No upstreams configured, only /mstudio endpoints are served");
    }
    if options.development {
        tracing::warn!("Development mode enabled: insecure cookies and fake login are available");
    }

    let identity = Arc::new(
        HttpIdentityClient::new(
            &config.api_base_url,
            Duration::from_secs(config.identity_timeout_secs),
        )
        .map_err(|e| startup_error("Failed to build identity platform client", e))?
        .with_body_logging(config.log_http_bodies),
    );

    let sessions = Arc::new(
        MemorySessionStore::new(SecretHasher::default())
            .with_retention(ChronoDuration::seconds(config.session_retention_secs)),
    );
    sessions.spawn_sweeper(Duration::from_secs(config.session_sweep_interval_secs.max(1)));

    let instances = Arc::new(MemoryInstanceStore::new());
    let keys = Arc::new(CachingKeyProvider::new(PlatformKeyProvider::new(identity.clone())));

    let upstream_client = UpstreamClient::new(Duration::from_secs(config.upstream_connect_timeout_secs))
        .map_err(|e| startup_error("Failed to build upstream client", e))?;

    let gateway = Gateway::new(
        options,
        identity,
        sessions,
        instances,
        keys,
        upstream_client,
        routes,
    );

    tracing::info!("Starting gateway on {}", config.listen_addr);

    HttpServer::new(move || {
        let gateway = gateway.clone();
        App::new().configure(move |cfg| gateway.configure(cfg))
    })
    .bind(&config.listen_addr)?
    .run()
    .await
}
