// gateway/src/lib.rs
pub mod api;
pub mod error;
pub mod identity;
pub mod options;
pub mod proxy;
pub mod session_service;
pub mod store;
pub mod webhooks;

use actix_web::web;
use common::UpstreamConfig;
use std::sync::Arc;

use crate::identity::IdentityPlatform;
use crate::options::AuthOptions;
use crate::proxy::UpstreamClient;
use crate::session_service::SessionService;
use crate::store::{InstanceStore, SessionStore};
use crate::webhooks::{KeyProvider, Verifier};

/// Everything the request handlers share, wired once at startup.
///
/// Cloning is cheap; each worker's `App` gets its own clone.
#[derive(Clone)]
pub struct Gateway {
    options: web::Data<AuthOptions>,
    sessions: web::Data<SessionService>,
    instances: web::Data<dyn InstanceStore>,
    verifier: web::Data<Verifier>,
    upstream_client: web::Data<UpstreamClient>,
    routes: Arc<Vec<(String, UpstreamConfig)>>,
}

impl Gateway {
    pub fn new(
        options: AuthOptions,
        identity: Arc<dyn IdentityPlatform>,
        sessions: Arc<dyn SessionStore>,
        instances: Arc<dyn InstanceStore>,
        keys: Arc<dyn KeyProvider>,
        upstream_client: UpstreamClient,
        routes: Vec<(String, UpstreamConfig)>,
    ) -> Self {
        let service = SessionService::new(identity, sessions, Arc::clone(&instances));

        Self {
            options: web::Data::new(options),
            sessions: web::Data::new(service),
            instances: web::Data::from(instances),
            verifier: web::Data::new(Verifier::new(keys)),
            upstream_client: web::Data::new(upstream_client),
            routes: Arc::new(routes),
        }
    }

    /// Register shared state, the `/mstudio` endpoints and the upstream scopes.
    ///
    /// Upstreams are mounted last so they never shadow the gateway's own routes.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.options.clone())
            .app_data(self.sessions.clone())
            .app_data(self.instances.clone())
            .app_data(self.verifier.clone())
            .app_data(self.upstream_client.clone());

        api::configure(cfg, self.options.static_password.is_some());
        proxy::configure(cfg, &self.routes);
    }
}
