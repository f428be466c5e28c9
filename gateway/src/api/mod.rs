// gateway/src/api/mod.rs
pub mod auth;
pub mod webhooks;

/// Mount the gateway's own endpoints under `/mstudio`.
///
/// The password login exists only when a static password is configured.
pub fn configure(cfg: &mut actix_web::web::ServiceConfig, password_login: bool) {
    let mut scope = actix_web::web::scope("/mstudio")
        .service(webhooks::receive)
        .service(auth::one_click)
        .service(auth::fake);

    if password_login {
        scope = scope.service(auth::password);
    }

    cfg.service(scope);
}
