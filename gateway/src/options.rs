// gateway/src/options.rs
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::HttpResponse;
use chrono::Duration as ChronoDuration;
use common::models::session::Session;
use common::{Config, ConfigError};
use std::fmt;

use crate::error::GatewayError;

pub const PASSWORD_LOGIN_PATH: &str = "/mstudio/auth/password";

/// Authentication settings shared by the auth endpoints and the proxy
#[derive(Clone)]
pub struct AuthOptions {
    pub cookie_name: String,
    /// Lifetime of password and development sessions
    pub cookie_ttl: ChronoDuration,
    pub signing_secret: Vec<u8>,
    pub static_password: Option<String>,
    pub development: bool,
    pub redirect_on_unauthenticated: Option<String>,
}

impl AuthOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            cookie_name: config.cookie_name.clone(),
            cookie_ttl: ChronoDuration::seconds(config.cookie_ttl_secs),
            signing_secret: config.signing_secret()?,
            static_password: config.static_password.clone().filter(|p| !p.is_empty()),
            development: config.is_development(),
            redirect_on_unauthenticated: config
                .redirect_on_unauthenticated
                .clone()
                .filter(|r| !r.is_empty()),
        })
    }

    /// Cookie carrying `session`. Without `max_age` it lives for the browser session.
    pub fn session_cookie(&self, session: &Session, max_age: Option<ChronoDuration>) -> Cookie<'static> {
        let secure = !self.development;
        let mut builder = Cookie::build(self.cookie_name.clone(), session.cookie_string())
            .path("/")
            .secure(secure)
            .http_only(secure)
            .same_site(SameSite::Lax);

        if let Some(max_age) = max_age {
            builder = builder.max_age(CookieDuration::seconds(max_age.num_seconds()));
        }

        builder.finish()
    }

    /// Response for a request that carries no usable session
    pub fn unauthenticated_response(&self) -> HttpResponse {
        if self.static_password.is_some() {
            return see_other(PASSWORD_LOGIN_PATH);
        }

        if let Some(target) = &self.redirect_on_unauthenticated {
            return see_other(target);
        }

        actix_web::ResponseError::error_response(&GatewayError::unauthorized("unauthorized"))
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_ttl", &self.cookie_ttl)
            .field("signing_secret", &"<REDACTED>")
            .field("static_password", &self.static_password.as_ref().map(|_| "<REDACTED>"))
            .field("development", &self.development)
            .field("redirect_on_unauthenticated", &self.redirect_on_unauthenticated)
            .finish()
    }
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}
