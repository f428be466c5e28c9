// gateway/src/api/auth.rs
use actix_web::{get, route, web, HttpRequest, HttpResponse};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::GatewayError;
use crate::options::{see_other, AuthOptions, PASSWORD_LOGIN_PATH};
use crate::session_service::SessionService;

const LOGIN_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Login</title></head>
<body>
<form method="post" action="{action}">
<label for="password">Password</label>
<input type="password" id="password" name="password" autofocus>
<button type="submit">Log in</button>
</form>
</body>
</html>
"#;

#[derive(Debug, Default, PartialEq, Eq)]
struct OneClickParams {
    user_id: String,
    instance_id: String,
    retrieval_key: String,
}

/// Read `userId`, `instanceId` and `atrek`, ignoring the case of the keys
fn one_click_params(query: &str) -> Result<OneClickParams, GatewayError> {
    let mut params = OneClickParams::default();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let slot = match key.to_ascii_lowercase().as_str() {
            "userid" => &mut params.user_id,
            "instanceid" => &mut params.instance_id,
            "atrek" => &mut params.retrieval_key,
            _ => continue,
        };
        if slot.is_empty() {
            *slot = value.into_owned();
        }
    }

    if params.user_id.is_empty() || params.instance_id.is_empty() || params.retrieval_key.is_empty() {
        return Err(GatewayError::bad_request("could not retrieve instance")
            .with_details("all the userId, instanceId and atrek query params must be set"));
    }

    Ok(params)
}

/// Entry point of the platform's one-click login
#[get("/auth/oneclick")]
pub async fn one_click(
    req: HttpRequest,
    sessions: web::Data<SessionService>,
    options: web::Data<AuthOptions>,
) -> Result<HttpResponse, GatewayError> {
    let params = one_click_params(req.query_string()).map_err(|e| {
        tracing::warn!(error = %e, "one-click login without required parameters");
        e
    })?;

    let session = sessions
        .initialize_from_retrieval_key(&params.retrieval_key, &params.user_id, &params.instance_id)
        .await
        .map_err(|e| {
            tracing::error!(
                user_id = %params.user_id,
                instance_id = %params.instance_id,
                error = %e,
                "failed to create session"
            );
            e
        })?;

    let mut response = see_other("/");
    response
        .add_cookie(&options.session_cookie(&session, None))
        .map_err(|e| GatewayError::internal("error setting session cookie").with_details(e))?;

    Ok(response)
}

/// Fixed local user for development setups
#[get("/auth/fake")]
pub async fn fake(
    sessions: web::Data<SessionService>,
    options: web::Data<AuthOptions>,
) -> Result<HttpResponse, GatewayError> {
    if !options.development {
        return Err(GatewayError::forbidden("not available"));
    }

    tracing::warn!("issuing fake session, never enable development mode in production");
    fake_login(&sessions, &options).await
}

#[route("/auth/password", method = "GET", method = "POST")]
pub async fn password(
    req: HttpRequest,
    body: web::Bytes,
    sessions: web::Data<SessionService>,
    options: web::Data<AuthOptions>,
) -> Result<HttpResponse, GatewayError> {
    let expected = match options.static_password.as_deref() {
        Some(expected) => expected,
        None => return Err(GatewayError::not_found("not found")),
    };

    if req.method() == actix_web::http::Method::POST {
        let submitted = url::form_urlencoded::parse(&body)
            .find(|(key, _)| *key == "password")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| GatewayError::bad_request("missing 'password' parameter"))?;

        if passwords_match(&submitted, expected) {
            return fake_login(&sessions, &options).await;
        }

        tracing::warn!("password login with wrong password");
    }

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(LOGIN_FORM.replace("{action}", PASSWORD_LOGIN_PATH)))
}

async fn fake_login(sessions: &SessionService, options: &AuthOptions) -> Result<HttpResponse, GatewayError> {
    let session = sessions.create_fake_session(options.cookie_ttl).await?;

    let mut response = see_other("/");
    response
        .add_cookie(&options.session_cookie(&session, Some(options.cookie_ttl)))
        .map_err(|e| GatewayError::internal("error setting session cookie").with_details(e))?;

    Ok(response)
}

/// Compare digests so neither content nor length leaks through timing
fn passwords_match(submitted: &str, expected: &str) -> bool {
    let submitted = Sha256::digest(submitted.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    submitted.ct_eq(&expected).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_one_click_params_are_case_insensitive() {
        let params = one_click_params("userID=u1&InstanceId=I1&ATREK=key%2B1").unwrap();
        assert_eq!(
            params,
            OneClickParams {
                user_id: "u1".to_string(),
                instance_id: "I1".to_string(),
                retrieval_key: "key+1".to_string(),
            }
        );
    }

    #[test]
    fn test_one_click_params_first_value_wins() {
        let params = one_click_params("userId=u1&userid=u2&instanceId=I1&atrek=k").unwrap();
        assert_eq!(params.user_id, "u1");
    }

    #[test]
    fn test_one_click_params_missing() {
        for query in ["", "userId=u1&instanceId=I1", "userId=&instanceId=I1&atrek=k"] {
            let err = one_click_params(query).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{}", query);
        }
    }

    #[test]
    fn test_passwords_match() {
        assert!(passwords_match("correct horse", "correct horse"));
        assert!(!passwords_match("correct horse", "correct hors"));
        assert!(!passwords_match("", "correct horse"));
    }
}
