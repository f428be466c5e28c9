// gateway/tests/auth_test.rs
mod support;

use actix_web::http::{header, StatusCode};
use actix_web::{test, App};
use support::{auth_options, upstream, Harness, COOKIE_NAME};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_cookie<B>(resp: &actix_web::dev::ServiceResponse<B>) -> actix_web::cookie::Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == COOKIE_NAME)
        .map(|c| c.into_owned())
        .expect("session cookie set")
}

#[actix_web::test]
async fn test_one_click_login_then_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("app"))
        .mount(&server)
        .await;

    let harness = Harness::new(auth_options(), vec![("/".to_string(), upstream(&server.uri(), ""))]);
    harness.add_instance("I1").await;
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let req = test::TestRequest::get()
        .uri("/mstudio/auth/oneclick?userID=u1&instanceId=I1&atrek=valid-atrek")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");

    let cookie = session_cookie(&resp);
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(harness.sessions.len(), 1);

    let req = test::TestRequest::get().uri("/").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&test::read_body(resp).await[..], b"app");
}

#[actix_web::test]
async fn test_one_click_failures() {
    let harness = Harness::new(auth_options(), vec![]);
    harness.add_instance("I1").await;
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let cases = [
        ("/mstudio/auth/oneclick?userId=u1&instanceId=I1", StatusCode::BAD_REQUEST),
        ("/mstudio/auth/oneclick?userId=u1&instanceId=I1&atrek=wrong", StatusCode::UNAUTHORIZED),
        ("/mstudio/auth/oneclick?userId=u1&instanceId=I9&atrek=valid-atrek", StatusCode::NOT_FOUND),
    ];

    for (uri, expected) in cases {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), expected, "{}", uri);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["message"].is_string());
    }
    assert!(harness.sessions.is_empty());
}

#[actix_web::test]
async fn test_fake_login_only_in_development() {
    let harness = Harness::new(auth_options(), vec![]);
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mstudio/auth/fake").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(&test::read_body(resp).await[..], br#"{"message":"not available"}"#);

    let mut options = auth_options();
    options.development = true;
    let harness = Harness::new(options, vec![]);
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mstudio/auth/fake").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&resp);
    assert_eq!(cookie.secure(), Some(false));
    assert_eq!(harness.sessions.len(), 1);
}

#[actix_web::test]
async fn test_password_login() {
    let mut options = auth_options();
    options.static_password = Some("letmein".to_string());
    let harness = Harness::new(options, vec![]);
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mstudio/auth/password").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let form = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(form.contains(r#"action="/mstudio/auth/password""#));

    let wrong = test::TestRequest::post()
        .uri("/mstudio/auth/password")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("password=nope")
        .to_request();
    let resp = test::call_service(&app, wrong).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(harness.sessions.is_empty());

    let missing = test::TestRequest::post()
        .uri("/mstudio/auth/password")
        .set_payload("user=max")
        .to_request();
    let resp = test::call_service(&app, missing).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let right = test::TestRequest::post()
        .uri("/mstudio/auth/password")
        .insert_header((header::CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload("password=letmein")
        .to_request();
    let resp = test::call_service(&app, right).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&resp);
    assert!(cookie.max_age().is_some());
    assert_eq!(harness.sessions.len(), 1);
}

#[actix_web::test]
async fn test_password_login_not_mounted_without_password() {
    let harness = Harness::new(auth_options(), vec![]);
    let app = test::init_service(App::new().configure(|cfg| harness.gateway.configure(cfg))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mstudio/auth/password").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
