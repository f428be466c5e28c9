// gateway/src/proxy.rs
//
// Authenticating forwarder. Each configured upstream prefix gets its own
// scope; every request below it is authenticated via the session cookie,
// stamped with a signed assertion and streamed to and from the upstream.
use actix_web::body::{BodyStream, SizedStream};
use actix_web::http::{header, Method, StatusCode};
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use common::assertion::{sign_assertion, ASSERTION_HEADER};
use common::models::session::parse_cookie_string;
use common::UpstreamConfig;
use futures::{stream, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use crate::error::GatewayError;
use crate::options::AuthOptions;
use crate::session_service::SessionService;

/// Largest piece of a response body handed to the client at once
const MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Request body chunks buffered between the client and the upstream
const REQUEST_BODY_BUFFER: usize = 8;

/// Never forwarded in either direction
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// HTTP client used for all upstream calls
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

/// Mount one forwarding scope per upstream, in the given order
pub fn configure(cfg: &mut web::ServiceConfig, routes: &[(String, UpstreamConfig)]) {
    for (prefix, upstream) in routes {
        tracing::info!(prefix = %prefix, upstream = %upstream.upstream_url, "mounting upstream");

        cfg.service(
            web::scope(prefix.trim_end_matches('/'))
                .app_data(web::Data::new(upstream.clone()))
                .default_service(web::to(forward)),
        );
    }
}

pub async fn forward(
    req: HttpRequest,
    payload: web::Payload,
    upstream: web::Data<UpstreamConfig>,
    client: web::Data<UpstreamClient>,
    sessions: web::Data<SessionService>,
    options: web::Data<AuthOptions>,
) -> Result<HttpResponse, GatewayError> {
    let cookie = match req.cookie(&options.cookie_name) {
        Some(cookie) => cookie,
        None => {
            tracing::debug!(path = %req.path(), "request without session cookie");
            return Ok(options.unauthenticated_response());
        }
    };

    let credentials = parse_cookie_string(cookie.value()).ok_or_else(|| {
        tracing::debug!("malformed session cookie");
        GatewayError::unauthorized("invalid session")
    })?;

    let session = sessions
        .retrieve_session(&credentials.id, &credentials.secret)
        .await
        .map_err(|e| {
            tracing::warn!(session_id = %credentials.id, error = %e, "invalid session");
            e
        })?;

    let assertion = sign_assertion(&session.issue_assertion(), &options.signing_secret).map_err(|e| {
        tracing::error!(session_id = %session.id, error = %e, "signing assertion failed");
        GatewayError::internal("internal server error")
    })?;

    let target = upstream_url(&upstream, req.path(), req.query_string());
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| GatewayError::bad_request("unsupported method").with_details(e))?;

    let mut headers = forwarded_headers(req.headers());
    let assertion_name = reqwest::header::HeaderName::from_bytes(ASSERTION_HEADER.as_bytes())
        .map_err(|e| GatewayError::internal("internal server error").with_details(e))?;
    let assertion_value = reqwest::header::HeaderValue::from_str(&assertion)
        .map_err(|e| GatewayError::internal("internal server error").with_details(e))?;
    headers.insert(assertion_name, assertion_value);

    let mut request = client.client.request(method, target.clone()).headers(headers);
    if has_body(&req) {
        request = request.body(stream_payload(payload));
    }

    tracing::debug!(
        user_id = %session.user_id,
        instance_id = %session.instance.id,
        upstream = %upstream.upstream_url,
        method = %req.method(),
        path = %target.path(),
        "forwarding request"
    );

    let response = request.send().await.map_err(|e| {
        tracing::warn!(upstream = %upstream.upstream_url, error = %e, "upstream request failed");
        GatewayError::bad_gateway("bad gateway").with_details(e)
    })?;

    stream_response(response, req.method() == Method::HEAD)
}

/// Swap scheme, host and credentials for the upstream's, keep path and query
fn upstream_url(upstream: &UpstreamConfig, path: &str, query: &str) -> Url {
    let mut url = upstream.upstream_url.clone();

    let path = if upstream.strip_prefix.is_empty() {
        path
    } else {
        path.strip_prefix(upstream.strip_prefix.as_str()).unwrap_or(path)
    };
    url.set_path(path);
    url.set_query(Some(query).filter(|q| !q.is_empty()));
    url.set_fragment(None);

    url
}

fn is_forwardable(name: &str) -> bool {
    !HOP_BY_HOP_HEADERS.contains(&name)
}

/// Client headers minus hop-by-hop, host and any assertion the client tried to bring
fn forwarded_headers(source: &header::HeaderMap) -> reqwest::header::HeaderMap {
    let mut target = reqwest::header::HeaderMap::new();

    for (name, value) in source.iter() {
        let name = name.as_str();
        if !is_forwardable(name)
            || name == "host"
            || name.eq_ignore_ascii_case(ASSERTION_HEADER)
        {
            continue;
        }

        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            target.append(name, value);
        }
    }

    target
}

fn has_body(req: &HttpRequest) -> bool {
    let headers = req.headers();
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    content_length > 0 || headers.contains_key(header::TRANSFER_ENCODING)
}

/// Pipe the client's body into a `Send` stream reqwest can consume.
///
/// The actix payload is bound to the worker thread, so a local task pumps it
/// through a bounded channel; it stops as soon as the upstream side is gone.
fn stream_payload(mut payload: web::Payload) -> reqwest::Body {
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(REQUEST_BODY_BUFFER);

    actix_web::rt::spawn(async move {
        while let Some(chunk) = payload.next().await {
            let item = chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

fn stream_response(response: reqwest::Response, head: bool) -> Result<HttpResponse, GatewayError> {
    let status = StatusCode::from_u16(response.status().as_u16())
        .map_err(|e| GatewayError::bad_gateway("bad gateway").with_details(e))?;

    let mut builder = HttpResponse::build(status);
    for (name, value) in response.headers().iter() {
        if !is_forwardable(name.as_str()) || name.as_str() == "content-length" {
            continue;
        }
        if let Ok(value) = header::HeaderValue::from_bytes(value.as_bytes()) {
            builder.append_header((name.as_str(), value));
        }
    }

    let content_length = body_length(response.headers(), response.content_length(), head);
    let upstream = response.url().host_str().unwrap_or_default().to_string();

    let body = response
        .bytes_stream()
        .map(move |item| {
            if let Err(e) = &item {
                tracing::warn!(upstream = %upstream, error = %e, "upstream body stream failed");
            }
            item
        })
        .flat_map(|item| match item {
            Ok(chunk) => stream::iter(split_chunk(chunk, MAX_CHUNK_SIZE).into_iter().map(Ok).collect::<Vec<_>>()),
            Err(e) => stream::iter(vec![Err(e)]),
        });

    match content_length {
        Some(length) => Ok(builder.body(SizedStream::new(length, body))),
        None => Ok(builder.body(BodyStream::new(body))),
    }
}

/// Length to announce downstream. HEAD responses carry no body, so the
/// upstream's advertised `content-length` is taken from the header instead.
fn body_length(headers: &reqwest::header::HeaderMap, hint: Option<u64>, head: bool) -> Option<u64> {
    if !head {
        return hint;
    }

    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn split_chunk(mut chunk: Bytes, max: usize) -> Vec<Bytes> {
    let mut pieces = Vec::with_capacity(chunk.len() / max + 1);
    while chunk.len() > max {
        pieces.push(chunk.split_to(max));
    }
    if !chunk.is_empty() {
        pieces.push(chunk);
    }
    pieces
}
