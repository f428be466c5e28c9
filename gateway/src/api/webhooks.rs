// gateway/src/api/webhooks.rs
use actix_web::{post, web, HttpRequest, HttpResponse};

use crate::error::GatewayError;
use crate::store::InstanceStore;
use crate::webhooks::{self, Verifier, VerifyError};

/// Receive a signed webhook: verify, decode, apply, echo
#[post("/webhooks")]
pub async fn receive(
    req: HttpRequest,
    body: web::Bytes,
    verifier: web::Data<Verifier>,
    instances: web::Data<dyn InstanceStore>,
) -> Result<HttpResponse, GatewayError> {
    if let Err(e) = verifier.verify_request(req.headers(), &body).await {
        return Err(verification_failure(e));
    }

    let event = webhooks::decode(&body).map_err(|e| {
        tracing::debug!(error = %e, "invalid webhook request");
        GatewayError::bad_request("could not decode webhook request").with_details(e)
    })?;

    let envelope = event.envelope().clone();
    let instance_id = event.instance_id().to_string();
    tracing::debug!(
        webhook.kind = %envelope.kind,
        webhook.version = %envelope.api_version,
        instance_id = %instance_id,
        "handling webhook"
    );

    webhooks::apply(event, instances.get_ref()).await.map_err(|e| {
        tracing::warn!(webhook.kind = %envelope.kind, instance_id = %instance_id, error = %e, "webhook could not be applied");
        GatewayError::bad_request("could not decode webhook request").with_details(e)
    })?;

    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}

fn verification_failure(error: VerifyError) -> GatewayError {
    match &error {
        VerifyError::MissingHeader(header) => {
            tracing::debug!(header = %header, "webhook without signature header");
        }
        VerifyError::KeyResolution { serial, source } => {
            tracing::warn!(serial = %serial, error = %source, "webhook signing key could not be resolved");
        }
        other => {
            tracing::debug!(error = %other, "invalid webhook signature");
        }
    }

    GatewayError::forbidden("invalid request signature").with_details("signature verification failed")
}
