// gateway/src/webhooks/events.rs
use common::models::instance::InstanceContext;
use serde::Deserialize;

/// Version and kind header shared by every webhook payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventContext {
    pub id: String,
    pub kind: String,
}

impl From<EventContext> for InstanceContext {
    fn from(context: EventContext) -> Self {
        InstanceContext {
            id: context.id,
            kind: context.kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAddedToContext {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    pub context: EventContext,
    #[serde(default)]
    pub consented_scopes: Vec<String>,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInstanceUpdated {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(default)]
    pub context: EventContext,
    #[serde(default)]
    pub consented_scopes: Vec<String>,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInstanceSecretRotated {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(default)]
    pub context: EventContext,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInstanceRemovedFromContext {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub id: String,
    #[serde(default)]
    pub context: EventContext,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Every webhook the gateway understands
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    AddedToContext(ExtensionAddedToContext),
    InstanceUpdated(ExtensionInstanceUpdated),
    SecretRotated(ExtensionInstanceSecretRotated),
    RemovedFromContext(ExtensionInstanceRemovedFromContext),
}

impl WebhookEvent {
    pub fn envelope(&self) -> &Envelope {
        match self {
            WebhookEvent::AddedToContext(event) => &event.envelope,
            WebhookEvent::InstanceUpdated(event) => &event.envelope,
            WebhookEvent::SecretRotated(event) => &event.envelope,
            WebhookEvent::RemovedFromContext(event) => &event.envelope,
        }
    }

    pub fn instance_id(&self) -> &str {
        match self {
            WebhookEvent::AddedToContext(event) => &event.id,
            WebhookEvent::InstanceUpdated(event) => &event.id,
            WebhookEvent::SecretRotated(event) => &event.id,
            WebhookEvent::RemovedFromContext(event) => &event.id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("error decoding webhook body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown API version in webhook body: {0:?}")]
    UnknownVersion(String),

    #[error("unknown webhook kind {0:?}")]
    UnknownKind(String),
}

/// Decode a webhook body, picking the payload type from its envelope
pub fn decode(body: &[u8]) -> Result<WebhookEvent, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    match envelope.api_version.as_str() {
        "v1" => decode_v1(&envelope.kind, body),
        _ => Err(DecodeError::UnknownVersion(envelope.api_version)),
    }
}

fn decode_v1(kind: &str, body: &[u8]) -> Result<WebhookEvent, DecodeError> {
    let event = match kind {
        "ExtensionAddedToContext" => WebhookEvent::AddedToContext(serde_json::from_slice(body)?),
        "ExtensionInstanceUpdated" | "InstanceUpdated" => {
            WebhookEvent::InstanceUpdated(serde_json::from_slice(body)?)
        }
        "ExtensionInstanceSecretRotated" | "SecretRotated" => {
            WebhookEvent::SecretRotated(serde_json::from_slice(body)?)
        }
        "ExtensionInstanceRemovedFromContext" | "InstanceRemovedFromContext" => {
            WebhookEvent::RemovedFromContext(serde_json::from_slice(body)?)
        }
        other => return Err(DecodeError::UnknownKind(other.to_string())),
    };

    Ok(event)
}
