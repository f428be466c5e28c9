// common/src/models/instance.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owning context of an extension instance (a customer or a project)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceContext {
    pub id: String,
    pub kind: String,
}

/// One installation of the proxied application in an owning context.
///
/// Records are created, changed and removed only by verified webhook events.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInstance {
    pub id: String,
    pub enabled: bool,
    pub context: InstanceContext,
    pub scopes: Vec<String>,
    /// Opaque to the gateway; used by the platform side only
    pub secret: Vec<u8>,
}

impl ExtensionInstance {
    /// Point-in-time copy embedded into sessions. Carries no secret.
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id.clone(),
            enabled: self.enabled,
            context: self.context.clone(),
            scopes: self.scopes.clone(),
        }
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .field("context", &self.context)
            .field("scopes", &self.scopes)
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

/// Instance state as it was when a session was established
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub enabled: bool,
    pub context: InstanceContext,
    pub scopes: Vec<String>,
}
