use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// What cert-manager wants done with a challenge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChallengeAction {
    Present,
    CleanUp,
}

impl ChallengeAction {
    /// Lowercase form used in cloud router paths and bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeAction::Present => "present",
            ChallengeAction::CleanUp => "cleanup",
        }
    }
}

impl Display for ChallengeAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS-01 challenge as sent by cert-manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub uid: String,
    pub action: ChallengeAction,
    #[serde(rename = "type", default)]
    pub challenge_type: String,
    /// Name the certificate is being issued for, e.g. `example.com`.
    pub dns_name: String,
    /// TXT record value.
    pub key: String,
    #[serde(default)]
    pub resource_namespace: String,
    /// Fully qualified record name, e.g. `_acme-challenge.example.com.`.
    #[serde(rename = "resolvedFQDN")]
    pub resolved_fqdn: String,
    #[serde(default)]
    pub resolved_zone: String,
    #[serde(default)]
    pub allow_ambient_credentials: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}
