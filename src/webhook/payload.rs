//! Wire types of the cert-manager webhook solver API.

use serde::{Deserialize, Serialize};
use crate::challenge::ChallengeRequest;

pub const PAYLOAD_API_VERSION: &str = "webhook.acme.cert-manager.io/v1alpha1";
pub const PAYLOAD_KIND: &str = "ChallengePayload";

/// Envelope for both directions: cert-manager fills `request`, we fill `response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengePayload {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<ChallengeRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ChallengeResponse>,
}

impl ChallengePayload {
    pub fn response(response: ChallengeResponse) -> Self {
        Self {
            api_version: PAYLOAD_API_VERSION.to_owned(),
            kind: PAYLOAD_KIND.to_owned(),
            request: None,
            response: Some(response),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub uid: String,
    pub success: bool,
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Status>,
}

impl ChallengeResponse {
    pub fn from_result<E: std::error::Error>(uid: String, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                uid,
                success: true,
                result: None,
            },
            Err(e) => Self {
                uid,
                success: false,
                result: Some(Status::failure(500, "InternalError", e.to_string())),
            },
        }
    }
}

/// Subset of the Kubernetes `metav1.Status` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

impl Status {
    pub fn failure(code: u16, reason: &str, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            api_version: None,
            status: "Failure".to_owned(),
            message: message.into(),
            reason: Some(reason.to_owned()),
            code: Some(code),
        }
    }

    /// Top-level form, returned as a whole response body.
    pub fn into_object(self) -> Self {
        Self {
            kind: Some("Status".to_owned()),
            api_version: Some("v1".to_owned()),
            ..self
        }
    }
}

/// Discovery document for the solver's group version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResourceList {
    pub kind: String,
    pub api_version: String,
    pub group_version: String,
    pub resources: Vec<ApiResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResource {
    pub name: String,
    pub singular_name: String,
    pub namespaced: bool,
    pub kind: String,
    pub verbs: Vec<String>,
}

impl ApiResourceList {
    pub fn for_solver(group_version: String, solver_name: &str) -> Self {
        Self {
            kind: "APIResourceList".to_owned(),
            api_version: "v1".to_owned(),
            group_version,
            resources: vec![ApiResource {
                name: solver_name.to_owned(),
                singular_name: solver_name.to_owned(),
                namespaced: false,
                kind: PAYLOAD_KIND.to_owned(),
                verbs: vec!["create".to_owned()],
            }],
        }
    }
}
