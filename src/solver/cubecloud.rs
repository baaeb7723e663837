use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use crate::{
    challenge::{ChallengeAction, ChallengeRequest},
    credentials::{Credentials, CredentialsError, EnvSource},
};

pub const SOLVER_NAME: &str = "cube-cloud-dns-01-solver";

const CHALLENGE_PATH: &str = "_cloud-router/dns-challenge/";

/// Solver backed by the Cube Cloud router API.
#[derive(Debug)]
pub struct CubeCloudSolver {
    base_url: Url,
    credentials: Credentials,
    client: Client,
}

impl CubeCloudSolver {
    pub fn new(credentials: Credentials) -> Result<Self, CubeCloudError> {
        let base_url = Url::parse(&format!("https://{}/", credentials.api_domain()))?;
        Ok(Self::with_base_url(base_url, credentials))
    }

    fn with_base_url(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
            client: Client::new(),
        }
    }

    pub fn endpoint(&self, action: ChallengeAction) -> Result<Url, url::ParseError> {
        self.base_url.join(CHALLENGE_PATH)?.join(action.as_str())
    }

    async fn send(&self, ch: &ChallengeRequest, action: ChallengeAction) -> Result<(), CubeCloudError> {
        let url = self.endpoint(action)?;
        let body = CloudRouterRequest {
            uid: &ch.uid,
            action: action.as_str(),
            key: &ch.key,
            resolved_fqdn: &ch.resolved_fqdn,
            dns_name: &ch.dns_name,
        };

        let response = self.client.post(url)
            .bearer_auth(self.credentials.api_token())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CubeCloudError::Status {
                action,
                status: status.as_u16(),
                body,
            });
        }

        info!(%action, fqdn = %ch.resolved_fqdn, "TXT record accepted by cloud router");

        Ok(())
    }
}

#[async_trait::async_trait]
impl super::Solver for CubeCloudSolver {
    type Error = CubeCloudError;

    fn name(&self) -> &str { SOLVER_NAME }

    fn initialize(env: &dyn EnvSource) -> Result<Self, Self::Error> {
        Self::new(Credentials::from_env(env)?)
    }

    #[tracing::instrument(skip_all, fields(uid = %ch.uid, fqdn = %ch.resolved_fqdn))]
    async fn present(&self, ch: &ChallengeRequest) -> Result<(), Self::Error> {
        self.send(ch, ChallengeAction::Present).await
    }

    #[tracing::instrument(skip_all, fields(uid = %ch.uid, fqdn = %ch.resolved_fqdn))]
    async fn cleanup(&self, ch: &ChallengeRequest) -> Result<(), Self::Error> {
        self.send(ch, ChallengeAction::CleanUp).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudRouterRequest<'a> {
    uid: &'a str,
    action: &'static str,
    key: &'a str,
    #[serde(rename = "resolvedFQDN")]
    resolved_fqdn: &'a str,
    dns_name: &'a str,
}

#[derive(Debug, Error)]
pub enum CubeCloudError {
    #[error(transparent)]
    CredentialsError(#[from] CredentialsError),
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
    #[error("error making HTTP request: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to {action} DNS-01 challenge: received status code {status} {body}")]
    Status {
        action: ChallengeAction,
        status: u16,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{API_DOMAIN_VAR, API_TOKEN_VAR};
    use crate::solver::Solver;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::json;
    use std::collections::HashMap;

    const TOKEN: &str = "s3cret";

    impl EnvSource for HashMap<&'static str, String> {
        fn var(&self, key: &str) -> Option<String> {
            self.get(key).cloned()
        }
    }

    fn solver_for(server: &Server) -> CubeCloudSolver {
        let base_url = Url::parse(&server.url_str("/")).unwrap();
        let creds = Credentials::new(server.addr().to_string(), TOKEN).unwrap();
        CubeCloudSolver::with_base_url(base_url, creds)
    }

    fn challenge(action: ChallengeAction) -> ChallengeRequest {
        ChallengeRequest {
            uid: "3f6c1a52-8c1e-4a43-9d1c-1f0e0c1d2b3a".to_owned(),
            action,
            challenge_type: "dns-01".to_owned(),
            dns_name: "example.com".to_owned(),
            key: "LoqXcYV8q5ONbJQxbmR7SCTNo3tiAXDfowyjxAjEuX0".to_owned(),
            resource_namespace: "default".to_owned(),
            resolved_fqdn: "_acme-challenge.example.com.".to_owned(),
            resolved_zone: "example.com.".to_owned(),
            allow_ambient_credentials: false,
            config: None,
        }
    }

    fn expected_body(ch: &ChallengeRequest, action: &str) -> serde_json::Value {
        json!({
            "uid": ch.uid,
            "action": action,
            "key": ch.key,
            "resolvedFQDN": ch.resolved_fqdn,
            "dnsName": ch.dns_name,
        })
    }

    #[tokio::test]
    async fn present_posts_challenge() {
        let server = Server::run();
        let ch = challenge(ChallengeAction::Present);
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/_cloud-router/dns-challenge/present"),
                request::headers(contains(("authorization", "Bearer s3cret"))),
                request::headers(contains(("content-type", "application/json"))),
                request::body(json_decoded(eq(expected_body(&ch, "present")))),
            ])
            .respond_with(status_code(200)),
        );

        solver_for(&server).present(&ch).await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_posts_challenge() {
        let server = Server::run();
        let ch = challenge(ChallengeAction::CleanUp);
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/_cloud-router/dns-challenge/cleanup"),
                request::headers(contains(("authorization", "Bearer s3cret"))),
                request::body(json_decoded(eq(expected_body(&ch, "cleanup")))),
            ])
            .respond_with(status_code(200)),
        );

        solver_for(&server).cleanup(&ch).await.unwrap();
    }

    #[tokio::test]
    async fn repeated_present_is_forwarded_each_time() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/_cloud-router/dns-challenge/present"))
                .times(2)
                .respond_with(status_code(200)),
        );

        let solver = solver_for(&server);
        let ch = challenge(ChallengeAction::Present);
        solver.present(&ch).await.unwrap();
        solver.present(&ch).await.unwrap();
    }

    #[tokio::test]
    async fn non_200_carries_status_and_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/_cloud-router/dns-challenge/present"))
                .respond_with(status_code(503).body("zone locked")),
        );

        let err = solver_for(&server)
            .present(&challenge(ChallengeAction::Present))
            .await
            .unwrap_err();

        assert!(matches!(err, CubeCloudError::Status { status: 503, .. }));
        let msg = err.to_string();
        assert!(msg.contains("503"), "{msg}");
        assert!(msg.contains("zone locked"), "{msg}");
    }

    #[tokio::test]
    async fn other_success_codes_are_failures() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/_cloud-router/dns-challenge/cleanup"))
                .respond_with(status_code(204)),
        );

        let err = solver_for(&server)
            .cleanup(&challenge(ChallengeAction::CleanUp))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to cleanup DNS-01 challenge: received status code 204 "
        );
    }

    #[tokio::test]
    async fn unreachable_router_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base_url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let creds = Credentials::new(addr.to_string(), TOKEN).unwrap();
        let solver = CubeCloudSolver::with_base_url(base_url, creds);

        let err = solver
            .present(&challenge(ChallengeAction::Present))
            .await
            .unwrap_err();

        assert!(matches!(err, CubeCloudError::RequestError(_)), "{err:?}");
        assert!(err.to_string().starts_with("error making HTTP request"), "{err}");
    }

    #[test]
    fn initialize_without_token_fails() {
        let env = HashMap::from([(API_DOMAIN_VAR, "router.cube.example".to_owned())]);

        let err = CubeCloudSolver::initialize(&env).unwrap_err();

        assert!(matches!(
            err,
            CubeCloudError::CredentialsError(CredentialsError::Missing(API_TOKEN_VAR))
        ));
    }

    #[test]
    fn initialize_accepts_ipv6_router() {
        let env = HashMap::from([
            (API_DOMAIN_VAR, "[::1]:45043".to_owned()),
            (API_TOKEN_VAR, TOKEN.to_owned()),
        ]);

        let solver = CubeCloudSolver::initialize(&env).unwrap();

        assert_eq!(
            solver.endpoint(ChallengeAction::Present).unwrap().as_str(),
            "https://[::1]:45043/_cloud-router/dns-challenge/present"
        );
    }

    #[test]
    fn initialize_builds_https_endpoints() {
        let env = HashMap::from([
            (API_DOMAIN_VAR, "router.cube.example".to_owned()),
            (API_TOKEN_VAR, TOKEN.to_owned()),
        ]);

        let solver = CubeCloudSolver::initialize(&env).unwrap();

        assert_eq!(solver.name(), SOLVER_NAME);
        assert_eq!(
            solver.endpoint(ChallengeAction::Present).unwrap().as_str(),
            "https://router.cube.example/_cloud-router/dns-challenge/present"
        );
        assert_eq!(
            solver.endpoint(ChallengeAction::CleanUp).unwrap().as_str(),
            "https://router.cube.example/_cloud-router/dns-challenge/cleanup"
        );
    }
}
