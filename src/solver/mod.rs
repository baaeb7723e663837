pub mod cubecloud;

use crate::{challenge::ChallengeRequest, credentials::EnvSource};

/// A DNS-01 solver as invoked by cert-manager.
#[async_trait::async_trait]
pub trait Solver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Name issuers reference this solver by. Unique within a webhook deployment.
    fn name(&self) -> &str;

    /// Builds the solver from its environment. Makes no network calls.
    fn initialize(env: &dyn EnvSource) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Publishes the TXT record for `ch`. May be called repeatedly with the same challenge.
    async fn present(&self, ch: &ChallengeRequest) -> Result<(), Self::Error>;

    /// Removes the TXT record for `ch`. Only the record holding `ch.key` may be removed.
    async fn cleanup(&self, ch: &ChallengeRequest) -> Result<(), Self::Error>;
}
