use std::fmt::{Debug, Formatter};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub const API_DOMAIN_VAR: &str = "CLOUD_ROUTER_API_DOMAIN";
pub const API_TOKEN_VAR: &str = "CLOUD_ROUTER_API_TOKEN";

// host[:port] or [ipv6][:port], no scheme or path
static DOMAIN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9.-]*[A-Za-z0-9])?|\[[0-9A-Fa-f:.]+\])(?::[0-9]{1,5})?$").unwrap()
});

/// Source of environment variables.
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Cloud router API location and bearer token.
#[derive(Clone)]
pub struct Credentials {
    api_domain: String,
    api_token: String,
}

impl Credentials {
    pub fn new(api_domain: impl Into<String>, api_token: impl Into<String>) -> Result<Self, CredentialsError> {
        let api_domain = api_domain.into();
        let api_token = api_token.into();

        if api_domain.is_empty() {
            return Err(CredentialsError::Missing(API_DOMAIN_VAR));
        }
        if !DOMAIN_REGEX.is_match(&api_domain) {
            return Err(CredentialsError::InvalidDomain(api_domain));
        }
        if api_token.is_empty() {
            return Err(CredentialsError::Missing(API_TOKEN_VAR));
        }

        Ok(Self { api_domain, api_token })
    }

    /// Loads the domain, then the token. Stops at the first missing value;
    /// an empty value counts as missing.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, CredentialsError> {
        let api_domain = required(env, API_DOMAIN_VAR)?;
        let api_token = required(env, API_TOKEN_VAR)?;

        Self::new(api_domain, api_token)
    }

    pub fn api_domain(&self) -> &str { &self.api_domain }
    pub fn api_token(&self) -> &str { &self.api_token }
}

fn required(env: &dyn EnvSource, key: &'static str) -> Result<String, CredentialsError> {
    env.var(key)
        .filter(|v| !v.is_empty())
        .ok_or(CredentialsError::Missing(key))
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_domain", &self.api_domain)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid cloud router api domain {0:?}: expected host[:port]")]
    InvalidDomain(String),
}
