use std::{net::SocketAddr, path::{Path, PathBuf}};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// API group cert-manager routes challenges for this webhook to.
    pub group_name: String,
    pub listen: SocketAddr,
    pub log_format: LogFormat,
    /// PEM certificate chain. Without it the webhook serves plain HTTP and
    /// needs a TLS terminator in front, as kube-apiserver only speaks HTTPS.
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix("WEBHOOK"))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("listen", "0.0.0.0:8443")?
            .set_default("log_format", "text")?
            .add_source(File::with_name("config").required(false))
            .add_source(File::with_name("/etc/cubecloud-webhook/config").required(false))
            .add_source(env)
            .build()?;

        let settings: Self = cfg.try_deserialize()?;
        if settings.group_name.is_empty() {
            return Err(ConfigError::Message("group_name must not be empty".to_owned()));
        }
        if settings.tls_cert_file.is_some() != settings.tls_key_file.is_some() {
            return Err(ConfigError::Message(
                "tls_cert_file and tls_key_file must be set together".to_owned(),
            ));
        }

        Ok(settings)
    }

    /// Certificate and key paths, when HTTPS is configured.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_file, &self.tls_key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
