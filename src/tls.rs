//! HTTPS serving for the webhook.
//!
//! kube-apiserver reaches aggregated APIs over TLS only, so production
//! deployments either configure a certificate here or put a TLS terminator
//! in front of the plain HTTP listener.

use std::{fs::File, future::Future, io::BufReader, path::Path, sync::Arc, time::Duration};
use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    ServerConfig,
};
use thiserror::Error;
use tokio::{net::TcpListener, time};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// Builds a server config from a PEM certificate chain and private key.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    info!(cert_file = %cert_path.display(), "loaded TLS certificate");

    Ok(config)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| TlsError::read(path, e))?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::read(path, e))?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.display().to_string()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| TlsError::read(path, e))?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| TlsError::read(path, e))?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}

/// Accepts TLS connections and serves `app` on each until `shutdown` resolves.
/// Connections already accepted are left to finish on their own tasks.
pub async fn serve<F>(listener: TcpListener, app: Router, config: ServerConfig, shutdown: F)
where
    F: Future<Output = ()>,
{
    let acceptor = TlsAcceptor::from(Arc::new(config));
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("failed to accept connection: {}", e);
                    time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            },
            _ = &mut shutdown => return,
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!(%peer, "TLS handshake failed: {}", e);
                    return;
                }
            };

            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(%peer, "connection closed with error: {}", e);
            }
        });
    }
}

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {0}")]
    NoCertificates(String),
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    #[error(transparent)]
    RustlsError(#[from] rustls::Error),
}

impl TlsError {
    fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credentials::Credentials,
        solver::cubecloud::CubeCloudSolver,
        webhook,
    };
    use std::path::PathBuf;
    use tokio::sync::oneshot;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn app() -> Router {
        let creds = Credentials::new("router.cube.example", "s3cret").unwrap();
        let solver = CubeCloudSolver::new(creds).unwrap();
        webhook::app(Arc::new(solver), "acme.cube.example")
    }

    #[tokio::test]
    async fn serves_webhook_over_https() {
        let config = load_server_config(&testdata("localhost.crt"), &testdata("localhost.key")).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, app(), config, async move {
            let _ = stopped.await;
        }));

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .unwrap();
        let resp = client.get(format!("https://{}/healthz", addr)).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "ok");

        let plain = reqwest::Client::new().get(format!("http://{}/healthz", addr)).send().await;
        assert!(plain.is_err());

        stop.send(()).unwrap();
        server.await.unwrap();
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_server_config(&testdata("absent.crt"), &testdata("localhost.key")).unwrap_err();

        assert!(matches!(err, TlsError::Read { .. }));
        assert!(err.to_string().contains("absent.crt"), "{err}");
    }

    #[test]
    fn key_file_has_no_certificates() {
        let err = load_server_config(&testdata("localhost.key"), &testdata("localhost.key")).unwrap_err();
        assert!(matches!(err, TlsError::NoCertificates(_)));
    }

    #[test]
    fn certificate_file_has_no_key() {
        let err = load_server_config(&testdata("localhost.crt"), &testdata("localhost.crt")).unwrap_err();
        assert!(matches!(err, TlsError::NoPrivateKey(_)));
    }
}
