use std::{future::Future, io, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use crate::{
    credentials::ProcessEnv,
    settings::{LogFormat, Settings},
    solver::{cubecloud::CubeCloudSolver, Solver},
};

mod challenge;
mod credentials;
mod settings;
mod solver;
mod tls;
mod webhook;

build_info::build_info!(fn build_info);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Settings::new()?;

    init_tracing(cfg.log_format)?;

    run(cfg).await
}

fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    Ok(())
}

async fn run(cfg: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let solver = CubeCloudSolver::initialize(&ProcessEnv)?;
    info!(
        version = %build_info().crate_info.version,
        solver = solver.name(),
        group = %cfg.group_name,
        "initialized solver"
    );

    let app = webhook::app(Arc::new(solver), &cfg.group_name);

    let tls_config = match cfg.tls_files() {
        Some((cert, key)) => Some(tls::load_server_config(cert, key)?),
        None => None,
    };

    let listener = TcpListener::bind(cfg.listen).await?;

    match tls_config {
        Some(tls_config) => {
            info!("listening on https://{}", listener.local_addr()?);
            tls::serve(listener, app, tls_config, shutdown_signal()).await;
        }
        None => {
            warn!("no TLS certificate configured, kube-apiserver needs a TLS terminator in front");
            info!("listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = signal_or_pending("ctrl-c", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = signal_or_pending("SIGTERM", async {
        let mut sig = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        sig.recv().await;
        Ok::<(), io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolves when `signal` fires. A handler that could not be installed never resolves.
async fn signal_or_pending<F>(name: &str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}
