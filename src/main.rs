use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use authsync::config::Config;
use authsync::email::{DisabledMailer, ResetMailer, SmtpMailer};
use authsync::identity::firebase::FirebaseAuth;
use authsync::reset::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!("Starting AuthSync ({})", config.environment.as_str());

    let firebase = FirebaseAuth::from_config(&config)
        .inspect_err(|e| tracing::error!("Error initializing identity provider: {e}"))?;
    tracing::info!("Identity provider initialized for project {}", firebase.project_id());

    let mailer: Arc<dyn ResetMailer> = match config.smtp.as_ref() {
        Some(smtp) => {
            let mailer = SmtpMailer::new(smtp)
                .inspect_err(|e| tracing::error!("Error initializing SMTP: {e}"))?;
            tracing::info!("SMTP configured via {}:{}", smtp.host, smtp.port);
            Arc::new(mailer)
        }
        None => {
            tracing::warn!("SMTP not configured, password reset emails will not be delivered");
            Arc::new(DisabledMailer)
        }
    };

    let addr = SocketAddr::new(config.host, config.port);
    let (app, state) = authsync::build_app(config, Arc::new(firebase), mailer);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = sweeper::spawn(
        state.reset.store().clone(),
        vec![state.api_limiter.clone(), state.reset_limiter.clone()],
        state.config.sweep_interval,
        shutdown_rx,
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");
    tracing::info!("Health check: http://{addr}/health");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = ctrl_c => "interrupt",
        _ = terminate => "terminate",
    };

    tracing::info!("Received {received} signal, draining requests before stopping the sweeper");
}
