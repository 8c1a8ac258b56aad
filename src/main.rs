use std::net::SocketAddr;

use anyhow::Context;
use driver_intake::config::AppConfig;
use driver_intake::services::crm::CrmClient;
use driver_intake::{db, errors, routes, AppState};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "driver_intake=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    errors::expose_error_details(config.is_development());

    let storage = db::connect_storage(
        config.database_url.as_deref(),
        config.database_max_connections,
    )
    .await;

    let crm = CrmClient::from_config(&config.crm).context("Failed to build CRM client")?;
    match &crm {
        Some(client) if client.webhook_enabled() => tracing::info!("CRM webhook delivery enabled"),
        _ => tracing::warn!("CRM_WEBHOOK_URL not set, applications will not be sent to the CRM"),
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid BACKEND_HOST/BACKEND_PORT")?;
    tracing::info!(
        host = %addr,
        environment = %config.environment,
        storage = storage.is_available(),
        "Starting driver intake API server"
    );

    let tls = config.tls_cert_path.clone().zip(config.tls_key_path.clone());
    let app = routes::router(AppState {
        storage,
        crm,
        config,
    });

    if let Some((cert, key)) = tls {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
            .await
            .with_context(|| format!("Failed to load TLS certificate {cert}"))?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(None);
            }
        });

        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
