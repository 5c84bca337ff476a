use anyhow::Context;
use dotenvy::dotenv;
use dropzone::config::UploadConfig;
use dropzone::services::sink::sweep_stale_artifacts;
use dropzone::utils::size::human_bytes;
use dropzone::{AppState, create_app};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dropzone=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Dropzone...");

    let config = UploadConfig::from_env();

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;

    match sweep_stale_artifacts(&config.upload_dir, config.staging_cleanup_age).await {
        Ok(0) => {}
        Ok(n) => info!("🧹 Removed {} stale temp files", n),
        Err(e) => warn!("Could not sweep stale temp files: {}", e),
    }

    info!(
        "📦 Upload Config: Dir={}, Max Size={}, Overwrite={}, Extensions={:?}, Hash Workers={}",
        config.upload_dir.display(),
        human_bytes(config.max_upload_bytes),
        config.allow_overwrite,
        config.allowed_extensions,
        config.hash_workers
    );

    if !config.uploads_enabled() {
        warn!("🔒 UPLOAD_TOKEN is not set. Uploads are OFF until it is configured.");
    }

    let addr = config.bind_addr.clone();
    let app = create_app(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
