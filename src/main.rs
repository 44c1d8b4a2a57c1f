use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use tender_desk::app::{app, AppState};
use tender_desk::config::{self, AppConfig};
use tender_desk::database::{DatabaseManager, MemoryRepository, PgRepository, Repository};
use tender_desk::notify::{LogSender, NotificationSender, SmtpSender};
use tender_desk::storage::LocalFileStore;
use tender_desk::types::{SystemClock, TenantId};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting Tender Desk in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let (repo, pg) = open_repository(config).await?;
    let sender = open_sender(config)?;
    let files = Arc::new(LocalFileStore::new(&config.storage.root));

    let mut state = AppState::new(
        repo,
        files,
        sender,
        Arc::new(SystemClock),
        config.scheduler.clone(),
        &config.security.jwt_secret,
    )
    .with_upload_limit(config.api.max_upload_bytes);
    if config.security.enable_cors {
        state = state.with_cors(config.security.cors_origins.clone());
    }

    let scheduler_loops = state.schedulers.spawn_configured();

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Tender Desk listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for handle in &scheduler_loops {
        handle.abort();
    }
    futures::future::join_all(scheduler_loops).await;
    if let Some(pg) = pg {
        pg.manager().close_all().await;
    }
    tracing::info!("Shut down");
    Ok(())
}

/// Postgres when DATABASE_URL is set, otherwise an in-memory store
async fn open_repository(config: &AppConfig) -> anyhow::Result<(Arc<dyn Repository>, Option<Arc<PgRepository>>)> {
    if config.database.url.is_none() {
        tracing::warn!("DATABASE_URL not set; using in-memory repository (data is lost on restart)");
        return Ok((Arc::new(MemoryRepository::new()), None));
    }

    let manager = DatabaseManager::new(&config.database).context("invalid database configuration")?;
    let pg = Arc::new(PgRepository::new(manager));

    for name in &config.scheduler.tenants {
        let tenant = TenantId::new(name.as_str());
        match pg.install_schema(&tenant).await {
            Ok(()) => tracing::info!(
                "Tenant {} ready in database {}",
                tenant,
                DatabaseManager::tenant_database_name(&tenant)
            ),
            Err(e) => tracing::error!("Tenant {} schema setup failed: {}", tenant, e),
        }
        if let Err(e) = pg.manager().health_check(&tenant).await {
            tracing::warn!("Tenant {} database unhealthy: {}", tenant, e);
        }
    }

    let repo: Arc<dyn Repository> = pg.clone();
    Ok((repo, Some(pg)))
}

fn open_sender(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match SmtpSender::from_config(&config.mail).context("invalid mail configuration")? {
        Some(smtp) => {
            tracing::info!("Sending mail via {}", config.mail.smtp_host.as_deref().unwrap_or_default());
            Ok(Arc::new(smtp))
        }
        None => {
            tracing::warn!("MAIL_SMTP_HOST not set; notifications are only logged");
            Ok(Arc::new(LogSender))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
