use std::sync::Arc;

use anyhow::{Context, Result};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use jornada_academica::api::{create_router, AppState};
use jornada_academica::config::Config;
use jornada_academica::database::Database;
use jornada_academica::log_system_event;
use jornada_academica::session_gate::{PortalClient, SessionVerifier};
use jornada_academica::study_service::StudyService;

fn setup_logging(config: &Config) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config
        .logging
        .console_enabled
        .then(|| fmt::layer().with_target(true).with_ansi(true));

    // File output keeps a worker guard alive for the non-blocking writer.
    let (file_layer, guard) = if config.logging.file_enabled {
        std::fs::create_dir_all(&config.logging.log_directory)
            .with_context(|| format!("creating log directory {}", config.logging.log_directory))?;
        let appender =
            tracing_appender::rolling::daily(&config.logging.log_directory, "jornada-academica.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    config.validate()?;

    let _log_guard = setup_logging(&config)?;
    log_system_event!(startup, component = "main", "starting jornada-academica");
    log_system_event!(config, "environment configuration loaded");

    let database = Database::new(&config.database.url)
        .await
        .context("database initialization failed")?;

    let service = StudyService::new(database, config.features.require_data_inicio);
    let session_verifier: Option<Arc<dyn SessionVerifier>> = if config.portal.enabled {
        Some(Arc::new(PortalClient::new(&config.portal.base_url)))
    } else {
        None
    };

    let app = create_router(AppState {
        service,
        session_verifier,
    })
    .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    log_system_event!(
        startup,
        component = "main",
        format!("listening on {address}")
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
