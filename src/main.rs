use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use atelier_api::{
    config,
    handlers,
    services::{FlutterwaveGateway, Mailer, NoopMailer, PaymentGateway, ResendMailer},
    store::{memory::MemoryRowStore, sheets::SheetsRowStore, RowStore},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&config);
    info!(
        environment = %config.environment,
        store_backend = %config.store_backend,
        "starting atelier-api"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let store: Arc<dyn RowStore> = match config.store_backend.as_str() {
        "sheets" => Arc::new(SheetsRowStore::new(
            http.clone(),
            config.sheets_api_base.clone(),
            config.sheets_spreadsheet_id.clone(),
            config.sheets_access_token.clone(),
        )),
        _ => Arc::new(MemoryRowStore::new()),
    };

    let gateway: Arc<dyn PaymentGateway> = Arc::new(FlutterwaveGateway::new(
        http.clone(),
        config.flutterwave_api_base.clone(),
        config.flutterwave_secret_key.clone(),
    ));

    let mailer: Arc<dyn Mailer> = if config.resend_api_key.is_empty() {
        Arc::new(NoopMailer)
    } else {
        Arc::new(ResendMailer::new(
            http,
            config.resend_api_base.clone(),
            config.resend_api_key.clone(),
            config.email_from.clone(),
        ))
    };

    let cors = if config.cors_allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    let addr = config.server_addr();
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let state = AppState::new(config, store, gateway, mailer);
    let app = handlers::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received terminate signal"),
    }
}
