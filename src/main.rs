//! ISPDesk Pricing Backend Server
//!
//! Serves quotes, margin reports and pricing maintenance over HTTP, and runs
//! the registrar price sync, pricing archival and email delivery in the
//! background.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use ispdesk_api::{configure_routes, AppState};
use ispdesk_core::config::EmailConfig;
use ispdesk_core::AppConfig;
use ispdesk_db::{create_pool, run_migrations};
use ispdesk_registrar::ConfiguredClientFactory;
use ispdesk_services::{
    spawn_archive_job, spawn_price_sync_job, EmailQueueService, EmailSender, EmailWorker,
    LogEmailSender, RelayEmailSender, ServiceContext,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// LOG_FORMAT=json switches to structured JSON lines.
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ispdesk={0},ispdesk_api={0},ispdesk_services={0},ispdesk_db={0},\
             ispdesk_registrar={0},actix_web=info,sqlx=warn",
            log_level
        ))
    });

    let json = env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Pick the delivery backend for queued emails
fn email_sender(config: &EmailConfig, timeout: Duration) -> anyhow::Result<Arc<dyn EmailSender>> {
    match config.relay_url.as_deref() {
        Some(url) => {
            info!("Delivering email through relay {}", url);
            let sender = RelayEmailSender::new(url, &config.from_address, timeout)
                .context("Failed to build email relay client")?;
            Ok(Arc::new(sender))
        }
        None => {
            warn!("No email relay configured; queued emails are only logged");
            Ok(Arc::new(LogEmailSender))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!(
        "Starting ISPDesk Pricing Backend v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = AppConfig::load().context("Failed to load configuration")?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(ServiceContext::from_pool(pool));

    let factory = ConfiguredClientFactory::new(config.registrar.clone())
        .context("Failed to configure registrar clients")?;

    // Email queue and its worker
    let (email_queue, email_receiver) =
        EmailQueueService::new(Arc::clone(&ctx.emails), config.email.clone());
    let email_queue = Arc::new(email_queue);
    let sender = email_sender(
        &config.email,
        Duration::from_millis(config.registrar.request_timeout_ms),
    )?;
    let worker = EmailWorker::new(Arc::clone(&email_queue), sender, email_receiver);
    let email_handle = tokio::spawn(worker.run(shutdown.clone()));

    let state = AppState::new(
        Arc::clone(&ctx),
        &config,
        Arc::new(factory),
        email_queue,
        shutdown.clone(),
    );

    // Background jobs
    let sync_handle = spawn_price_sync_job(
        Arc::clone(&state.price_sync),
        Duration::from_secs(config.registrar.sync_interval_secs.max(1)),
        shutdown.clone(),
    );
    let archive_handle = spawn_archive_job(
        Arc::clone(&state.pricing),
        Duration::from_secs(config.pricing.archive_interval_secs.max(1)),
        shutdown.clone(),
    );

    let bind_addr = config.server_addr();
    let workers = config.server.workers.max(1);
    let cors_origins = config.server.cors_origins.clone();
    let client_timeout = Duration::from_secs(config.server.timeout_secs);

    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let server = HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                if let Ok(origin_str) = origin.to_str() {
                    cors_origins_inner
                        .split(',')
                        .any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::JsonConfig::default().limit(256 * 1024))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message,
                        "status": 400,
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .client_request_timeout(client_timeout)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    // actix stops the server on SIGINT/SIGTERM; background tasks follow
    let result = server.await;
    info!("HTTP server stopped, shutting down background tasks");
    shutdown.cancel();

    for (name, handle) in [
        ("price sync", sync_handle),
        ("archive", archive_handle),
        ("email worker", email_handle),
    ] {
        if let Err(e) = handle.await {
            warn!("{} task ended abnormally: {}", name, e);
        }
    }

    result.context("HTTP server failed")
}
