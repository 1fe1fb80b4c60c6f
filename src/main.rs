use anyhow::Context;
use axum::http::StatusCode;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod errors;
mod handlers;
mod models;
mod openapi;
mod routes;
mod services;
mod state;

use config::Config;
use routes::app_router;
use services::{
    email::EmailNotifier,
    notification::{LogNotifier, Notifier},
    payroll::WeekendApproximation,
};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ─── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("attendance_payroll=debug,tower_http=info")),
        )
        .init();

    // ─── Config ───────────────────────────────────────────────────────────────
    let config = Config::from_env()?;
    let addr = config.server_addr();

    // ─── Database ─────────────────────────────────────────────────────────────
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .context("Failed to run database migrations")?;

    info!("Database connected and migrations applied");

    // ─── App State ────────────────────────────────────────────────────────────
    let notifier: Arc<dyn Notifier> = match config.smtp.clone() {
        Some(smtp) => {
            info!("Payslips will be emailed via {}", smtp.host);
            Arc::new(EmailNotifier::new(smtp))
        }
        None => {
            warn!("SMTP not configured; payslips will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let work_days = Arc::new(WeekendApproximation {
        weekend_days: config.weekend_days_per_month,
    });
    let request_timeout = Duration::from_secs(config.request_timeout_secs);
    let state = AppState::new(db.clone(), config, notifier, work_days);

    // ─── Router ───────────────────────────────────────────────────────────────
    let app = app_router(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // ─── Start Server ─────────────────────────────────────────────────────────
    info!("Attendance & Payroll API listening on http://{}", addr);
    info!("Swagger UI:  http://{}/docs", addr);
    info!("Health:      http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    db.close().await;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
