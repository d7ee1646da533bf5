use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use sqlx::SqlitePool;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod identity;
mod model;
mod models;
mod routes;
mod tracking;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::tracking::reconciler;
use crate::utils::{device_cache, time::local_now};
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "OGS backend"
}

/// Closes stale records once at startup and then every `period`.
async fn run_reconcile_loop(pool: SqlitePool, period: Duration) {
    let mut ticker = actix_web::rt::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = reconciler::reconcile(&pool, local_now()).await {
            error!(error = %e, "Scheduled reconciliation failed");
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "ogs.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    device_cache::init(config.device_cache_ttl);
    let pool = init_db(&config).await?;

    actix_web::rt::spawn(run_reconcile_loop(pool.clone(), config.reconcile_interval));

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
