use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod geo;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;
use routes::RateLimits;
use utils::location_cache::LocationCache;

use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Clinic attendance service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    auth::handlers::bootstrap_admin(&pool, &config).await?;

    let limits = RateLimits::from_config(&config)?;
    let location_cache = LocationCache::new(config.location_cache_ttl);

    if config.require_gps || config.require_configured_location {
        info!(
            require_gps = config.require_gps,
            require_configured = config.require_configured_location,
            "Strict geofence policy enabled"
        );
    }

    let warmup_cache = location_cache.clone();
    let warmup_pool = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = warmup_cache.warmup(&warmup_pool).await {
            error!(error = %e, "Failed to warm up location cache");
        }
    });

    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(location_cache.clone()))
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
