//! R-Print-Canvas
//!
//! HTTP service for placing customer designs into garment print areas and
//! compositing them onto product mockups, using Rust + Actix-Web.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use tracing::info;
use tracing_actix_web::TracingLogger;

use r_print_canvas::api;
use r_print_canvas::config::Settings;
use r_print_canvas::domain::load_catalog;
use r_print_canvas::engine::{spawn_idle_sweeper, PrintAreaRegistry};
use r_print_canvas::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("r_print_canvas=info".parse()?)
                .add_directive("actix_web=info".parse()?)
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting R-Print-Canvas v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    // Product catalog: file on disk when configured, built-in otherwise
    let registry = match settings.catalog.path {
        Some(ref path) => {
            let products = load_catalog(path)
                .with_context(|| format!("Failed to load catalog from {}", path.display()))?;
            PrintAreaRegistry::new(products)
        }
        None => PrintAreaRegistry::builtin().context("Built-in catalog is invalid")?,
    };
    info!("Loaded {} products", registry.product_count());

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(
        AppState::new(settings, registry).context("Failed to initialize asset loader")?,
    );

    // Expire abandoned editing sessions in the background
    let idle_timeout = Duration::from_secs(app_state.settings.sessions.idle_timeout_secs);
    let sweep_every = Duration::from_secs(app_state.settings.sessions.sweep_interval_secs);
    let sweeper = spawn_idle_sweeper(Arc::clone(&app_state.sessions), idle_timeout, sweep_every);

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "r-print-canvas"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    sweeper.abort();
    Ok(())
}
