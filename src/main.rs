use colabri_sync::config::Config;
use colabri_sync::routes::create_app;
use colabri_sync::store::MemoryStore;
use std::panic;
use std::sync::Arc;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Configuration first: its log level seeds the default filter
    let loaded = Config::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_log_filter().into()))
        .init();

    info!("Starting document store...");
    match &loaded {
        Ok(_) => info!("Configuration loaded (log level: {})", config.log_level),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            warn!("Using default configuration");
        }
    }

    if config.store_url.is_some() {
        warn!("STORE_URL is only read by sync clients; this process serves its own in-memory store");
    }

    let store = Arc::new(MemoryStore::new());
    let app_routes = create_app(store, &config);

    let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.server_address(), e);
            std::process::exit(1);
        }
    };

    info!("🚀 {} running on http://{}", config.service_name, config.server_address());
    info!("📡 Subscriptions available at ws://{}/api/v1/documents/{{doc_id}}/subscribe", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app_routes).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
