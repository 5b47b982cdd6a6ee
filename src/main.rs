use actix_cors::Cors;
use actix_files::Files;
use actix_web::{http::header, middleware::NormalizePath, web, App, HttpServer};
use tokio::sync::watch;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use courseware_backend::{
    background_task::start_temp_sweep_task,
    db::postgres::{create_pool, run_migrations},
    graceful_shutdown::broadcast_shutdown,
    middlewares::auth::AuthMiddleware,
    routes::configure_routes,
    settings::AppConfig,
    storage::provisioner::ensure_dir,
    AppState,
};

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn build_cors(config: &AppConfig) -> Cors {
    let origins = config.cors_origins();
    let cors = if origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.is_production());
    tracing::info!("Loaded configuration: {:?}", config);

    let pool = match create_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run_migrations(&pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    for dir in [&config.uploads.root, &config.uploads.tmp_dir] {
        if let Err(e) = ensure_dir(dir).await {
            tracing::error!("Upload directory unavailable: {}", e);
            std::process::exit(1);
        }
    }

    let app_state = web::Data::new(AppState::new(&config, pool));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(start_temp_sweep_task(
        config.uploads.tmp_dir.clone(),
        config.uploads.temp_max_age(),
        config.uploads.sweep_interval(),
        shutdown_rx,
    ));

    let server_addr = format!("{}:{}", config.host, config.port);
    tracing::info!(
        "🚀 Starting {} v{} on {}",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr
    );

    let server_config = config.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(AuthMiddleware)
            .wrap(NormalizePath::trim())
            .wrap(build_cors(&server_config))
            .wrap(TracingLogger::default())
            .service(Files::new("/uploads", &server_config.uploads.root))
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .bind(server_addr)?
    .run();

    let handle = server.handle();
    tokio::spawn(async move {
        broadcast_shutdown(shutdown_tx).await;
        handle.stop(true).await;
    });

    server.await
}
