use std::{net::SocketAddr, path::Path, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    ServiceExt,
};
use tower_http::{
    cors::CorsLayer,
    normalize_path::NormalizePath,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod error;
mod model;
mod routes;
mod seed;

use auth::{PasswordHasher, TokenSigner, TOKEN_HEADER};
use config::AppEnv;
use db::{PgContactStore, PgUserStore};
use routes::{api_router, AppState};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const BODY_LIMIT: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load()?;
    info!("Starting Galaxy Grid API in {:?} mode", cfg.env);
    if cfg.uses_default_secret() && cfg.env != AppEnv::Production {
        warn!("JWT_SECRET is not set; signing tokens with the development key");
    }

    // Connect to PostgreSQL and bring the schema up to date
    let pool = db::create_pool(&cfg.database_url, cfg.db_max_connections).await?;
    db::migrate(&pool).await?;
    info!("Connected to Postgres");

    let users = Arc::new(PgUserStore::new(pool.clone()));
    let contacts = Arc::new(PgContactStore::new(pool));
    let passwords = PasswordHasher::new(cfg.bcrypt_cost);
    let tokens = TokenSigner::new(&cfg.jwt_secret, chrono::Duration::days(cfg.token_ttl_days))
        .map_err(|_| "JWT_SECRET cannot be used as an HMAC key")?;

    if let Some(admin) = &cfg.seed_admin {
        seed::ensure_admin(users.as_ref(), &passwords, admin).await?;
    }

    let state = AppState {
        users,
        contacts,
        tokens: Arc::new(tokens),
        passwords,
    };

    let static_dir = Path::new(&cfg.static_dir);
    let serve_dir = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(static_dir.join("index.html")));

    let cors = CorsLayer::new()
        .allow_origin(cfg.frontend_url.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(TOKEN_HEADER),
        ]);

    let app = api_router()
        // Everything outside /api is the admin/client bundle
        .fallback_service(serve_dir)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);
    // Runs before routing, so `/api/contacts/` reaches the `/api/contacts` route
    let app = NormalizePath::trim_trailing_slash(app);

    let addr = SocketAddr::new(cfg.bind_addr, cfg.http_port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
