use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
};
use db::DBService;
use services::services::{
    associations::AssociationService, auth::AuthService, chat::ChatService,
    donations::DonationService, logo_storage::LogoStorage, users::UserService,
};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use config::Config;

/// Request bodies may carry a logo of up to 2 MiB plus form fields.
const BODY_LIMIT: usize = 4 * 1024 * 1024;

const STORAGE_CSP: &str = "default-src 'none'; img-src 'self'; style-src 'unsafe-inline'; sandbox";

#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    storage: LogoStorage,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        let storage = LogoStorage::new(config.storage_dir.clone());
        Self {
            db,
            config: Arc::new(config),
            storage,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &LogoStorage {
        &self.storage
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.db.pool.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.pool.clone())
    }

    pub fn associations(&self) -> AssociationService {
        AssociationService::new(self.db.pool.clone(), self.storage.clone())
    }

    pub fn donations(&self) -> DonationService {
        DonationService::new(self.db.pool.clone())
    }

    pub fn chat(&self) -> ChatService {
        ChatService::new(self.db.pool.clone())
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,server=debug,services=debug,db=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn cors(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    match config.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(AllowOrigin::exact(origin)),
        Some(Err(e)) => {
            warn!(error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Uploaded files. SVG logos may carry script, so they are sandboxed and
/// never sniffed into another type.
fn storage_router(storage: &LogoStorage) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(storage.root()))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(STORAGE_CSP),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .nest_service("/storage", storage_router(state.storage()))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors(state.config()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
