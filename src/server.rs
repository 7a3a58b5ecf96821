use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::handlers::{
    create_paste, delete_paste, get_paste, get_stats, health_check, list_pastes, AppState,
    SharedState,
};
use crate::metrics::RequestStats;
use crate::middleware::admission;
use crate::ratelimit::RateLimiter;
use crate::redis::RedisStore;
use crate::service::PasteService;
use crate::store::{MemoryStore, PasteStore, StoreError};

/// Build application state from configuration, selecting the Redis or
/// in-memory backend.
pub fn build_state(config: &Config) -> Result<SharedState, StoreError> {
    build_state_with_clock(config, Arc::new(SystemClock))
}

pub fn build_state_with_clock(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Result<SharedState, StoreError> {
    let retention_secs = config.pastes.retention.as_secs();

    let (store, redis): (Arc<dyn PasteStore>, Option<Arc<RedisStore>>) = match &config.redis_url {
        Some(url) => {
            let redis = Arc::new(RedisStore::new(url, retention_secs)?);
            (Arc::clone(&redis) as Arc<dyn PasteStore>, Some(redis))
        }
        None => (Arc::new(MemoryStore::new(retention_secs)), None),
    };

    Ok(Arc::new(AppState {
        service: PasteService::new(store, config.pastes.clone(), Arc::clone(&clock)),
        limiter: RateLimiter::new(config.rate_limits.clone(), Arc::clone(&clock)),
        stats: RequestStats::new(clock),
        redis,
    }))
}

/// Assemble the router: operation surface, admission/stats middleware,
/// tracing and CORS layers.
pub fn create_app(state: SharedState, config: &Config) -> Router {
    Router::new()
        .route("/paste", post(create_paste))
        .route("/paste/:id", get(get_paste).delete(delete_paste))
        .route("/pastes", get(list_pastes))
        .route("/admin/stats", get(get_stats))
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.allowed_origins))
                .layer(axum::middleware::from_fn_with_state(
                    Arc::clone(&state),
                    admission,
                )),
        )
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub struct Server {
    app: Router,
    state: SharedState,
    bind_addr: SocketAddr,
    cleanup_interval: std::time::Duration,
}

impl Server {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let state = build_state(config)?;
        Ok(Self {
            app: create_app(Arc::clone(&state), config),
            state,
            bind_addr: config.bind_addr,
            cleanup_interval: config.cleanup_interval,
        })
    }

    pub async fn run(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        tracing::info!(addr = %self.bind_addr, "pastebox server listening");

        let state = Arc::clone(&self.state);
        let cleanup_interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let stale_windows = state.limiter.cleanup_expired();
                match state.service.sweep().await {
                    Ok(purged) => {
                        tracing::debug!(stale_windows, purged, "periodic cleanup")
                    }
                    Err(err) => tracing::warn!(error = %err, "expiry sweep failed"),
                }
            }
        });

        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("received terminate signal, shutting down");
        },
    }
}
