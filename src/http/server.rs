//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every API route
//! - Wire up middleware (tracing, request ID, metrics, timeout, body limit,
//!   CORS, rate limit)
//! - Serve plain HTTP or TLS with graceful shutdown

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::SessionStore;
use crate::blockchain::ChainRegistry;
use crate::config::WalletConfig;
use crate::http::handlers::{
    achievements, assets, auth, chains, crypto, defi, market, portfolio, system, transactions, users,
    wallets,
};
use crate::market::{MarketDataProvider, MarketRefresher};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::security::{rate_limit_middleware, RateLimiter};
use crate::storage::SharedStorage;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WalletConfig>,
    pub storage: SharedStorage,
    pub chains: Arc<ChainRegistry>,
    /// Provider behind the `/api/crypto` pass-through endpoints.
    pub market: Arc<dyn MarketDataProvider>,
    pub refresher: Arc<MarketRefresher>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Parsed `auth.launch_date`.
    pub launch_date: NaiveDate,
}

/// HTTP server for the wallet API.
pub struct HttpServer {
    router: Router,
    config: Arc<WalletConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(state);
        Self { router, config }
    }

    fn api_routes() -> Router<AppState> {
        Router::new()
            // auth
            .route("/api/register", post(auth::register))
            .route("/api/login", post(auth::login))
            .route("/api/logout", post(auth::logout))
            .route("/api/user", get(auth::current_user))
            // users
            .route("/api/users", post(users::create_user))
            .route("/api/users/{id}", get(users::get_user))
            .route(
                "/api/users/{id}/addresses",
                get(users::list_addresses).post(users::add_address),
            )
            .route(
                "/api/users/{id}/defi-positions",
                get(defi::list_positions).post(defi::open_position),
            )
            .route("/api/defi-positions/{id}/withdraw", post(defi::withdraw))
            // holdings
            .route("/api/assets", get(assets::list_assets))
            .route("/api/wallets/{user_id}", get(wallets::list_wallets))
            .route("/api/transactions", post(transactions::create_transaction))
            .route("/api/transactions/{user_id}", get(transactions::list_transactions))
            .route("/api/portfolio/{user_id}", get(portfolio::summary))
            .route("/api/portfolio/{user_id}/history", get(portfolio::history))
            // market
            .route("/api/market", get(market::list_market))
            .route("/api/market/refresh", get(market::refresh).post(market::refresh))
            .route("/api/crypto/prices", get(crypto::prices))
            .route("/api/crypto/top", get(crypto::top))
            .route("/api/crypto/info/{symbol}", get(crypto::info))
            .route("/api/crypto/status", get(crypto::status))
            // chains
            .route("/api/chains", get(chains::list_networks))
            .route("/api/chains/{network}/wallets", post(chains::create_wallet))
            .route("/api/chains/{network}/wallets/import", post(chains::import_wallet))
            .route("/api/chains/{network}/balance/{address}", get(chains::balance))
            .route("/api/chains/{network}/send", post(chains::send))
            .route("/api/chains/{network}/validate/{address}", get(chains::validate))
            .route("/api/chains/{network}/history/{address}", get(chains::history))
            // achievements
            .route("/api/achievements", get(achievements::catalog))
            .route("/api/achievements/{user_id}", get(achievements::user_progress))
            .route(
                "/api/achievements/{user_id}/{achievement_id}/progress",
                post(achievements::set_progress),
            )
            // system
            .route("/api/system/health", get(system::health))
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Self::api_routes().fallback(not_found);

        if config.rate_limit.enabled {
            router = router.layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            ));
        }

        router
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(cors_layer(&config.security.cors_origin))
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    /// Router with state applied, for serving or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` resolves, then drain for the
    /// configured grace period.
    pub async fn run_tls<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tls = self.config.listener.tls.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "listener.tls is not configured")
        })?;
        let rustls = load_tls_config(&tls).await?;
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origin.trim() == "*" {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origin
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

async fn not_found() -> crate::http::ApiError {
    crate::http::ApiError::NotFound("Route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::assemble_state;
    use crate::market;
    use crate::storage::MemStorage;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = WalletConfig::default();
        let provider = market::build_provider(&config.market).unwrap();
        let state = assemble_state(
            config,
            Arc::new(MemStorage::new()),
            ChainRegistry::new(),
            provider.clone(),
            provider,
        )
        .unwrap();
        HttpServer::new(state).router()
    }

    #[tokio::test]
    async fn test_fallback_and_request_id() {
        let response = test_router()
            .oneshot(Request::get("/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_assets_on_empty_store() {
        let response = test_router()
            .oneshot(Request::get("/api/assets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }

}
