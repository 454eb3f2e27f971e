//! Image Carbon Server - HTTP API server.
//!
//! ## Endpoints
//!
//! - `POST /api/collect` - Upload and measure a list of image URLs
//! - `POST /api/scrape` - List the images of a site
//! - `GET /api/sites/cache?url=` - Fresh cached images, or `{}`
//! - `GET /api/sites/refresh?url=` - Invalidate a cached site
//! - `POST /api/sites/add` - Store an image set for a site
//! - `POST /api/sites/run` - Collect a site end to end
//! - `GET /api/sites/report?url=&showAll=&monthlyRequests=` - Aggregated report
//! - `GET /api/sites` - Every known site
//! - `POST /api/calculate` - Size and CO2 of images as served
//!
//! ## Example
//!
//! ```no_run
//! use imagecarbon_server::{AppState, Server, ServerConfig};
//! # fn collector() -> imagecarbon_collect::SiteCollector { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(collector());
//!     let server = Server::with_state(ServerConfig::default(), state).unwrap();
//!     server.run().await.unwrap();
//! }
//! ```

pub mod error;
mod handlers;
pub mod models;
pub mod state;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use error::{ApiError, Result};
pub use state::AppState;

/// Default server port.
pub const DEFAULT_PORT: u16 = 48780;

/// Default server host (localhost only for security).
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1).
    pub host: String,
    /// Port to bind to (default: 48780).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {0}: {1}")]
    BindError(SocketAddr, std::io::Error),

    /// Server runtime error.
    #[error("server error: {0}")]
    Runtime(String),
}

/// The HTTP API server.
pub struct Server {
    router: Router,
    addr: SocketAddr,
}

impl Server {
    /// Creates a server with custom application state.
    pub fn with_state(
        config: ServerConfig,
        state: AppState,
    ) -> std::result::Result<Self, ServerError> {
        // Browser front ends call the API cross-origin
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = build_router(state).layer(cors);

        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ServerError::Runtime(format!("invalid address: {}", e)))?;

        Ok(Self { router, addr })
    }

    /// Returns the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Runs the server until shutdown.
    pub async fn run(self) -> std::result::Result<(), ServerError> {
        info!("Starting Image Carbon API server on {}", self.addr);

        // Create socket with SO_REUSEADDR to allow binding even when sockets are lingering
        let socket = Socket::new(Domain::for_address(self.addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Allow address reuse (helps with TIME_WAIT/CLOSE_WAIT sockets)
        socket
            .set_reuse_address(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Bind and listen
        socket
            .bind(&self.addr.into())
            .map_err(|e| ServerError::BindError(self.addr, e))?;
        socket
            .listen(128)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Set non-blocking for tokio
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        // Convert to tokio TcpListener
        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::BindError(self.addr, e))?;

        axum::serve(listener, self.router)
            .await
            .map_err(|e| ServerError::Runtime(e.to_string()))?;

        Ok(())
    }

    /// Returns the router for testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Routes of the API, without middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/collect", post(handlers::collect))
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/calculate", post(handlers::calculate))
        .route("/api/sites", get(handlers::list_sites))
        .route("/api/sites/cache", get(handlers::get_cache))
        .route("/api/sites/refresh", get(handlers::refresh_site))
        .route("/api/sites/add", post(handlers::add_site))
        .route("/api/sites/run", post(handlers::run_site))
        .route("/api/sites/report", get(handlers::get_report))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use imagecarbon_collect::{
        CollectError, CollectionPipeline, HostingDirectory, ImageDiscovery, PageExtractor,
        RawImage, SiteCollector, SizeProbe, TransformBackend, UploadRequest, UploadedAsset,
    };
    use imagecarbon_storage::{CacheConfig, Database, SiteCache};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Every site has one large and one tiny image, except forbidden.example.
    struct FakeExtractor;

    #[async_trait]
    impl PageExtractor for FakeExtractor {
        async fn extract(&self, site_url: &str) -> imagecarbon_collect::Result<Vec<RawImage>> {
            if site_url.contains("forbidden.example") {
                return Err(CollectError::DiscoveryForbidden);
            }
            Ok(vec![RawImage::new("/large.png"), RawImage::new("/tiny.png")])
        }
    }

    struct FakeBackend;

    #[async_trait]
    impl TransformBackend for FakeBackend {
        async fn upload(&self, request: &UploadRequest) -> imagecarbon_collect::Result<UploadedAsset> {
            let name = request.source_url.rsplit('/').next().unwrap_or_default();
            Ok(UploadedAsset {
                id: format!("imagecarbon/{}", name),
                secure_url: format!("https://cdn.test/original/{}", name),
                format: Some("png".to_string()),
                bytes: Some(if name.starts_with("tiny") { 2_000 } else { 30_000 }),
                width: None,
                height: None,
            })
        }

        fn delivery_url(&self, asset_id: &str, format: &str) -> String {
            format!("https://cdn.test/{}/{}", format, asset_id)
        }

        fn delivery_host(&self) -> &str {
            "cdn.test"
        }
    }

    struct FakeProbe;

    #[async_trait]
    impl SizeProbe for FakeProbe {
        async fn size_of(&self, url: &str) -> imagecarbon_collect::Result<u64> {
            Ok(if url.contains("tiny") { 1_000 } else { 10_000 })
        }
    }

    struct FakeDirectory;

    #[async_trait]
    impl HostingDirectory for FakeDirectory {
        async fn is_green(&self, host: &str) -> imagecarbon_collect::Result<bool> {
            Ok(host == "cdn.test")
        }
    }

    fn test_collector() -> SiteCollector {
        let pipeline = CollectionPipeline::new(
            Arc::new(FakeBackend),
            Arc::new(FakeProbe),
            Arc::new(FakeDirectory),
        );
        let cache = SiteCache::new(Database::in_memory().unwrap(), CacheConfig::default());
        SiteCollector::new(ImageDiscovery::new(Arc::new(FakeExtractor)), pipeline, cache)
    }

    fn create_test_app() -> Router {
        build_router(AppState::new(test_collector()))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_scrape() {
        let app = create_test_app();

        let (status, json) = send(&app, post_json("/api/scrape", json!({"siteUrl": "example.com"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["images"][0]["url"], "https://example.com/large.png");
        assert_eq!(json["images"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scrape_forbidden() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            post_json("/api/scrape", json!({"siteUrl": "forbidden.example"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "This website does not allow scraping");
    }

    #[tokio::test]
    async fn test_collect() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            post_json(
                "/api/collect",
                json!({"siteUrl": "https://example.com/", "images": ["https://example.com/large.png"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["siteUrl"], "example.com");
        assert!(json["date"].is_string());
        assert_eq!(json["images"][0]["original"]["size"], 30_000);
        assert_eq!(json["images"][0]["optimized"]["format"], "avif");
        assert_eq!(json["images"][0]["uploaded"]["assetId"], "imagecarbon/large.png");
    }

    #[tokio::test]
    async fn test_collect_rejects_invalid_url() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            post_json("/api/collect", json!({"siteUrl": "localhost", "images": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "invalid_url");
    }

    #[tokio::test]
    async fn test_cache_miss_is_empty_object() {
        let app = create_test_app();

        let (status, json) = send(&app, get("/api/sites/cache?url=example.com")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({}));
    }

    #[tokio::test]
    async fn test_add_then_cache_then_refresh() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            post_json(
                "/api/sites/add",
                json!({
                    "siteUrl": "https://example.com/",
                    "images": [{"original": {"url": "https://example.com/a.png", "size": 30000}}],
                    "screenshot": "shot"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["dateCollected"].is_string());

        let (_, json) = send(&app, get("/api/sites/cache?url=https://example.com")).await;
        assert_eq!(json["images"][0]["original"]["size"], 30_000);
        assert_eq!(json["screenshot"], "shot");

        let (status, _) = send(&app, get("/api/sites/refresh?url=example.com")).await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(&app, get("/api/sites/cache?url=example.com")).await;
        assert_eq!(json, json!({}));
    }

    #[tokio::test]
    async fn test_run_then_report() {
        let app = create_test_app();

        let (status, json) = send(&app, post_json("/api/sites/run", json!({"siteUrl": "example.com/"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fromCache"], false);
        assert_eq!(json["images"].as_array().unwrap().len(), 2);

        let (_, json) = send(&app, post_json("/api/sites/run", json!({"siteUrl": "example.com"}))).await;
        assert_eq!(json["fromCache"], true);

        let (status, json) = send(&app, get("/api/sites/report?url=example.com&monthlyRequests=20000")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["totalBytesOriginal"], 32_000);
        assert_eq!(json["images"].as_array().unwrap().len(), 1);
        assert_eq!(json["hiddenImages"], 1);
        assert_eq!(json["yearly"]["monthlyRequests"], 20_000);

        // Small images stay hidden even with showAll
        let (_, json) = send(&app, get("/api/sites/report?url=example.com&showAll=true")).await;
        assert_eq!(json["images"].as_array().unwrap().len(), 1);
        assert_eq!(json["hiddenImages"], 1);
    }

    #[tokio::test]
    async fn test_report_of_unknown_site() {
        let app = create_test_app();

        let (status, json) = send(&app, get("/api/sites/report?url=nothing.com")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "not_found");
    }

    #[tokio::test]
    async fn test_list_sites() {
        let app = create_test_app();

        send(&app, post_json("/api/sites/run", json!({"siteUrl": "example.com"}))).await;
        send(&app, post_json("/api/sites/run", json!({"siteUrl": "example.org"}))).await;

        let (status, json) = send(&app, get("/api/sites")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total"], 2);
    }

    #[tokio::test]
    async fn test_calculate() {
        let app = create_test_app();

        let (status, json) = send(
            &app,
            post_json("/api/calculate", json!({"images": ["https://cdn.test/large.png"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["images"][0]["size"], 10_000);
        assert!(json["images"][0]["co2"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_server_router_allows_cross_origin() {
        let server =
            Server::with_state(ServerConfig::default(), AppState::new(test_collector())).unwrap();
        assert_eq!(server.addr().port(), DEFAULT_PORT);

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/sites")
                    .header("origin", "https://imagecarbon.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_server_rejects_invalid_host() {
        let config = ServerConfig::default().with_host("not a host");
        assert!(matches!(
            Server::with_state(config, AppState::new(test_collector())),
            Err(ServerError::Runtime(_))
        ));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_server_config_builders() {
        let config = ServerConfig::default()
            .with_port(9000)
            .with_host("0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
    }
}
