//! HTTP server
//!
//! Serves the network viewer and the graph document behind it.
//!
//! | Route | Description |
//! |-------|-------------|
//! | `GET /` | Viewer page; `?spectrum_id=<id>` fetches and selects a query spectrum |
//! | `GET /data` | Expands the selected spectrum and returns `{nodes, edges, idNames}` |
//! | `GET /health` | Liveness probe |
//!
//! The selected query spectrum is held in memory in [`AppState`]. Expansion
//! reads a copy of it and passes neighbour spectra by value; concurrent
//! `/data` requests share no mutable state.
//!
//! ```rust,ignore
//! use spectral_graph::server::{serve, ServerConfig};
//!
//! let config = ServerConfig::new("127.0.0.1:1338")?;
//! serve(config).await?;
//! ```

use crate::error::{GraphError, Recoverable};
use crate::expansion::{ExpansionConfig, ExpansionDriver};
use crate::file_host::{validate_spectrum_id, FileHost, FileHostConfig, HttpFileHost};
use crate::graph::GraphDocument;
use crate::mgf::SpectrumFile;
use crate::page::{render_index, PageMode};
use crate::similarity::{SimilarityProvider, Spec2VecClient, Spec2VecConfig};
use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins (None = allow all, Some([]) = deny all external)
    pub allowed_origins: Option<Vec<String>>,
    /// Max age for preflight cache (in seconds)
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Some(vec![
                "http://localhost:1338".to_string(),
                "http://127.0.0.1:1338".to_string(),
            ]),
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    /// Allow any origin to read `/data`.
    pub fn permissive() -> Self {
        Self {
            enabled: true,
            allowed_origins: None,
            max_age_secs: 3600,
        }
    }

    /// Add an allowed origin
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        let origins = self.allowed_origins.get_or_insert_with(Vec::new);
        origins.push(origin.into());
        self
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub addr: SocketAddr,
    /// Page title
    pub title: String,
    /// CORS settings
    pub cors_config: CorsConfig,
    /// Whole-request timeout; must cover a full expansion
    pub request_timeout_secs: u64,
    /// Where spectral files are downloaded from
    pub file_host: FileHostConfig,
    /// Similarity provider endpoint and credentials
    pub spec2vec: Spec2VecConfig,
    /// Expansion parameters
    pub expansion: ExpansionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 1338)),
            title: "Spectral similarity network".to_string(),
            cors_config: CorsConfig::default(),
            request_timeout_secs: 300,
            file_host: FileHostConfig::default(),
            spec2vec: Spec2VecConfig::default(),
            expansion: ExpansionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Default configuration bound to `addr`.
    pub fn new(addr: &str) -> Result<Self, std::net::AddrParseError> {
        Ok(Self {
            addr: addr.parse()?,
            ..Default::default()
        })
    }

    /// Replace the CORS settings.
    pub fn with_cors(mut self, config: CorsConfig) -> Self {
        self.cors_config = config;
        self
    }

    /// Set the whole-request timeout in seconds.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the file host configuration.
    pub fn with_file_host(mut self, config: FileHostConfig) -> Self {
        self.file_host = config;
        self
    }

    /// Set the similarity provider configuration.
    pub fn with_spec2vec(mut self, config: Spec2VecConfig) -> Self {
        self.spec2vec = config;
        self
    }

    /// Set the expansion parameters.
    pub fn with_expansion(mut self, config: ExpansionConfig) -> Self {
        self.expansion = config;
        self
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Shared application state
pub struct AppState {
    driver: ExpansionDriver,
    /// The currently selected query spectrum
    query: RwLock<Option<SpectrumFile>>,
    title: String,
}

impl AppState {
    /// State over the given collaborators.
    pub fn new(
        file_host: Arc<dyn FileHost>,
        provider: Arc<dyn SimilarityProvider>,
        expansion: ExpansionConfig,
    ) -> Self {
        Self {
            driver: ExpansionDriver::new(file_host, provider, expansion),
            query: RwLock::new(None),
            title: ServerConfig::default().title,
        }
    }

    /// State with HTTP collaborators built from `config`.
    pub fn from_config(config: &ServerConfig) -> crate::Result<Self> {
        config.expansion.validate()?;
        let file_host = HttpFileHost::new(config.file_host.clone())?;
        let provider = Spec2VecClient::new(config.spec2vec.clone())?;
        let mut state = Self::new(Arc::new(file_host), Arc::new(provider), config.expansion.clone());
        state.title = config.title.clone();
        Ok(state)
    }

    /// Replace the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Id of the selected query spectrum, if any.
    pub async fn current_query_id(&self) -> Option<String> {
        let query = self.query.read().await;
        query.as_ref().and_then(|q| q.spectrum_id().ok())
    }
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error message
    pub error: String,
    /// Stable machine-readable code, e.g. `NO_MATCHES`
    pub code: String,
    /// Suggested fix, omitted when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
}

impl From<GraphError> for (StatusCode, Json<ApiError>) {
    fn from(err: GraphError) -> Self {
        let (status, code) = match &err {
            GraphError::FileHost { .. } => (StatusCode::BAD_GATEWAY, "FILE_HOST_ERROR"),
            GraphError::SimilarityProvider { .. } => (StatusCode::BAD_GATEWAY, "SIMILARITY_PROVIDER_ERROR"),
            GraphError::NoMatches(_) => (StatusCode::NOT_FOUND, "NO_MATCHES"),
            GraphError::NoQuerySpectrum => (StatusCode::CONFLICT, "NO_QUERY"),
            GraphError::InvalidSpectrumId(_) => (StatusCode::BAD_REQUEST, "INVALID_SPECTRUM_ID"),
            GraphError::MgfParse(_) | GraphError::MissingField { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_MGF")
            }
            GraphError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            warn!(code = code, error_code = err.error_code().code(), error = %err, "Request failed");
        }

        (
            status,
            Json(ApiError {
                error: err.to_string(),
                code: code.to_string(),
                help: err.help(),
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
struct IndexParams {
    #[serde(default)]
    spectrum_id: Option<String>,
}

// ============ Handlers ============

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "version": env!("CARGO_PKG_VERSION")}))
}

/// Viewer page; selects a new query spectrum when `spectrum_id` is given.
async fn index(State(state): State<Arc<AppState>>, Query(params): Query<IndexParams>) -> Response {
    let Some(spectrum_id) = params.spectrum_id.filter(|s| !s.trim().is_empty()) else {
        return Html(render_index(&state.title, &PageMode::Idle)).into_response();
    };
    let spectrum_id = spectrum_id.trim();

    let selected = match validate_spectrum_id(spectrum_id) {
        Ok(()) => state.driver.fetch_query(spectrum_id).await,
        Err(e) => Err(e),
    };

    match selected {
        Ok(file) => {
            *state.query.write().await = Some(file);
            info!(spectrum_id = %spectrum_id, "Selected query spectrum");
            Html(render_index(&state.title, &PageMode::Run { spectrum_id })).into_response()
        }
        Err(err) => {
            let (status, Json(body)) = <(StatusCode, Json<ApiError>)>::from(err);
            let page = render_index(
                &state.title,
                &PageMode::Failed {
                    spectrum_id,
                    message: &body.error,
                },
            );
            (status, Html(page)).into_response()
        }
    }
}

/// Expand the selected spectrum and return the graph document.
async fn data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GraphDocument>, (StatusCode, Json<ApiError>)> {
    let query = state
        .query
        .read()
        .await
        .clone()
        .ok_or(GraphError::NoQuerySpectrum)?;

    let doc = state.driver.build_document(&query).await?;
    Ok(Json(doc))
}

/// Build CORS layer from configuration
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.max_age_secs));

    match &config.allowed_origins {
        None => cors.allow_origin(AllowOrigin::any()),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(origins)
        }
    }
}

/// Build the router with configuration
pub fn create_router_with_config(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(build_cors_layer(&config.cors_config))
}

/// Build the router with default layers.
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with_config(state, &ServerConfig::default())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Start the HTTP server
pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        addr = %config.addr,
        file_host = %config.file_host.base_url,
        top_n = config.expansion.request.top_n,
        ion_mode = %config.expansion.request.ion_mode,
        timeout_secs = config.request_timeout_secs,
        "Starting spectral graph server"
    );
    if config.spec2vec.token.is_none() {
        warn!("No similarity provider token configured; requests may be rejected");
    }

    let state = Arc::new(AppState::from_config(&config)?);
    let app = create_router_with_config(state, &config);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
