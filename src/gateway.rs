use crate::{config::Config, errors::AppError, provider::Provider};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

/// Resolves a pasted video url to a direct stream and opens it for relaying.
/// Seam between the router and the paid provider so handlers can be
/// exercised without burning API credits.
#[async_trait::async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<String, AppError>;
    async fn fetch(&self, stream_url: &str) -> Result<MediaStream, AppError>;
}

/// An opened upstream media stream ready to be relayed to the client.
pub struct MediaStream {
    pub content_type: Option<String>,
    pub body: Body,
}

#[async_trait::async_trait]
impl StreamResolver for Provider {
    async fn resolve(&self, url: &str) -> Result<String, AppError> {
        self.resolve_stream_url(url).await
    }

    async fn fetch(&self, stream_url: &str) -> Result<MediaStream, AppError> {
        let resp = self.fetch_stream(stream_url).await?;

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(MediaStream {
            content_type,
            body: Body::from_stream(resp.bytes_stream()),
        })
    }
}

#[derive(Clone)]
struct SharedState {
    resolver: Arc<dyn StreamResolver>,
}

async fn start_app(config: Config) -> anyhow::Result<()> {
    let provider = Provider::from_env(&config.provider)?;

    let app = router(Arc::new(provider), &config.frontend_url);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    log::info!("listening on 0.0.0.0:{}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutting down");
}

pub fn start_daemon(config: Config) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(config))
}

pub fn router(resolver: Arc<dyn StreamResolver>, frontend_url: &str) -> Router {
    let shared_state = Arc::new(SharedState { resolver });

    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(
            frontend_url
                .parse::<HeaderValue>()
                .expect("frontend_url is not a valid origin"),
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/download", post(download))
        .route("/downloader/download/", post(relay))
        .layer(cors)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

// Make our own error that wraps `AppError`.
#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response. Provider and
// transport detail stays in the log; clients only ever see generic text.
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::EmptyUrl => (
                StatusCode::BAD_REQUEST,
                json!({"error": "URL not provided"}).to_string(),
            ),
            AppError::NoDownloadUrl => (
                StatusCode::NOT_FOUND,
                json!({"error": "No download URL found"}).to_string(),
            ),
            AppError::Reqwest(_) | AppError::IO(_) | AppError::Other(_) => {
                log::error!("{self:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Error getting video details"}).to_string(),
                )
            }
        }
        .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Server is running" }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResponse {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

async fn download(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<DownloadRequest>,
) -> Result<Json<DownloadResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    let download_url = state.resolver.resolve(&payload.url).await?;

    Ok(Json(DownloadResponse { download_url }))
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayRequest {
    pub url: String,

    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub quality: Option<String>,
}

async fn relay(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RelayRequest>,
) -> Result<Response, HttpError> {
    log::debug!("payload: {payload:?}");

    if payload.url.trim().is_empty() {
        return Err(HttpError(AppError::EmptyUrl));
    }

    // the form sends format/quality but stream selection stays
    // first-offered only
    if payload.format.is_some() || payload.quality.is_some() {
        log::debug!(
            "ignoring requested format={:?} quality={:?}",
            payload.format,
            payload.quality
        );
    }

    let stream_url = state.resolver.resolve(&payload.url).await?;
    let media = state.resolver.fetch(&stream_url).await?;

    let content_type = media
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(media.body)
        .map_err(|err| HttpError(AppError::Other(anyhow::Error::new(err))))
}
