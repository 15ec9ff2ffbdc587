//! HTTP surface: routes, handlers and server startup.
//!
//! [`initialize`] wires the configured embedding provider, the persistent
//! vector index and the Gemini completion model into a [`RagPipeline`];
//! [`app_router`] exposes it as `/health`, `/api/upload` and `/api/chat`
//! and serves the built frontend for everything else.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State, multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    response::IntoResponse,
    routing::{get, post},
};
use docqa_rag::{
    EmbeddingProvider, FastEmbedProvider, HashingEmbeddingProvider, RagConfig, RagPipeline,
    VectorIndex,
    gemini::{GeminiCompletionModel, GeminiEmbeddingProvider},
    openai::OpenAIEmbeddingProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    config::{EmbeddingProviderKind, ServerConfig},
    error::ApiError,
    upload::{allowed_file, secure_filename},
};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared handler state. The pipeline owns the vector index.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    pub upload_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upload_dir", &self.upload_dir)
            .field("static_dir", &self.static_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State with no static frontend and the default upload limit.
    pub fn new(pipeline: Arc<RagPipeline>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipeline,
            upload_dir: upload_dir.into(),
            static_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Serve a built single-page frontend from `dir` for unmatched GETs.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Cap request bodies at `bytes`; larger uploads get 413.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    file_name: String,
    chunks_added: usize,
}

/// Build the router with body limit, SPA fallback, tracing and permissive CORS.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/chat", post(chat))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    if let Some(dir) = &state.static_dir {
        let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build the embedding provider, open the index and assemble the pipeline.
pub async fn initialize(config: &ServerConfig) -> anyhow::Result<AppState> {
    let google_api_key = config.google_api_key.clone().unwrap_or_default();

    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_provider {
        EmbeddingProviderKind::FastEmbed => {
            let cache_dir = config.embedding_cache_dir.clone();
            let provider = tokio::task::spawn_blocking(move || match cache_dir {
                Some(dir) => FastEmbedProvider::with_cache_dir(dir),
                None => FastEmbedProvider::new(),
            })
            .await
            .context("embedding model loader stopped")?
            .context("failed to load the local embedding model")?;
            Arc::new(provider)
        }
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbeddingProvider::default()),
        EmbeddingProviderKind::OpenAI => {
            let key = config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the openai embedding provider")?;
            Arc::new(OpenAIEmbeddingProvider::new(key)?)
        }
        EmbeddingProviderKind::Gemini => Arc::new(
            GeminiEmbeddingProvider::new(google_api_key.clone())
                .context("GOOGLE_API_KEY is required for the gemini embedding provider")?,
        ),
    };

    let rag_config = RagConfig::builder()
        .top_k(config.top_k)
        .build()
        .context("invalid retrieval settings")?;

    let index = VectorIndex::open_or_create(&config.index_path, provider, rag_config.metric)
        .await
        .with_context(|| format!("failed to open vector index {}", config.index_path.display()))?;

    if google_api_key.is_empty() {
        warn!("GOOGLE_API_KEY is not set; chat answers will report a generation error");
    }
    let model = GeminiCompletionModel::new(
        google_api_key,
        config.gemini_model.clone(),
        Duration::from_secs(config.model_timeout_secs),
    )?;

    let pipeline = RagPipeline::builder()
        .config(rag_config)
        .index(Arc::new(index))
        .completion_model(Arc::new(model))
        .build()?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", config.upload_dir.display()))?;

    if !config.static_dir.is_dir() {
        warn!(static_dir = %config.static_dir.display(), "static directory not found; frontend will not be served");
    }

    info!(
        embedding_provider = ?config.embedding_provider,
        model = %config.gemini_model,
        indexed_chunks = pipeline.index().len().await,
        "pipeline initialized"
    );

    Ok(AppState::new(Arc::new(pipeline), config.upload_dir.clone())
        .with_static_dir(config.static_dir.clone())
        .with_max_upload_bytes(config.max_upload_bytes))
}

/// Initialize the pipeline and serve until ctrl-c.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = initialize(&config).await?;
    let app = app_router(state);

    let listener = bind_listener(&config.host, config.port).await?;
    info!("docqa listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("docqa stopped");
    Ok(())
}

/// Bind `host:port`. Hostnames and IPv6 literals are resolved by the socket layer.
async fn bind_listener(host: &str, port: u16) -> anyhow::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let indexed_chunks = state.pipeline.index().len().await;
    Json(json!({"status":"ok","service":"docqa","indexed_chunks":indexed_chunks}))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "upload is not a multipart request");
        ApiError::bad_request("no file part")
    })?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let raw_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            upload = Some((raw_name, bytes));
            break;
        }
    }

    let (raw_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("no file part"))?;
    if raw_name.trim().is_empty() {
        return Err(ApiError::bad_request("no selected file"));
    }
    let file_name = secure_filename(&raw_name);
    if !allowed_file(&file_name) {
        return Err(ApiError::bad_request("file type not allowed"));
    }
    if bytes.is_empty() {
        return Err(ApiError::bad_request("empty file"));
    }

    let path = state.upload_dir.join(&file_name);
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload directory: {e}")))?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to save upload: {e}")))?;
    info!(file = %file_name, bytes = bytes.len(), "upload saved");

    let chunks_added = state.pipeline.ingest_file(&path).await?;
    Ok(Json(UploadResponse { status: "ok", file_name, chunks_added }))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let message = request.message.unwrap_or_default();
    if message.trim().is_empty() {
        return Err(ApiError::bad_request("empty message"));
    }

    let response = state.pipeline.answer(message.trim()).await?;
    Ok(Json(ChatResponse { response }))
}
