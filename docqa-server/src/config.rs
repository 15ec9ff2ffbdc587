//! Command-line and environment configuration for the `docqa` binary.
//!
//! Every flag falls back to an environment variable, so the service can be
//! configured entirely through a `.env` file.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use docqa_rag::gemini::DEFAULT_COMPLETION_MODEL;

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AppEnv {
    /// `info` logging.
    #[default]
    Production,
    /// `debug` logging with pretty output.
    Development,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which backend embeds chunks and queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingProviderKind {
    /// On-device `all-MiniLM-L6-v2` sentence model; downloaded once, then offline.
    #[default]
    #[value(name = "fastembed")]
    FastEmbed,
    /// Word and trigram hashing. Lexical only; for tests and air-gapped runs.
    Hashing,
    /// OpenAI embeddings API (`OPENAI_API_KEY`).
    #[value(name = "openai")]
    OpenAI,
    /// Gemini embeddings API (`GOOGLE_API_KEY`).
    Gemini,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "docqa", version, about = "Upload documents and ask questions about them")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directory uploaded files are saved to.
    #[arg(long, env = "UPLOAD_DIR", default_value = "pdfs")]
    pub upload_dir: PathBuf,

    /// Location of the persisted vector index.
    #[arg(long, env = "INDEX_PATH", default_value = "vectorstore/index.json")]
    pub index_path: PathBuf,

    /// Built single-page frontend served for every other GET.
    #[arg(long, env = "STATIC_DIR", default_value = "frontend/build")]
    pub static_dir: PathBuf,

    /// Gemini API key. Without it the service starts but cannot generate answers.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Gemini model used for answers.
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_COMPLETION_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "EMBEDDING_PROVIDER", value_enum, default_value_t = EmbeddingProviderKind::FastEmbed)]
    pub embedding_provider: EmbeddingProviderKind,

    /// Where the local embedding model is cached.
    #[arg(long, env = "EMBEDDING_CACHE_DIR")]
    pub embedding_cache_dir: Option<PathBuf>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Chunks retrieved per question.
    #[arg(long, env = "TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Timeout for each completion request, in seconds.
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 30)]
    pub model_timeout_secs: u64,

    /// Largest accepted upload request body, in bytes.
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = AppEnv::Production)]
    pub env: AppEnv,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("pdfs"),
            index_path: PathBuf::from("vectorstore/index.json"),
            static_dir: PathBuf::from("frontend/build"),
            google_api_key: None,
            gemini_model: DEFAULT_COMPLETION_MODEL.to_string(),
            embedding_provider: EmbeddingProviderKind::default(),
            embedding_cache_dir: None,
            openai_api_key: None,
            top_k: 3,
            model_timeout_secs: 30,
            max_upload_bytes: 25 * 1024 * 1024,
            env: AppEnv::default(),
            log_format: LogFormat::default(),
        }
    }
}
