//! Logging setup.
//!
//! `RUST_LOG` takes precedence over the environment default:
//!
//! ```bash
//! RUST_LOG=docqa_rag=trace,info docqa
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{AppEnv, LogFormat};

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(env: AppEnv) -> &'static str {
    match env {
        AppEnv::Production => "info",
        AppEnv::Development => "debug,hyper=info,h2=info,rustls=info",
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(env: AppEnv, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env)));

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match (format, env) {
        (LogFormat::Json, _) => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .boxed(),
        (LogFormat::Text, AppEnv::Development) => tracing_subscriber::fmt::layer().pretty().boxed(),
        (LogFormat::Text, AppEnv::Production) => {
            tracing_subscriber::fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry().with(fmt_layer).with(filter).try_init()?;
    Ok(())
}
