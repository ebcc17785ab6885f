//! Model Manager schema validator
//!
//! Parses a request or backend payload file with the schema layer and prints
//! its canonical JSON form. No network calls are made.

use anyhow::{bail, Context};
use model_manager_client::{BatchModelRequest, BatchModelResponse, ModelRequest, ModelResponse};
use model_manager_common::{ClientConfig, ObservabilityConfig};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str =
    "usage: model-manager-validate <request|batch|response|batch-response> <file.json>";

fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.observability());

    let mut args = std::env::args().skip(1);
    let (kind, path) = match (args.next(), args.next()) {
        (Some(kind), Some(path)) => (kind, path),
        _ => bail!(USAGE),
    };

    let payload =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path))?;

    debug!("Validating {} payload from {}", kind, path);
    let canonical = render(&kind, &payload, &config)?;
    println!("{}", canonical);

    info!("{} payload in {} is valid", kind, path);
    Ok(())
}

/// Load configuration from `MODEL_MANAGER_CONFIG` or the environment
fn load_config() -> anyhow::Result<ClientConfig> {
    let config = match std::env::var("MODEL_MANAGER_CONFIG") {
        Ok(path) => ClientConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        Err(_) => ClientConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "model_manager_client={level},model_manager_validate={level}",
            level = observability.log_level
        )
        .into()
    });

    // stdout carries the canonical payload
    let registry = tracing_subscriber::registry().with(filter);
    if observability.structured_logging {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Parse `payload` as `kind` and return its canonical pretty-printed JSON
fn render(kind: &str, payload: &str, config: &ClientConfig) -> anyhow::Result<String> {
    let canonical = match kind {
        "request" => serde_json::to_string_pretty(&ModelRequest::from_json(payload)?)?,
        "batch" => serde_json::to_string_pretty(&BatchModelRequest::from_json(
            payload,
            &config.schema,
        )?)?,
        "response" => serde_json::to_string_pretty(&ModelResponse::from_json(payload)?)?,
        "batch-response" => {
            serde_json::to_string_pretty(&BatchModelResponse::from_json(payload)?)?
        }
        other => bail!("unknown payload kind '{}'\n{}", other, USAGE),
    };
    Ok(canonical)
}
