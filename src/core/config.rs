use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment-variable configuration. Every accessor follows the same chain:
// env var → trim → parse → default.
// ---------------------------------------------------------------------------

pub const ENV_MODEL_SERVICE_URL: &str = "MODEL_SERVICE_URL";
pub const ENV_CHAT_MODEL: &str = "CHAT_MODEL";
pub const ENV_EMBED_MODEL: &str = "EMBED_MODEL";
pub const ENV_DB_NODES: &str = "DB_NODES";
pub const ENV_CDN_TOKEN_FILE: &str = "CDN_TOKEN_FILE";
pub const ENV_CDN_OWNER: &str = "CDN_OWNER";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_EMBED_CONCURRENCY: &str = "EMBED_CONCURRENCY";

/// Per-call timeouts for external collaborators.
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(15);
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(120);
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Base URL of the chat/embedding model service.
pub fn model_service_url() -> String {
    env_trimmed(ENV_MODEL_SERVICE_URL).unwrap_or_else(|| "http://localhost:11434".to_string())
}

/// Chat model used for concept extraction.
pub fn chat_model() -> String {
    env_trimmed(ENV_CHAT_MODEL).unwrap_or_else(|| "llama3.1".to_string())
}

/// Embedding model used for concept vectors.
pub fn embed_model() -> String {
    env_trimmed(ENV_EMBED_MODEL).unwrap_or_else(|| "nomic-embed-text".to_string())
}

/// Comma-separated storage nodes. Empty when running with in-memory storage.
pub fn db_nodes() -> Vec<String> {
    env_trimmed(ENV_DB_NODES)
        .map(|v| {
            v.split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn cdn_token_file() -> Option<String> {
    env_trimmed(ENV_CDN_TOKEN_FILE)
}

pub fn cdn_owner() -> Option<String> {
    env_trimmed(ENV_CDN_OWNER)
}

/// `LOG_LEVEL` feeds the tracing EnvFilter; `RUST_LOG` wins when set.
pub fn log_level() -> String {
    env_trimmed(ENV_LOG_LEVEL)
        .filter(|v| matches!(v.as_str(), "trace" | "debug" | "info" | "warn" | "error"))
        .unwrap_or_else(|| "info".to_string())
}

/// Cap on concurrent model-service calls (embedding fan-out and map-reduce
/// extraction share this limit).
pub fn embed_concurrency() -> usize {
    env_trimmed(ENV_EMBED_CONCURRENCY)
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(16)
}
