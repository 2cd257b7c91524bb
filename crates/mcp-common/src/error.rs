/// Error types shared across MCP server crates.
///
/// These errors represent failures in infrastructure components (currently Redis)
/// that any MCP server may depend on. Server-specific errors are defined in each
/// server crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis unavailable, degrading gracefully")]
    RedisUnavailable,
}
