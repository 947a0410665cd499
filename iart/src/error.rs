use thiserror::Error;

/// Error type for transaction configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The tracked-handle cache must hold at least one handle.
    #[error("modified_cache_size must be greater than zero")]
    ZeroModifiedCacheSize,
}

/// Result type alias for configuration.
pub type Result<T> = std::result::Result<T, ConfigError>;
