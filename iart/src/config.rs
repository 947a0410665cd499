use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Number of watch handles a transaction tracks before it falls back to diffing the old and new
/// trees at notify time.
pub const DEFAULT_MODIFIED_CACHE_SIZE: usize = 8192;

/// Transaction settings. Missing fields take their defaults, so this can be embedded in an
/// application config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxnConfig {
    /// Upper bound on tracked watch handles.
    pub modified_cache_size: usize,
    /// Whether the transaction records which handles to close on notify.
    pub track_mutate: bool,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            modified_cache_size: DEFAULT_MODIFIED_CACHE_SIZE,
            track_mutate: false,
        }
    }
}

impl TxnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.modified_cache_size == 0 {
            return Err(ConfigError::ZeroModifiedCacheSize);
        }
        Ok(())
    }
}
