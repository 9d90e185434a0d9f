//! Image cache configuration

use serde::{Deserialize, Serialize};

/// Largest accepted cache size (64 GiB).
pub const MAX_CACHE_SIZE_MB: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size_mb: usize,
    pub max_age_seconds: u64,
    /// Serve a capture of the same URL made within the same minute from cache.
    /// Only useful when bench testing against a static camera.
    pub reuse_captures: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 100,
            max_age_seconds: 3600,
            reuse_captures: false,
        }
    }
}
