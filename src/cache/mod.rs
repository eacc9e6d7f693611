pub mod redis_store;
pub mod storage;
pub mod types;

use crate::error::CacheError;
use crate::models::Track;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use redis_store::RedisCache;
use std::time::Duration;
use storage::CacheStorage;
use tracing::{info, warn};
use types::{Clock, QueryFingerprint};

/// Key-value store of result sets with per-entry time-to-live.
///
/// Expiry is lazy: an entry older than its TTL is reported absent by `get`
/// regardless of whether it has been reclaimed yet.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &QueryFingerprint) -> Result<Option<Vec<Track>>, CacheError>;

    async fn put(&self, key: &QueryFingerprint, tracks: Vec<Track>, ttl: Duration)
    -> Result<(), CacheError>;

    async fn expire(&self, key: &QueryFingerprint) -> Result<(), CacheError>;

    /// Drops every expired entry, returning how many were removed.
    async fn sweep(&self) -> Result<usize, CacheError>;
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl ResultCache for DisabledCache {
    async fn get(&self, _key: &QueryFingerprint) -> Result<Option<Vec<Track>>, CacheError> {
        Ok(None)
    }

    async fn put(&self, _key: &QueryFingerprint, _tracks: Vec<Track>, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn expire(&self, _key: &QueryFingerprint) -> Result<(), CacheError> {
        Ok(())
    }

    async fn sweep(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    File(PathBuf),
    Redis(String),
    Disabled,
}

impl CacheBackend {
    /// Parses a cache connection string such as `memory://`, `redis://localhost`
    /// or `file:///var/cache/soundmap.bin`.
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() || url == "memory" || url == "memory://" {
            return Some(CacheBackend::Memory);
        }
        if url == "none" || url == "none://" {
            return Some(CacheBackend::Disabled);
        }
        if url.starts_with("redis://") || url.starts_with("rediss://") {
            return Some(CacheBackend::Redis(url.to_string()));
        }
        url.strip_prefix("file://")
            .filter(|path| !path.is_empty())
            .map(|path| CacheBackend::File(PathBuf::from(path)))
    }
}

/// Opens the backend named by `url`, degrading to [`DisabledCache`] when it cannot be used.
pub async fn open_result_cache(url: &str, clock: Arc<dyn Clock>) -> Arc<dyn ResultCache> {
    match CacheBackend::parse(url) {
        Some(CacheBackend::Memory) => {
            info!("Using in-memory result cache");
            let storage = CacheStorage::new(clock);
            storage.start_maintenance();
            Arc::new(storage)
        }
        Some(CacheBackend::File(path)) => {
            let storage = CacheStorage::new(clock).with_snapshot(path.clone());
            match storage.load_snapshot().await {
                Ok(()) => {
                    storage.start_maintenance();
                    info!(path = %path.display(), "Using snapshot-backed result cache");
                    Arc::new(storage)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cache snapshot unusable, caching disabled");
                    Arc::new(DisabledCache)
                }
            }
        }
        Some(CacheBackend::Redis(url)) => match RedisCache::open(&url) {
            Ok(cache) => {
                match cache.ping().await {
                    Ok(()) => info!("Using redis result cache"),
                    Err(e) => {
                        warn!(error = %e, "Redis unreachable, requests bypass the cache until it recovers")
                    }
                }
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Invalid redis connection string, caching disabled");
                Arc::new(DisabledCache)
            }
        },
        Some(CacheBackend::Disabled) => {
            info!("Result caching disabled");
            Arc::new(DisabledCache)
        }
        None => {
            warn!(url, "Unsupported cache connection string, caching disabled");
            Arc::new(DisabledCache)
        }
    }
}
