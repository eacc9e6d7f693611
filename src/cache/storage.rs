use super::ResultCache;
use super::types::{CacheEntry, Clock, QueryFingerprint};
use crate::error::CacheError;
use crate::models::Track;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);
const SWEEP_INTERVAL_MILLIS: u64 = 30_000;

/// In-process result store, optionally mirrored to a bincode snapshot on disk.
#[derive(Clone)]
pub struct CacheStorage {
    snapshot_path: Option<PathBuf>,
    entries: Arc<RwLock<FxHashMap<String, CacheEntry>>>,
    dirty: Arc<RwLock<bool>>,
    last_sweep: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
}

impl CacheStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshot_path: None,
            entries: Arc::new(RwLock::new(FxHashMap::default())),
            dirty: Arc::new(RwLock::new(false)),
            last_sweep: Arc::new(AtomicU64::new(clock.now_millis())),
            clock,
        }
    }

    pub fn with_snapshot(mut self, path: PathBuf) -> Self {
        self.snapshot_path = Some(path);
        self
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn load_snapshot(&self) -> tokio::io::Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if !path.exists() {
            info!(path = %path.display(), "No cache snapshot found, starting empty");
            return Ok(());
        }

        let file_contents = tokio::fs::read(path).await?;

        match bincode::deserialize::<FxHashMap<String, CacheEntry>>(&file_contents) {
            Ok(loaded) => {
                let now = self.clock.now_millis();
                let mut entries = self.entries.write().await;
                *entries = loaded;
                entries.retain(|_, entry| !entry.is_expired(now));
                info!(entries = entries.len(), "Loaded cache snapshot");
            }
            Err(e) => {
                warn!(error = %e, "Failed to deserialize cache snapshot, starting empty");
            }
        }
        Ok(())
    }

    /// Spawns the maintenance loop: sweeps expired entries and, when a
    /// snapshot path is set, writes the store back to disk if it changed.
    pub fn start_maintenance(&self) -> JoinHandle<()> {
        let storage = self.clone();
        tokio::spawn(async move {
            storage.maintenance_task().await;
        })
    }

    async fn maintenance_task(&self) {
        let mut interval = interval(SNAPSHOT_INTERVAL);

        loop {
            interval.tick().await;

            if let Ok(removed) = self.sweep().await {
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }

            if self.snapshot_path.is_some() {
                self.flush_if_dirty().await;
            }
        }
    }

    /// Writes a snapshot when anything changed since the last one.
    ///
    /// The flag is cleared before serializing so a `put` racing the write
    /// marks the store dirty again for the next round.
    pub async fn flush_if_dirty(&self) {
        {
            let mut dirty = self.dirty.write().await;
            if !*dirty {
                return;
            }
            *dirty = false;
        }

        if let Err(e) = self.write_snapshot().await {
            warn!(error = %e, "Failed to write cache snapshot");
            self.mark_dirty().await;
        }
    }

    pub async fn is_dirty(&self) -> bool {
        *self.dirty.read().await
    }

    pub async fn write_snapshot(&self) -> tokio::io::Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let serialized = {
            let entries = self.entries.read().await;
            bincode::serialize(&*entries)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        };

        // Write to temp file first, then atomic rename
        let temp_path = path.with_extension("bin.tmp");
        tokio::fs::write(&temp_path, serialized).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn mark_dirty(&self) {
        *self.dirty.write().await = true;
    }

    /// Claims the next sweep slot if the last sweep is old enough.
    fn sweep_due(&self, now: u64) -> bool {
        let last = self.last_sweep.load(Ordering::SeqCst);
        now.saturating_sub(last) >= SWEEP_INTERVAL_MILLIS
            && self
                .last_sweep
                .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }
}

#[async_trait]
impl ResultCache for CacheStorage {
    async fn get(&self, key: &QueryFingerprint) -> Result<Option<Vec<Track>>, CacheError> {
        let now = self.clock.now_millis();
        {
            let entries = self.entries.read().await;
            match entries.get(key.as_str()) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.tracks.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key.as_str())
            .is_some_and(|entry| entry.is_expired(now))
        {
            entries.remove(key.as_str());
            drop(entries);
            self.mark_dirty().await;
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &QueryFingerprint,
        tracks: Vec<Track>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = self.clock.now_millis();
        let entry = CacheEntry::new(tracks, now, ttl);
        {
            let mut entries = self.entries.write().await;
            // Keys that are never read again are only reclaimed here.
            if self.sweep_due(now) {
                entries.retain(|_, existing| !existing.is_expired(now));
            }
            entries.insert(key.as_str().to_string(), entry);
        }
        self.mark_dirty().await;
        Ok(())
    }

    async fn expire(&self, key: &QueryFingerprint) -> Result<(), CacheError> {
        if self.entries.write().await.remove(key.as_str()).is_some() {
            self.mark_dirty().await;
        }
        Ok(())
    }

    async fn sweep(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        self.last_sweep.store(now, Ordering::SeqCst);
        let removed = {
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(now));
            before - entries.len()
        };
        if removed > 0 {
            self.mark_dirty().await;
        }
        Ok(removed)
    }
}
