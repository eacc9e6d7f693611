use crate::cache::ResultCache;
use crate::cache::types::QueryFingerprint;
use crate::config::Config;
use crate::error::{ApiError, UpstreamError};
use crate::models::{Provider, Track};
use crate::provider::{MetadataProvider, VideoProvider};
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

const VIDEO_LOOKUP_LIMIT: u32 = 1;
const INFLIGHT_CAPACITY: u64 = 10_000;
const INFLIGHT_IDLE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search { term: String, limit: u32 },
    Recommend { limit: u32 },
}

impl Operation {
    pub fn fingerprint(&self) -> QueryFingerprint {
        match self {
            Operation::Search { term, limit } => QueryFingerprint::search(term, *limit),
            Operation::Recommend { limit } => QueryFingerprint::recommend(*limit),
        }
    }

    pub fn limit(&self) -> u32 {
        match self {
            Operation::Search { limit, .. } | Operation::Recommend { limit } => *limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub cache_ttl: Duration,
    pub rate_limit_backoff: Duration,
    pub enrichment_concurrency: usize,
    pub enrich_recommendations: bool,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30 * 60),
            rate_limit_backoff: Duration::from_secs(1),
            enrichment_concurrency: 8,
            enrich_recommendations: true,
        }
    }
}

impl From<&Config> for AggregatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_ttl: config.cache_ttl,
            rate_limit_backoff: config.rate_limit_backoff,
            enrichment_concurrency: config.enrichment_concurrency,
            enrich_recommendations: config.enrich_recommendations,
        }
    }
}

/// Serves result sets from the cache, falling back to the upstream providers.
///
/// Concurrent misses on the same fingerprint are serialized behind one lock so
/// only the first caller reaches the metadata provider; the rest read what it
/// stored.
pub struct Aggregator {
    metadata: Arc<dyn MetadataProvider>,
    video: Option<Arc<dyn VideoProvider>>,
    cache: Arc<dyn ResultCache>,
    settings: AggregatorSettings,
    inflight: Cache<String, Arc<Mutex<()>>>,
}

impl Aggregator {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        cache: Arc<dyn ResultCache>,
        settings: AggregatorSettings,
    ) -> Self {
        let inflight = Cache::builder()
            .max_capacity(INFLIGHT_CAPACITY)
            .time_to_idle(INFLIGHT_IDLE)
            .build();

        Self {
            metadata,
            video: None,
            cache,
            settings,
            inflight,
        }
    }

    pub fn with_video_provider(mut self, video: Option<Arc<dyn VideoProvider>>) -> Self {
        self.video = video;
        self
    }

    #[instrument(skip(self), fields(key = %operation.fingerprint()))]
    pub async fn execute(&self, operation: &Operation) -> Result<Vec<Track>, ApiError> {
        let key = operation.fingerprint();
        if let Some(tracks) = self.cached(&key).await {
            return Ok(tracks);
        }

        let lock = self
            .inflight
            .get_with(key.as_str().to_string(), async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        // Another caller may have filled the entry while we waited.
        if let Some(tracks) = self.cached(&key).await {
            return Ok(tracks);
        }

        let mut tracks = self.fetch_with_retry(operation).await?;
        tracks.truncate(operation.limit() as usize);

        let enrich = match operation {
            Operation::Search { .. } => true,
            Operation::Recommend { .. } => self.settings.enrich_recommendations,
        };
        if enrich {
            tracks = self.enrich(tracks).await;
        }

        if let Err(e) = self
            .cache
            .put(&key, tracks.clone(), self.settings.cache_ttl)
            .await
        {
            warn!(error = %e, "Result cache unavailable, skipping store");
        }

        Ok(tracks)
    }

    async fn cached(&self, key: &QueryFingerprint) -> Option<Vec<Track>> {
        match self.cache.get(key).await {
            Ok(Some(tracks)) => {
                debug!("Cache hit");
                Some(tracks)
            }
            Ok(None) => {
                debug!("Cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, "Result cache unavailable, bypassing");
                None
            }
        }
    }

    async fn fetch(&self, operation: &Operation) -> Result<Vec<Track>, UpstreamError> {
        match operation {
            Operation::Search { term, limit } => self.metadata.fetch_by_query(term, *limit).await,
            Operation::Recommend { limit } => self.metadata.fetch_recommendations(*limit).await,
        }
    }

    async fn fetch_with_retry(&self, operation: &Operation) -> Result<Vec<Track>, ApiError> {
        match self.fetch(operation).await {
            Ok(tracks) => Ok(tracks),
            Err(UpstreamError::RateLimited(message)) => {
                warn!(%message, backoff_ms = self.settings.rate_limit_backoff.as_millis() as u64, "Metadata provider rate limited, retrying once");
                tokio::time::sleep(self.settings.rate_limit_backoff).await;

                self.fetch(operation).await.map_err(|e| {
                    warn!(error = %e, "Metadata provider retry failed");
                    ApiError::UpstreamUnavailable(
                        "music provider is unavailable after retrying".to_string(),
                    )
                })
            }
            Err(e) => {
                warn!(error = %e, "Metadata provider failed");
                Err(e.into())
            }
        }
    }

    /// Attaches a video id to each track, one lookup per distinct track identity.
    async fn enrich(&self, tracks: Vec<Track>) -> Vec<Track> {
        let Some(video) = &self.video else {
            return tracks;
        };

        let mut seen = FxHashSet::default();
        let lookups: Vec<(String, String)> = tracks
            .iter()
            .filter(|track| track.video_id().is_none())
            .filter_map(|track| {
                let identity = track.identity();
                seen.insert(identity.clone())
                    .then(|| (identity, format!("{} {}", track.title, track.artist)))
            })
            .collect();

        let found: FxHashMap<String, String> = stream::iter(lookups)
            .map(|(identity, query)| {
                let video = Arc::clone(video);
                async move {
                    match video.search_videos(&query, VIDEO_LOOKUP_LIMIT).await {
                        Ok(matches) => matches.into_iter().next().map(|m| (identity, m.video_id)),
                        Err(e) => {
                            warn!(%query, error = %e, "Video lookup failed, leaving track without video");
                            None
                        }
                    }
                }
            })
            .buffered(self.settings.enrichment_concurrency.max(1))
            .filter_map(|found| async move { found })
            .collect()
            .await;

        tracks
            .into_iter()
            .map(|track| match found.get(&track.identity()) {
                Some(video_id) if track.video_id().is_none() => {
                    track.with_external_id(Provider::YouTube, video_id.clone())
                }
                _ => track,
            })
            .collect()
    }
}
