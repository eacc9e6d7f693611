use crate::aggregator::{Aggregator, AggregatorSettings};
use crate::cache::open_result_cache;
use crate::cache::types::SystemClock;
use crate::config::Config;
use crate::lastfm::LastFmClient;
use crate::provider::VideoProvider;
use crate::service::QueryService;
use crate::youtube::YouTubeClient;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub service: QueryService,
}

impl AppState {
    pub fn new(service: QueryService) -> Self {
        Self { service }
    }

    pub async fn from_config(config: &Config) -> Self {
        let lastfm = LastFmClient::new(config.lastfm_api_key.clone(), config.upstream_timeout)
            .with_username(config.lastfm_username.clone());

        let video: Option<Arc<dyn VideoProvider>> = match &config.youtube_api_key {
            Some(key) => Some(Arc::new(YouTubeClient::new(
                key.clone(),
                config.upstream_timeout,
            ))),
            None => {
                warn!("YOUTUBE_API_KEY not set, tracks will be returned without video ids");
                None
            }
        };

        let cache = open_result_cache(&config.cache_url, Arc::new(SystemClock)).await;

        let aggregator = Aggregator::new(Arc::new(lastfm), cache, AggregatorSettings::from(config))
            .with_video_provider(video);

        info!(
            cache_ttl_secs = config.cache_ttl.as_secs(),
            default_limit = config.default_limit,
            max_limit = config.max_limit,
            recommendations_user = config.lastfm_username.as_deref().unwrap_or("<chart>"),
            "Query service ready"
        );

        Self::new(QueryService::new(
            Arc::new(aggregator),
            config.default_limit,
            config.max_limit,
        ))
    }
}
