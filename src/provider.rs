use crate::error::UpstreamError;
use crate::models::{Track, VideoMatch};
use async_trait::async_trait;

/// Largest page size either provider accepts in one request.
pub const PROVIDER_MAX_LIMIT: u32 = 50;

pub fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, PROVIDER_MAX_LIMIT)
}

/// Track metadata source (Last.fm in production).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_by_query(&self, term: &str, limit: u32) -> Result<Vec<Track>, UpstreamError>;

    async fn fetch_recommendations(&self, limit: u32) -> Result<Vec<Track>, UpstreamError>;
}

/// Video id lookup by free-text query (YouTube in production).
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Hits in provider relevance order.
    async fn search_videos(&self, query: &str, limit: u32)
    -> Result<Vec<VideoMatch>, UpstreamError>;
}
