use crate::error::UpstreamError;
use crate::models::VideoMatch;
use crate::provider::{VideoProvider, clamp_limit};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

#[derive(Debug, Deserialize)]
struct YouTubeSearchResponse {
    #[serde(default)]
    items: Vec<YouTubeItem>,
}

#[derive(Debug, Deserialize)]
struct YouTubeItem {
    id: YouTubeItemId,
    #[serde(default)]
    snippet: Option<YouTubeSnippet>,
}

#[derive(Debug, Deserialize)]
struct YouTubeItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YouTubeSnippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct YouTubeErrorResponse {
    error: YouTubeErrorBody,
}

#[derive(Debug, Deserialize)]
struct YouTubeErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<YouTubeErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct YouTubeErrorDetail {
    #[serde(default)]
    reason: String,
}

pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl YouTubeClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl VideoProvider for YouTubeClient {
    #[instrument(skip(self))]
    async fn search_videos(&self, query: &str, limit: u32) -> Result<Vec<VideoMatch>, UpstreamError> {
        let url = format!(
            "{}?part=snippet&type=video&videoEmbeddable=true&maxResults={}&q={}&key={}",
            self.base_url,
            clamp_limit(limit),
            urlencoding::encode(query),
            urlencoding::encode(&self.api_key)
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("reading body: {}", e.without_url())))?;
        debug!(%status, bytes = body.len(), "YouTube responded");

        parse_search_body(status, &body)
    }
}

fn parse_search_body(status: StatusCode, body: &str) -> Result<Vec<VideoMatch>, UpstreamError> {
    if !status.is_success() {
        return Err(classify_error(status, body));
    }

    let parsed: YouTubeSearchResponse = serde_json::from_str(body)?;
    Ok(parsed
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
            let (title, channel) = item
                .snippet
                .map(|s| (s.title, s.channel_title))
                .unwrap_or_default();
            Some(VideoMatch {
                video_id,
                title,
                channel,
            })
        })
        .collect())
}

fn classify_error(status: StatusCode, body: &str) -> UpstreamError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return UpstreamError::RateLimited(format!("HTTP {}", status));
    }

    match serde_json::from_str::<YouTubeErrorResponse>(body) {
        Ok(parsed) => {
            let quota = parsed
                .error
                .errors
                .iter()
                .any(|detail| QUOTA_REASONS.contains(&detail.reason.as_str()));
            if status == StatusCode::FORBIDDEN && quota {
                UpstreamError::RateLimited(parsed.error.message)
            } else {
                UpstreamError::Unavailable(format!("HTTP {}: {}", status, parsed.error.message))
            }
        }
        Err(_) => UpstreamError::Unavailable(format!("HTTP {}", status)),
    }
}
