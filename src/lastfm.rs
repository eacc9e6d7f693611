use crate::error::UpstreamError;
use crate::models::{Provider, Track};
use crate::provider::{MetadataProvider, clamp_limit};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
const RATE_LIMIT_ERROR_CODE: u32 = 29;

#[derive(Debug, Deserialize)]
struct LastFmErrorBody {
    error: u32,
    #[serde(default)]
    message: String,
}

// Last.fm collapses single-element lists into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LastFmArtistRef {
    Name(String),
    Object {
        name: Option<String>,
        #[serde(rename = "#text")]
        text: Option<String>,
    },
}

impl LastFmArtistRef {
    fn into_name(self) -> String {
        match self {
            LastFmArtistRef::Name(name) => name,
            LastFmArtistRef::Object { name, text } => name.or(text).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LastFmImage {
    #[serde(rename = "#text")]
    url: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct LastFmTrack {
    name: String,
    artist: LastFmArtistRef,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mbid: Option<String>,
    #[serde(default)]
    playcount: Option<String>,
    #[serde(default)]
    listeners: Option<String>,
    #[serde(default)]
    image: Vec<LastFmImage>,
}

#[derive(Debug, Deserialize)]
struct TrackList {
    #[serde(default)]
    track: OneOrMany<LastFmTrack>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    trackmatches: TrackList,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    tracks: TrackList,
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: TrackList,
}

#[derive(Clone, Copy)]
enum Popularity {
    Listeners,
    Playcount,
}

pub struct LastFmClient {
    client: Client,
    api_key: String,
    username: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl LastFmClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            api_key,
            username: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
        }
    }

    /// Recommendations follow this user's recent listening instead of the global chart.
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|name| !name.trim().is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<(StatusCode, String), UpstreamError> {
        let mut url = format!(
            "{}?method={}&api_key={}&format=json",
            self.base_url,
            method,
            urlencoding::encode(&self.api_key)
        );
        for (name, value) in params {
            url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
        }

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
        debug!(method, %status, bytes = body.len(), "Last.fm responded");

        Ok((status, body))
    }
}

#[async_trait]
impl MetadataProvider for LastFmClient {
    #[instrument(skip(self))]
    async fn fetch_by_query(&self, term: &str, limit: u32) -> Result<Vec<Track>, UpstreamError> {
        let limit = clamp_limit(limit);
        let (status, body) = self
            .call(
                "track.search",
                &[("track", term.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        let parsed: SearchResponse = parse_lastfm_body(status, &body)?;
        Ok(normalize_tracks(parsed.results.trackmatches, Popularity::Listeners))
    }

    #[instrument(skip(self))]
    async fn fetch_recommendations(&self, limit: u32) -> Result<Vec<Track>, UpstreamError> {
        let limit = clamp_limit(limit);
        match &self.username {
            Some(user) => {
                let (status, body) = self
                    .call(
                        "user.getrecenttracks",
                        &[("user", user.clone()), ("limit", limit.to_string())],
                    )
                    .await?;
                let parsed: RecentTracksResponse = parse_lastfm_body(status, &body)?;
                Ok(normalize_tracks(parsed.recenttracks, Popularity::Playcount))
            }
            None => {
                let (status, body) = self
                    .call("chart.gettoptracks", &[("limit", limit.to_string())])
                    .await?;
                let parsed: ChartResponse = parse_lastfm_body(status, &body)?;
                Ok(normalize_tracks(parsed.tracks, Popularity::Playcount))
            }
        }
    }
}

fn parse_lastfm_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, UpstreamError> {
    if let Ok(api_error) = serde_json::from_str::<LastFmErrorBody>(body) {
        warn!(code = api_error.error, message = %api_error.message, "Last.fm returned an error");
        if api_error.error == RATE_LIMIT_ERROR_CODE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::RateLimited(api_error.message));
        }
        return Err(UpstreamError::Unavailable(format!(
            "Last.fm error {}: {}",
            api_error.error, api_error.message
        )));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(UpstreamError::RateLimited(format!("HTTP {}", status)));
    }
    if !status.is_success() {
        return Err(UpstreamError::Unavailable(format!("HTTP {}", status)));
    }

    Ok(serde_json::from_str(body)?)
}

fn normalize_tracks(list: TrackList, popularity: Popularity) -> Vec<Track> {
    list.track
        .into_vec()
        .into_iter()
        .filter_map(|track| convert_track(track, popularity))
        .collect()
}

fn convert_track(track: LastFmTrack, popularity: Popularity) -> Option<Track> {
    let title = track.name.trim().to_string();
    let artist = track.artist.into_name().trim().to_string();
    if title.is_empty() || artist.is_empty() {
        return None;
    }

    let url = track.url.filter(|url| !url.is_empty());
    let lastfm_id = track
        .mbid
        .filter(|mbid| !mbid.is_empty())
        .or_else(|| url.clone());
    let count = match popularity {
        Popularity::Listeners => track.listeners.or(track.playcount),
        Popularity::Playcount => track.playcount.or(track.listeners),
    };

    let mut normalized = Track::new(title, artist)
        .with_popularity(count.and_then(|c| c.trim().parse().ok()))
        .with_artwork_url(extract_image_url(&track.image))
        .with_url(url);
    if let Some(id) = lastfm_id {
        normalized = normalized.with_external_id(Provider::LastFm, id);
    }
    Some(normalized)
}

fn extract_image_url(images: &[LastFmImage]) -> Option<String> {
    ["extralarge", "large", "medium"].iter().find_map(|size| {
        images
            .iter()
            .find(|img| img.size == *size && !img.url.is_empty())
            .map(|img| img.url.clone())
    })
}
