use crate::string_normalization::identity_key;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    LastFm,
    YouTube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::LastFm => "lastfm",
            Provider::YouTube => "youtube",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub external_ids: BTreeMap<Provider, String>,
    pub popularity: Option<u64>,
    pub artwork_url: Option<String>,
    pub url: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            external_ids: BTreeMap::new(),
            popularity: None,
            artwork_url: None,
            url: None,
        }
    }

    pub fn with_external_id(mut self, provider: Provider, id: impl Into<String>) -> Self {
        self.external_ids.insert(provider, id.into());
        self
    }

    pub fn with_popularity(mut self, popularity: Option<u64>) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_artwork_url(mut self, artwork_url: Option<String>) -> Self {
        self.artwork_url = artwork_url;
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn video_id(&self) -> Option<&str> {
        self.external_ids.get(&Provider::YouTube).map(String::as_str)
    }

    pub fn identity(&self) -> String {
        identity_key(&self.title, &self.artist)
    }
}

/// One hit from the video lookup provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMatch {
    pub video_id: String,
    pub title: String,
    pub channel: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    #[serde(default, deserialize_with = "saturating_limit")]
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    #[serde(default, deserialize_with = "saturating_limit")]
    pub limit: Option<i64>,
}

/// Reads `limit` as an integer, saturating positive values too large for `i64`
/// so they are clamped like any other oversized limit.
fn saturating_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(Some(n));
    }
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(Some(i64::MAX));
    }
    Err(serde::de::Error::custom(format!("invalid limit {:?}", raw)))
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackResponse {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub external_ids: BTreeMap<Provider, String>,
}

impl From<Track> for TrackResponse {
    fn from(track: Track) -> Self {
        Self {
            video_id: track.video_id().map(str::to_string),
            title: track.title,
            artist: track.artist,
            artwork_url: track.artwork_url,
            popularity: track.popularity,
            url: track.url,
            external_ids: track.external_ids,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}
