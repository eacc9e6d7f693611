use crate::fixtures::{FakeMetadata, FakeVideo, TEST_TTL, create_test_app, get, sample_tracks};
use axum::http::StatusCode;
use soundmap_web::error::UpstreamError;
use soundmap_web::models::{ErrorResponse, TrackResponse};
use std::time::Duration;

fn parse_tracks(body: &[u8]) -> Vec<TrackResponse> {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn search_attaches_first_video_match() {
    let video = FakeVideo::new()
        .with_videos("Song A Artist X", &["abc123", "zzz999"])
        .with_videos("Song B Artist Y", &["def456"]);
    let app = create_test_app(FakeMetadata::new(sample_tracks()), Some(video));

    let (status, body) = get(&app.router, "/search?query=song&limit=10").await;

    assert_eq!(status, StatusCode::OK);
    let tracks = parse_tracks(&body);
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].title, "Song A");
    assert_eq!(tracks[0].video_id.as_deref(), Some("abc123"));
    assert_eq!(tracks[0].popularity, Some(1200));
    assert_eq!(tracks[0].artwork_url.as_deref(), Some("https://img/a.png"));
    assert_eq!(tracks[1].video_id.as_deref(), Some("def456"));
    assert_eq!(tracks[2].video_id, None);
}

#[tokio::test]
async fn search_returns_at_most_limit_tracks() {
    let app = create_test_app(FakeMetadata::new(sample_tracks()), None);

    let (status, body) = get(&app.router, "/search?query=song&limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let tracks = parse_tracks(&body);
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| !t.title.is_empty() && !t.artist.is_empty()));
}

#[tokio::test]
async fn empty_query_is_rejected_before_any_upstream_call() {
    let app = create_test_app(FakeMetadata::new(sample_tracks()), Some(FakeVideo::new()));

    for uri in ["/search?query=&limit=10", "/search?query=%20%20", "/search"] {
        let (status, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error.kind, "invalid_request");
    }

    assert_eq!(app.metadata.total_calls(), 0);
    assert!(app.video.as_ref().unwrap().queries().is_empty());
}

#[tokio::test]
async fn non_positive_or_garbled_limit_is_rejected() {
    let app = create_test_app(FakeMetadata::new(sample_tracks()), None);

    for uri in [
        "/search?query=song&limit=0",
        "/search?query=song&limit=-4",
        "/search?query=song&limit=ten",
    ] {
        let (status, body) = get(&app.router, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error.kind, "invalid_request");
    }
    assert_eq!(app.metadata.total_calls(), 0);
}

#[tokio::test]
async fn repeated_search_is_served_from_cache() {
    let video = FakeVideo::new().with_videos("Song A Artist X", &["abc123"]);
    let app = create_test_app(FakeMetadata::new(sample_tracks()), Some(video));

    let (_, first) = get(&app.router, "/search?query=Song&limit=3").await;
    let (_, second) = get(&app.router, "/search?query=%20%20song%20&limit=3").await;

    assert_eq!(first, second);
    assert_eq!(app.metadata.search_calls(), 1);
    assert_eq!(app.video.as_ref().unwrap().queries().len(), 3);
}

#[tokio::test]
async fn expired_entry_triggers_fresh_upstream_call() {
    let app = create_test_app(FakeMetadata::new(sample_tracks()), None);

    get(&app.router, "/search?query=song").await;
    app.clock.advance(TEST_TTL + Duration::from_secs(1));
    let (status, _) = get(&app.router, "/search?query=song").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.metadata.search_calls(), 2);
}

#[tokio::test]
async fn video_outage_still_returns_tracks() {
    let video = FakeVideo::failing(UpstreamError::Unavailable("connection reset".to_string()));
    let app = create_test_app(FakeMetadata::new(sample_tracks()), Some(video));

    let (status, body) = get(&app.router, "/search?query=song").await;

    assert_eq!(status, StatusCode::OK);
    let tracks = parse_tracks(&body);
    assert_eq!(tracks.len(), 3);
    assert!(tracks.iter().all(|t| t.video_id.is_none()));
}

#[tokio::test]
async fn metadata_outage_surfaces_error_payload() {
    let metadata = FakeMetadata::new(sample_tracks()).failing_with(vec![
        UpstreamError::Unavailable("secret upstream detail".to_string()),
    ]);
    let app = create_test_app(metadata, None);

    let (status, body) = get(&app.router, "/search?query=song").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.kind, "upstream_unavailable");
    assert!(!error.error.message.contains("secret"));
}

#[tokio::test]
async fn malformed_metadata_is_a_gateway_error() {
    let metadata = FakeMetadata::new(sample_tracks()).failing_with(vec![
        UpstreamError::MalformedResponse("missing trackmatches".to_string()),
    ]);
    let app = create_test_app(metadata, None);

    let (status, body) = get(&app.router, "/search?query=song").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.kind, "upstream_malformed_response");
    assert_eq!(app.metadata.search_calls(), 1);
}

#[tokio::test]
async fn failed_search_is_not_cached() {
    let metadata = FakeMetadata::new(sample_tracks())
        .failing_with(vec![UpstreamError::Unavailable("down".to_string())]);
    let app = create_test_app(metadata, None);

    let (status, _) = get(&app.router, "/search?query=song").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get(&app.router, "/search?query=song").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_tracks(&body).len(), 3);
    assert_eq!(app.metadata.search_calls(), 2);
}
