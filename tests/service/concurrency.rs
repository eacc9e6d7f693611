use crate::fixtures::{FakeMetadata, FakeVideo, create_test_app, sample_tracks};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cold_queries_share_one_upstream_call() {
    let metadata = FakeMetadata::new(sample_tracks()).with_delay(Duration::from_millis(50));
    let app = create_test_app(metadata, None);

    let requests = (0..8).map(|i| {
        let service = app.service.clone();
        let term = if i % 2 == 0 { "Song" } else { "  song " };
        tokio::spawn(async move { service.search(term, Some(3)).await })
    });
    let results = futures::future::join_all(requests).await;

    let first = results[0].as_ref().unwrap().as_ref().unwrap().clone();
    for result in &results {
        assert_eq!(result.as_ref().unwrap().as_ref().unwrap(), &first);
    }
    assert_eq!(app.metadata.search_calls(), 1);
}

#[tokio::test]
async fn distinct_queries_do_not_block_each_other() {
    let metadata = FakeMetadata::new(sample_tracks()).with_delay(Duration::from_millis(20));
    let app = create_test_app(metadata, None);

    let (a, b) = tokio::join!(
        app.service.search("alpha", Some(2)),
        app.service.search("beta", Some(2))
    );

    assert!(a.is_ok() && b.is_ok());
    assert_eq!(app.metadata.search_calls(), 2);
}

#[tokio::test]
async fn slow_enrichment_does_not_reorder_results() {
    let video = FakeVideo::new()
        .with_videos("Song A Artist X", &["vid-a"])
        .with_videos("Song B Artist Y", &["vid-b"])
        .with_videos("Song C Artist Z", &["vid-c"])
        .with_slow_query("Song A Artist X", Duration::from_millis(40));
    let app = create_test_app(FakeMetadata::new(sample_tracks()), Some(video));

    let tracks = app.service.search("song", None).await.unwrap();

    let pairs: Vec<_> = tracks
        .iter()
        .map(|t| (t.title.as_str(), t.video_id().unwrap_or_default()))
        .collect();
    assert_eq!(
        pairs,
        [("Song A", "vid-a"), ("Song B", "vid-b"), ("Song C", "vid-c")]
    );
}
