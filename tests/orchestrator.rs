//! Fallback orchestration against a scripted extractor.

mod common;

use common::{descriptor, orchestrator, Outcome, StubExtractor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use video_resolve_proxy::cache::ResolutionCache;
use video_resolve_proxy::proxy_pool::ProxyPool;
use video_resolve_proxy::resolver::{
    ExtractionErrorKind, ExtractionStrategy, MediaKind, Orchestrator, QualityTier,
};
use video_resolve_proxy::Error;

const VIDEO123: &str = "https://www.youtube.com/watch?v=video123";
const VIDEO999: &str = "https://www.youtube.com/watch?v=video999";

#[tokio::test]
async fn first_success_wins_and_later_strategies_are_skipped() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Fail(ExtractionErrorKind::Transient));
    extractor.on("b", Outcome::Succeed(descriptor("from-b", None)));
    extractor.on("c", Outcome::Succeed(descriptor("from-c", None)));
    let orch = orchestrator(extractor.clone(), &["a", "b", "c"]);

    let resolved = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();

    assert_eq!(resolved.title, "Title of from-b");
    assert_eq!(extractor.strategies_called(), ["a", "b"]);
}

#[tokio::test]
async fn cached_result_is_served_without_extraction() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Succeed(descriptor("video123", Some(1000))));
    let orch = orchestrator(extractor.clone(), &["a"]);

    let first = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(extractor.call_count(), 1);
    assert_eq!(orch.cache().stats().positive_count, 1);

    let second = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(extractor.call_count(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn other_quality_tier_is_resolved_separately() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Succeed(descriptor("video123", None)));
    let orch = orchestrator(extractor.clone(), &["a"]);

    orch.resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    orch.resolve(VIDEO123, MediaKind::Video, QualityTier::High)
        .await
        .unwrap();
    orch.resolve(VIDEO123, MediaKind::Audio, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(extractor.call_count(), 3);
    assert_eq!(orch.cache().stats().positive_count, 3);
}

#[tokio::test]
async fn exhaustion_marks_source_and_repeat_fails_fast() {
    let extractor = StubExtractor::new();
    let orch = orchestrator(extractor.clone(), &["a", "b", "c"]);

    let err = orch
        .resolve(VIDEO999, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ResolutionFailed { .. }), "{err:?}");
    assert_eq!(extractor.call_count(), 3);
    assert!(orch.cache().is_negatively_marked(VIDEO999));

    let err = orch
        .resolve(VIDEO999, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecentlyFailed { .. }), "{err:?}");
    assert_eq!(extractor.call_count(), 3);

    // The negative marker covers every tier and kind of the same source.
    let err = orch
        .resolve(VIDEO999, MediaKind::Audio, QualityTier::Best)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecentlyFailed { .. }));
    assert_eq!(extractor.call_count(), 3);
}

#[tokio::test]
async fn resolution_failure_carries_last_error() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Fail(ExtractionErrorKind::Transient));
    extractor.on("b", Outcome::Fail(ExtractionErrorKind::NotFound));
    let orch = orchestrator(extractor.clone(), &["a", "b"]);

    match orch
        .resolve(VIDEO999, MediaKind::Video, QualityTier::Low)
        .await
    {
        Err(Error::ResolutionFailed { source, .. }) => {
            assert_eq!(source.kind, ExtractionErrorKind::NotFound)
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn source_is_retried_once_negative_ttl_passes() {
    let extractor = StubExtractor::new();
    let orch = Orchestrator::new(
        Arc::new(ResolutionCache::new(
            16,
            Duration::from_secs(3600),
            Duration::from_secs(300),
        )),
        extractor.clone(),
        common::strategies(&["a"]),
    );

    assert!(orch
        .resolve(VIDEO999, MediaKind::Video, QualityTier::Medium)
        .await
        .is_err());
    assert_eq!(extractor.call_count(), 1);

    tokio::time::advance(Duration::from_secs(301)).await;
    extractor.on("a", Outcome::Succeed(descriptor("video999", None)));

    let resolved = orch
        .resolve(VIDEO999, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(resolved.title, "Title of video999");
    assert_eq!(extractor.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn strategy_timeout_moves_on_to_next_strategy() {
    let extractor = StubExtractor::new();
    extractor.on("slow", Outcome::Hang);
    extractor.on("fast", Outcome::Succeed(descriptor("fast", None)));
    let orch = Orchestrator::new(
        Arc::new(ResolutionCache::default()),
        extractor.clone(),
        vec![
            ExtractionStrategy::new("slow").with_timeout(Duration::from_secs(2)),
            ExtractionStrategy::new("fast").with_timeout(Duration::from_secs(2)),
        ],
    );

    let resolved = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(resolved.title, "Title of fast");
    assert_eq!(extractor.strategies_called(), ["slow", "fast"]);
}

#[tokio::test]
async fn access_restricted_failure_retries_with_credentials() {
    let extractor = StubExtractor::new();
    extractor.on(
        "a",
        Outcome::NeedsCredentials(ExtractionErrorKind::AuthRequired, descriptor("gated", None)),
    );
    extractor.on("b", Outcome::Succeed(descriptor("b", None)));
    let orch = orchestrator(extractor.clone(), &["a", "b"])
        .with_credentials(Some("/secrets/cookies.txt".into()));

    let resolved = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(resolved.title, "Title of gated");

    let calls = extractor.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].strategy.as_str(), calls[0].authenticated), ("a", false));
    assert_eq!((calls[1].strategy.as_str(), calls[1].authenticated), ("a", true));
}

#[tokio::test]
async fn transient_failure_is_not_retried_with_credentials() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Fail(ExtractionErrorKind::Transient));
    extractor.on("b", Outcome::Succeed(descriptor("b", None)));
    let orch = orchestrator(extractor.clone(), &["a", "b"])
        .with_credentials(Some("/secrets/cookies.txt".into()));

    orch.resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert!(extractor.calls().iter().all(|c| !c.authenticated));
    assert_eq!(extractor.strategies_called(), ["a", "b"]);
}

#[tokio::test]
async fn auth_gated_source_without_credentials_is_reported_distinctly() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Fail(ExtractionErrorKind::AuthRequired));
    let orch = orchestrator(extractor.clone(), &["a"]);

    let err = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthRequired { .. }), "{err:?}");
    assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);
    assert!(orch.cache().is_negatively_marked(VIDEO123));
}

#[tokio::test]
async fn empty_stream_location_counts_as_failure() {
    let extractor = StubExtractor::new();
    let mut empty = descriptor("empty", None);
    empty.stream_url = String::new();
    extractor.on("a", Outcome::Succeed(empty));
    extractor.on("b", Outcome::Succeed(descriptor("b", None)));
    let orch = orchestrator(extractor.clone(), &["a", "b"]);

    let resolved = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();
    assert_eq!(resolved.title, "Title of b");
}

#[tokio::test]
async fn no_strategies_is_a_resolution_failure() {
    let extractor = StubExtractor::new();
    let orch = orchestrator(extractor.clone(), &[]);

    let err = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ResolutionFailed { .. }));
    assert_eq!(extractor.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn saturated_upstream_capacity_is_bounded_by_strategy_timeout() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Succeed(descriptor("a", None)));
    let permits = Arc::new(Semaphore::new(1));
    let _open_stream = permits.clone().acquire_owned().await.unwrap();
    let orch = orchestrator(extractor.clone(), &["a"]).with_permits(permits);

    let started = tokio::time::Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(3600),
        orch.resolve(VIDEO123, MediaKind::Video, QualityTier::Medium),
    )
    .await
    .expect("resolve must finish once the strategy timeout elapses");

    assert!(matches!(outcome, Err(Error::ResolutionFailed { .. })));
    assert_eq!(extractor.call_count(), 0);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn descriptor_remembers_the_extraction_proxy() {
    let extractor = StubExtractor::new();
    extractor.on("a", Outcome::Succeed(descriptor("a", None)));
    let pool = ProxyPool::new(vec![
        "socks5://p1:1080".to_string(),
        "socks5://p2:1080".to_string(),
        "socks5://p3:1080".to_string(),
    ]);
    let orch = orchestrator(extractor.clone(), &["a"]).with_proxies(pool.clone());

    let resolved = orch
        .resolve(VIDEO123, MediaKind::Video, QualityTier::Medium)
        .await
        .unwrap();

    let used = extractor.calls()[0].proxy.clone();
    assert!(used.as_ref().is_some_and(|p| pool.endpoints().contains(p)));
    assert_eq!(resolved.proxy, used);
}
