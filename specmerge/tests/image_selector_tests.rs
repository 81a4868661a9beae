//! Image selection against real HTTP servers.
//!
//! Every probe goes through a wiremock server, so these tests also pin down
//! how the selector reacts to slow, failing, and uninformative hosts.

mod common;

use common::wiremock_helpers::{mount_image_head, mount_slow_head, mount_status_head, url};
use specmerge::image_selector::{
    HttpProber, ImageSelector, ImageSelectorOptions, ManualClock, ProbeCache, SelectionRule,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::MockServer;

fn selector_with_timeout(timeout_ms: u64) -> ImageSelector {
    let options = ImageSelectorOptions {
        probe_timeout: Duration::from_millis(timeout_ms),
        ..Default::default()
    };
    let prober = HttpProber::new(reqwest::Client::new(), options.probe_timeout);
    let cache = ProbeCache::new(options.cache_ttl);
    ImageSelector::with_parts(prober, cache, options)
}

#[tokio::test]
async fn test_raster_beats_svg() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/img/official", "image/svg+xml", Some(500_000), None).await;
    mount_image_head(&server, "/img/unofficial", "image/jpeg", Some(40_000), None).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/img/official")), Some(&url(&server, "/img/unofficial")))
        .await;

    assert_eq!(decision.url, Some(url(&server, "/img/unofficial")));
    assert_eq!(decision.rule, SelectionRule::RasterOverSvg);
}

#[tokio::test]
async fn test_svg_unofficial_loses_to_raster_official() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/a", "image/png", Some(10), None).await;
    mount_image_head(&server, "/b", "image/svg+xml; charset=utf-8", Some(99_999), None).await;

    let selector = selector_with_timeout(2_000);
    let chosen = selector.choose_best_image(Some(&url(&server, "/a")), Some(&url(&server, "/b"))).await;
    assert_eq!(chosen, Some(url(&server, "/a")));
}

#[tokio::test]
async fn test_larger_raster_wins() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/official.jpg", "image/jpeg", Some(12_000), None).await;
    mount_image_head(&server, "/unofficial.jpg", "image/jpeg", Some(250_000), None).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/official.jpg")), Some(&url(&server, "/unofficial.jpg")))
        .await;

    assert_eq!(decision.url, Some(url(&server, "/unofficial.jpg")));
    assert_eq!(decision.rule, SelectionRule::LargerRaster);
}

#[tokio::test]
async fn test_equal_rasters_default_to_official() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/official.jpg", "image/jpeg", Some(5_000), None).await;
    mount_image_head(&server, "/unofficial.jpg", "image/jpeg", Some(5_000), None).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/official.jpg")), Some(&url(&server, "/unofficial.jpg")))
        .await;

    assert_eq!(decision.url, Some(url(&server, "/official.jpg")));
    assert_eq!(decision.rule, SelectionRule::DefaultOfficial);
}

#[tokio::test]
async fn test_known_raster_type_without_lengths() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/official", "application/octet-stream", None, None).await;
    mount_image_head(&server, "/unofficial", "image/webp", None, None).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/official")), Some(&url(&server, "/unofficial")))
        .await;

    assert_eq!(decision.url, Some(url(&server, "/unofficial")));
    assert_eq!(decision.rule, SelectionRule::KnownRasterType);
}

#[tokio::test]
async fn test_logo_like_official_is_never_probed() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/assets/logo.png", "image/png", Some(1), Some(0)).await;
    mount_image_head(&server, "/phone.jpg", "image/jpeg", Some(1), Some(0)).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/assets/logo.png")), Some(&url(&server, "/phone.jpg")))
        .await;

    assert_eq!(decision.url, Some(url(&server, "/phone.jpg")));
    assert_eq!(decision.rule, SelectionRule::OfficialLooksLikeLogo);
}

#[tokio::test]
async fn test_cache_avoids_second_probe() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/official.jpg", "image/jpeg", Some(1_000), Some(1)).await;
    mount_image_head(&server, "/unofficial.jpg", "image/jpeg", Some(2_000), Some(1)).await;

    let selector = selector_with_timeout(2_000);
    let official = url(&server, "/official.jpg");
    let unofficial = url(&server, "/unofficial.jpg");

    let first = selector.choose_best_image(Some(&official), Some(&unofficial)).await;
    let second = selector.choose_best_image(Some(&official), Some(&unofficial)).await;

    assert_eq!(first, second);
    assert_eq!(selector.cache().len(), 2);
    // Call counts are verified when `server` drops.
}

#[tokio::test]
async fn test_clones_share_cache() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/o.jpg", "image/jpeg", Some(1_000), Some(1)).await;
    mount_image_head(&server, "/u.jpg", "image/jpeg", Some(2_000), Some(1)).await;

    let selector = selector_with_timeout(2_000);
    let clone = selector.clone();

    selector.choose_best_image(Some(&url(&server, "/o.jpg")), Some(&url(&server, "/u.jpg"))).await;
    clone.choose_best_image(Some(&url(&server, "/o.jpg")), Some(&url(&server, "/u.jpg"))).await;
}

#[tokio::test]
async fn test_expired_entries_are_probed_again() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/o.jpg", "image/jpeg", Some(1_000), Some(2)).await;
    mount_image_head(&server, "/u.jpg", "image/jpeg", Some(2_000), Some(2)).await;

    let clock = Arc::new(ManualClock::default());
    let options = ImageSelectorOptions {
        cache_ttl: Duration::from_millis(60_000),
        ..Default::default()
    };
    let cache = ProbeCache::with_clock(options.cache_ttl, clock.clone());
    let prober = HttpProber::new(reqwest::Client::new(), Duration::from_secs(2));
    let selector = ImageSelector::with_parts(prober, cache, options);

    let (o, u) = (url(&server, "/o.jpg"), url(&server, "/u.jpg"));
    selector.choose_best_image(Some(&o), Some(&u)).await;
    clock.advance(Duration::from_millis(30_000));
    selector.choose_best_image(Some(&o), Some(&u)).await;
    clock.advance(Duration::from_millis(30_000));
    selector.choose_best_image(Some(&o), Some(&u)).await;
}

#[tokio::test]
async fn test_slow_probe_times_out_without_error() {
    let server = MockServer::start().await;
    mount_slow_head(&server, "/slow.jpg", 2_000).await;
    mount_image_head(&server, "/fast.jpg", "image/jpeg", Some(100), None).await;

    let selector = selector_with_timeout(200);
    let started = Instant::now();
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/slow.jpg")), Some(&url(&server, "/fast.jpg")))
        .await;

    assert!(started.elapsed() < Duration::from_millis(1_500), "probe was not time-bounded");
    // Only one probe succeeded: no size comparison, both look like rasters by URL
    assert_eq!(decision.url, Some(url(&server, "/slow.jpg")));
    assert_eq!(decision.rule, SelectionRule::DefaultOfficial);
    assert!(selector.cache().get_fresh(&url(&server, "/slow.jpg")).is_none());
    assert!(selector.cache().get_fresh(&url(&server, "/fast.jpg")).is_some());
}

#[tokio::test]
async fn test_error_status_counts_as_probe_failure() {
    let server = MockServer::start().await;
    mount_status_head(&server, "/missing.jpg", 404).await;
    mount_image_head(&server, "/brand/phone.png", "image/png", Some(100), None).await;

    let selector = selector_with_timeout(2_000);
    let decision = selector
        .choose_with_reason(Some(&url(&server, "/missing.jpg")), Some(&url(&server, "/brand/phone.png")))
        .await;

    // Probes can't decide; the unofficial URL looks like a brand asset
    assert_eq!(decision.url, Some(url(&server, "/missing.jpg")));
    assert_eq!(decision.rule, SelectionRule::UnofficialLooksLikeLogo);
    assert_eq!(selector.cache().len(), 1);
}

#[tokio::test]
async fn test_prefer_official_skips_probes() {
    let server = MockServer::start().await;
    mount_image_head(&server, "/o.jpg", "image/jpeg", Some(1), Some(0)).await;
    mount_image_head(&server, "/u.jpg", "image/jpeg", Some(1), Some(0)).await;

    let options = ImageSelectorOptions {
        prefer_official: true,
        ..Default::default()
    };
    let prober = HttpProber::new(reqwest::Client::new(), options.probe_timeout);
    let selector = ImageSelector::with_parts(prober, ProbeCache::new(options.cache_ttl), options);

    let chosen = selector.choose_best_image(Some(&url(&server, "/o.jpg")), Some(&url(&server, "/u.jpg"))).await;
    assert_eq!(chosen, Some(url(&server, "/o.jpg")));
}
