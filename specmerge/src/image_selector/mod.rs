//! Product image selection between an official and an aggregator URL.
//!
//! Cheap URL heuristics run first. Only when they cannot decide are both URLs
//! probed (concurrently, through the probe cache) and compared by type and
//! size. Probe failures are absorbed: selection then falls back to the URL
//! heuristics and finally to the official image. Nothing here returns an error
//! to the caller.

pub mod cache;
pub mod probe;
pub mod rules;

pub use cache::{Clock, ManualClock, ProbeCache, ProbeCacheEntry, SystemClock};
pub use probe::{HttpProber, ProbeInfo};
pub use rules::{is_logo_like, Candidates, Pick, SelectionRule};

use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{AppConfig, ImageSelectorConfig};
use crate::device::non_blank;

pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_CACHE_TTL_MS: u64 = 600_000;
const DEFAULT_USER_AGENT: &str = concat!("specmerge/", env!("CARGO_PKG_VERSION"));

/// Tunables for [`ImageSelector`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSelectorOptions {
    pub probe_timeout: Duration,
    pub prefer_official: bool,
    pub cache_ttl: Duration,
    /// Log every decision at info level instead of debug.
    pub debug: bool,
}

impl Default for ImageSelectorOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            prefer_official: false,
            cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            debug: false,
        }
    }
}

impl ImageSelectorOptions {
    pub fn from_config(config: &ImageSelectorConfig) -> Self {
        Self {
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            prefer_official: config.prefer_official,
            cache_ttl: Duration::from_millis(config.cache_ttl_ms),
            debug: config.debug,
        }
    }
}

/// The chosen URL together with the rule that chose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDecision {
    pub url: Option<String>,
    pub rule: SelectionRule,
}

/// Chooses a canonical product image. Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct ImageSelector {
    prober: HttpProber,
    cache: ProbeCache,
    options: ImageSelectorOptions,
}

impl ImageSelector {
    /// Build a selector with its own HTTP client and a system-clock cache.
    pub fn new(options: ImageSelectorOptions) -> Result<Self> {
        Self::with_user_agent(options, DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(options: ImageSelectorOptions, user_agent: &str) -> Result<Self> {
        let prober = HttpProber::with_user_agent(user_agent, options.probe_timeout)?;
        let cache = ProbeCache::new(options.cache_ttl);
        Ok(Self::with_parts(prober, cache, options))
    }

    /// Build a selector from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let options = ImageSelectorOptions::from_config(&config.image_selector);
        let client = HttpProber::client_builder(&config.http.user_agent)
            .connect_timeout(Duration::from_secs(config.http.request_timeout_secs))
            .build()?;
        let prober = HttpProber::new(client, options.probe_timeout);
        let cache = ProbeCache::new(options.cache_ttl);
        Ok(Self::with_parts(prober, cache, options))
    }

    /// Assemble a selector from explicit parts. The cache's own TTL applies.
    pub fn with_parts(prober: HttpProber, cache: ProbeCache, options: ImageSelectorOptions) -> Self {
        Self { prober, cache, options }
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    pub fn options(&self) -> &ImageSelectorOptions {
        &self.options
    }

    /// Pick the better of two optional image URLs. Never fails.
    pub async fn choose_best_image(&self, official: Option<&str>, unofficial: Option<&str>) -> Option<String> {
        self.choose_with_reason(official, unofficial).await.url
    }

    /// Like [`choose_best_image`](Self::choose_best_image), also reporting the deciding rule.
    pub async fn choose_with_reason(&self, official: Option<&str>, unofficial: Option<&str>) -> ImageDecision {
        let official = non_blank(official);
        let unofficial = non_blank(unofficial);

        let mut candidates = Candidates {
            official: official.as_deref(),
            unofficial: unofficial.as_deref(),
            prefer_official: self.options.prefer_official,
            official_probe: None,
            unofficial_probe: None,
        };

        if let Some((rule, pick)) = rules::evaluate(rules::PRE_PROBE_RULES, &candidates) {
            return self.decide(&candidates, rule, pick);
        }

        // Both URLs are present past the pre-probe rules
        let (official_probe, unofficial_probe) = tokio::join!(
            self.probe_cached(candidates.official.unwrap_or_default()),
            self.probe_cached(candidates.unofficial.unwrap_or_default()),
        );
        candidates.official_probe = official_probe.as_ref();
        candidates.unofficial_probe = unofficial_probe.as_ref();

        let (rule, pick) = rules::evaluate(rules::POST_PROBE_RULES, &candidates)
            .unwrap_or((SelectionRule::DefaultOfficial, Pick::Official));
        self.decide(&candidates, rule, pick)
    }

    async fn probe_cached(&self, url: &str) -> Option<ProbeInfo> {
        if let Some(hit) = self.cache.get_fresh(url) {
            debug!("Probe cache hit for {}", url);
            return Some(hit);
        }

        debug!("Probe cache miss for {}", url);
        let probe = self.prober.probe(url).await?;
        self.cache.insert(url, probe.clone());
        Some(probe)
    }

    fn decide(&self, candidates: &Candidates, rule: SelectionRule, pick: Pick) -> ImageDecision {
        let url = match pick {
            Pick::Official => candidates.official,
            Pick::Unofficial => candidates.unofficial,
            Pick::Neither => None,
        }
        .map(str::to_string);

        if self.options.debug {
            info!(
                rule = %rule,
                official = ?candidates.official,
                unofficial = ?candidates.unofficial,
                official_probe = ?candidates.official_probe,
                unofficial_probe = ?candidates.unofficial_probe,
                chosen = ?url,
                "Image selected"
            );
        } else {
            debug!("Image selected by {}: {:?}", rule, url);
        }

        ImageDecision { url, rule }
    }
}
