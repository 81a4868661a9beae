//! URL heuristics and the ordered decision rules for image selection.
//!
//! Every rule is a pure function over [`Candidates`] that either makes a
//! decision or passes. Rules run in table order and the first decision wins.

use super::probe::ProbeInfo;

/// One way a URL can look like a logo or brand asset rather than a product shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoRule {
    /// The lowercased path contains this fragment.
    PathContains(&'static str),
    /// The lowercased path ends with this extension (including the dot).
    Extension(&'static str),
}

impl LogoRule {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            LogoRule::PathContains(fragment) => path.contains(fragment),
            LogoRule::Extension(ext) => path.ends_with(ext),
        }
    }
}

/// Known logo / brand-asset URL shapes, checked against the URL path.
pub const LOGO_URL_RULES: &[LogoRule] = &[
    LogoRule::PathContains("logo"),
    LogoRule::PathContains("/brand/"),
    LogoRule::PathContains("/brands/"),
    LogoRule::PathContains("/icon/"),
    LogoRule::PathContains("/icons/"),
    LogoRule::PathContains("/favicon"),
    LogoRule::PathContains("/sprites/"),
    LogoRule::PathContains("/static/img/global/"),
    LogoRule::Extension(".svg"),
];

/// Lowercased path of a URL, without query or fragment.
fn url_path(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_lowercase(),
    }
}

/// First logo rule that matches the URL, if any.
pub fn matching_logo_rule(url: &str) -> Option<LogoRule> {
    let path = url_path(url);
    LOGO_URL_RULES.iter().copied().find(|rule| rule.matches(&path))
}

pub fn is_logo_like(url: &str) -> bool {
    matching_logo_rule(url).is_some()
}

/// Everything a rule may look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct Candidates<'a> {
    pub official: Option<&'a str>,
    pub unofficial: Option<&'a str>,
    pub prefer_official: bool,
    pub official_probe: Option<&'a ProbeInfo>,
    pub unofficial_probe: Option<&'a ProbeInfo>,
}

impl<'a> Candidates<'a> {
    fn both_probes(&self) -> Option<(&'a ProbeInfo, &'a ProbeInfo)> {
        Some((self.official_probe?, self.unofficial_probe?))
    }
}

/// Outcome of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    Official,
    Unofficial,
    Neither,
}

/// Which rule made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    PreferOfficialOverride,
    OfficialLooksLikeLogo,
    SingleCandidate,
    RasterOverSvg,
    LargerRaster,
    KnownRasterType,
    UnofficialLooksLikeLogo,
    DefaultOfficial,
}

impl std::fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SelectionRule::PreferOfficialOverride => "prefer_official_override",
            SelectionRule::OfficialLooksLikeLogo => "official_looks_like_logo",
            SelectionRule::SingleCandidate => "single_candidate",
            SelectionRule::RasterOverSvg => "raster_over_svg",
            SelectionRule::LargerRaster => "larger_raster",
            SelectionRule::KnownRasterType => "known_raster_type",
            SelectionRule::UnofficialLooksLikeLogo => "unofficial_looks_like_logo",
            SelectionRule::DefaultOfficial => "default_official",
        };
        write!(f, "{}", name)
    }
}

pub type Strategy = fn(&Candidates) -> Option<Pick>;

/// Rules that need no network access. Evaluated before any probe.
pub const PRE_PROBE_RULES: &[(SelectionRule, Strategy)] = &[
    (SelectionRule::PreferOfficialOverride, prefer_official_override),
    (SelectionRule::OfficialLooksLikeLogo, official_looks_like_logo),
    (SelectionRule::SingleCandidate, single_candidate),
];

/// Rules evaluated once both URLs have been probed (or failed to).
/// The last rule always decides.
pub const POST_PROBE_RULES: &[(SelectionRule, Strategy)] = &[
    (SelectionRule::RasterOverSvg, raster_over_svg),
    (SelectionRule::LargerRaster, larger_raster),
    (SelectionRule::KnownRasterType, known_raster_type),
    (SelectionRule::UnofficialLooksLikeLogo, unofficial_looks_like_logo),
    (SelectionRule::DefaultOfficial, default_official),
];

/// Run rules in order and return the first decision.
pub fn evaluate(rules: &[(SelectionRule, Strategy)], candidates: &Candidates) -> Option<(SelectionRule, Pick)> {
    rules
        .iter()
        .find_map(|(rule, strategy)| strategy(candidates).map(|pick| (*rule, pick)))
}

pub fn prefer_official_override(c: &Candidates) -> Option<Pick> {
    (c.prefer_official && c.official.is_some()).then_some(Pick::Official)
}

pub fn official_looks_like_logo(c: &Candidates) -> Option<Pick> {
    let official = c.official?;
    (c.unofficial.is_some() && is_logo_like(official)).then_some(Pick::Unofficial)
}

pub fn single_candidate(c: &Candidates) -> Option<Pick> {
    match (c.official, c.unofficial) {
        (None, None) => Some(Pick::Neither),
        (Some(_), None) => Some(Pick::Official),
        (None, Some(_)) => Some(Pick::Unofficial),
        (Some(_), Some(_)) => None,
    }
}

pub fn raster_over_svg(c: &Candidates) -> Option<Pick> {
    let (official, unofficial) = c.both_probes()?;
    match (official.is_svg()?, unofficial.is_svg()?) {
        (true, false) => Some(Pick::Unofficial),
        (false, true) => Some(Pick::Official),
        _ => None,
    }
}

pub fn larger_raster(c: &Candidates) -> Option<Pick> {
    let (official, unofficial) = c.both_probes()?;
    // A probe without a content type is not known to be raster
    if official.is_svg() != Some(false) || unofficial.is_svg() != Some(false) {
        return None;
    }
    let (a, b) = (official.content_length?, unofficial.content_length?);
    match a.cmp(&b) {
        std::cmp::Ordering::Greater => Some(Pick::Official),
        std::cmp::Ordering::Less => Some(Pick::Unofficial),
        std::cmp::Ordering::Equal => None,
    }
}

pub fn known_raster_type(c: &Candidates) -> Option<Pick> {
    let (official, unofficial) = c.both_probes()?;
    if official.content_length.is_some() && unofficial.content_length.is_some() {
        return None;
    }
    match (official.is_known_raster(), unofficial.is_known_raster()) {
        (true, false) => Some(Pick::Official),
        (false, true) => Some(Pick::Unofficial),
        _ => None,
    }
}

pub fn unofficial_looks_like_logo(c: &Candidates) -> Option<Pick> {
    let (official, unofficial) = (c.official?, c.unofficial?);
    (is_logo_like(unofficial) && !is_logo_like(official)).then_some(Pick::Official)
}

pub fn default_official(_c: &Candidates) -> Option<Pick> {
    Some(Pick::Official)
}
