//! Field extraction from free-text spec values.
//!
//! Storage sizes come from the aggregator's "Memory" row (e.g. `"128GB 4GB RAM"`),
//! battery capacity and chemistry from the "Battery" category. A value that
//! matches nothing is not an error; the field simply stays `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::device::SpecCategory;

/// Any `<integer> GB`, with optional whitespace before the unit.
static STORAGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*GB").unwrap()
});

/// A size explicitly labelled as RAM, e.g. `4GB RAM`.
static RAM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*GB\s*RAM").unwrap()
});

/// 3-5 digit capacity followed by mAh.
static BATTERY_SIZE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{3,5})\s*mAh\b").unwrap()
});

/// Recognized battery chemistries as `(label, pattern)`.
///
/// Order matters: longer spellings must precede their prefixes so that
/// "Li-Polymer" is not read as "Li-Po" and "Lithium Polymer" not as "Lithium".
pub const BATTERY_CHEMISTRIES: &[(&str, &str)] = &[
    ("Li-Polymer", r"li[-\s]?polymer"),
    ("Li-Po", r"li[-\s]?po"),
    ("Li-Ion", r"li[-\s]?ion"),
    ("Lithium Polymer", r"lithium[-\s]*polymer"),
    ("Lithium", r"lithium"),
    ("Polymer", r"polymer"),
];

static BATTERY_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    // One capture group per table row, so a match maps back to its label
    let alternatives: Vec<String> = BATTERY_CHEMISTRIES
        .iter()
        .map(|(_, pattern)| format!("({})", pattern))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|"))).unwrap()
});

/// Storage configuration parsed from a memory spec value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantInfo {
    pub internal: Option<String>,
    pub ram: Option<String>,
}

/// Battery capacity and chemistry parsed from the battery category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatteryInfo {
    pub size: Option<String>,
    #[serde(rename = "type")]
    pub battery_type: Option<String>,
}

/// Split a memory string into internal storage and RAM.
///
/// The first `<N> GB` is internal storage and the second, if any, is RAM.
/// With a single size, RAM is only filled when the size is explicitly
/// followed by the word "RAM".
pub fn parse_variant(text: &str) -> VariantInfo {
    let mut sizes = STORAGE_REGEX.captures_iter(text).map(|caps| format_gb(&caps[1]));

    let internal = sizes.next();
    let ram = match sizes.next() {
        Some(second) => Some(second),
        None if internal.is_some() => RAM_REGEX.captures(text).map(|caps| format_gb(&caps[1])),
        None => None,
    };

    VariantInfo { internal, ram }
}

/// Pull battery size and chemistry out of the first category named like "battery".
///
/// Values are scanned in order and a later match replaces an earlier one,
/// independently for each field.
pub fn parse_battery(categories: &[SpecCategory]) -> BatteryInfo {
    let Some(battery) = categories
        .iter()
        .find(|c| c.category.to_lowercase().contains("battery"))
    else {
        return BatteryInfo::default();
    };

    let mut info = BatteryInfo::default();
    for spec in &battery.specifications {
        if let Some(caps) = BATTERY_SIZE_REGEX.captures(&spec.value) {
            info.size = Some(format!("{} mAh", &caps[1]));
        }
        if let Some(label) = chemistry_label(&spec.value) {
            info.battery_type = Some(label.to_string());
        }
    }

    info
}

fn format_gb(digits: &str) -> String {
    format!("{} GB", digits)
}

/// Canonical chemistry label for the leftmost vocabulary match in `text`.
fn chemistry_label(text: &str) -> Option<&'static str> {
    let caps = BATTERY_TYPE_REGEX.captures(text)?;
    BATTERY_CHEMISTRIES
        .iter()
        .enumerate()
        .find(|(i, _)| caps.get(i + 1).is_some())
        .map(|(_, (label, _))| *label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SpecEntry;

    fn battery(values: &[&str]) -> Vec<SpecCategory> {
        vec![SpecCategory::new(
            "Battery",
            values.iter().map(|v| SpecEntry::new("Type", *v)).collect(),
        )]
    }

    #[test]
    fn test_variant_internal_and_ram() {
        let v = parse_variant("128GB 4GB RAM");
        assert_eq!(v.internal.as_deref(), Some("128 GB"));
        assert_eq!(v.ram.as_deref(), Some("4 GB"));
    }

    #[test]
    fn test_variant_internal_only() {
        let v = parse_variant("64GB");
        assert_eq!(v.internal.as_deref(), Some("64 GB"));
        assert!(v.ram.is_none());
    }

    #[test]
    fn test_variant_empty() {
        assert_eq!(parse_variant(""), VariantInfo::default());
    }

    #[test]
    fn test_variant_no_sizes() {
        assert_eq!(parse_variant("microSDXC (dedicated slot)"), VariantInfo::default());
    }

    #[test]
    fn test_variant_whitespace_and_case() {
        let v = parse_variant("256 gb 8  Gb ram");
        assert_eq!(v.internal.as_deref(), Some("256 GB"));
        assert_eq!(v.ram.as_deref(), Some("8 GB"));
    }

    #[test]
    fn test_variant_uses_first_two_of_many() {
        let v = parse_variant("128GB 6GB RAM, 256GB 8GB RAM");
        assert_eq!(v.internal.as_deref(), Some("128 GB"));
        assert_eq!(v.ram.as_deref(), Some("6 GB"));
    }

    #[test]
    fn test_variant_single_size_labelled_ram() {
        let v = parse_variant("8GB RAM");
        assert_eq!(v.internal.as_deref(), Some("8 GB"));
        assert_eq!(v.ram.as_deref(), Some("8 GB"));
    }

    #[test]
    fn test_battery_size_and_type() {
        let info = parse_battery(&battery(&["Li-Ion 5000 mAh"]));
        assert_eq!(info.size.as_deref(), Some("5000 mAh"));
        assert_eq!(info.battery_type.as_deref(), Some("Li-Ion"));
    }

    #[test]
    fn test_battery_empty_categories() {
        assert_eq!(parse_battery(&[]), BatteryInfo::default());
    }

    #[test]
    fn test_battery_no_battery_category() {
        let cats = vec![SpecCategory::new("Memory", vec![SpecEntry::new("Internal", "5000 mAh Li-Ion")])];
        assert_eq!(parse_battery(&cats), BatteryInfo::default());
    }

    #[test]
    fn test_battery_category_name_is_substring_match() {
        let cats = vec![SpecCategory::new("BATTERY & CHARGING", vec![SpecEntry::new("Capacity", "4500mAh")])];
        assert_eq!(parse_battery(&cats).size.as_deref(), Some("4500 mAh"));
    }

    #[test]
    fn test_battery_later_values_overwrite() {
        let info = parse_battery(&battery(&["Li-Po 4000 mAh", "5000 mAh", "Lithium Polymer"]));
        assert_eq!(info.size.as_deref(), Some("5000 mAh"));
        assert_eq!(info.battery_type.as_deref(), Some("Lithium Polymer"));
    }

    #[test]
    fn test_battery_longer_chemistry_wins() {
        assert_eq!(parse_battery(&battery(&["Li-Polymer"])).battery_type.as_deref(), Some("Li-Polymer"));
        assert_eq!(parse_battery(&battery(&["Li-Po"])).battery_type.as_deref(), Some("Li-Po"));
    }

    #[test]
    fn test_battery_type_spacing_normalized() {
        let info = parse_battery(&battery(&["Lithium    Polymer, non-removable"]));
        assert_eq!(info.battery_type.as_deref(), Some("Lithium Polymer"));
    }

    #[test]
    fn test_battery_type_case_and_hyphen_insensitive() {
        let info = parse_battery(&battery(&["li ion"]));
        assert_eq!(info.battery_type.as_deref(), Some("Li-Ion"));

        let info = parse_battery(&battery(&["Non-removable LI-POLYMER 4000 mAh"]));
        assert_eq!(info.battery_type.as_deref(), Some("Li-Polymer"));

        let info = parse_battery(&battery(&["lithium-polymer"]));
        assert_eq!(info.battery_type.as_deref(), Some("Lithium Polymer"));
    }

    #[test]
    fn test_battery_size_digit_bounds() {
        assert!(parse_battery(&battery(&["50 mAh"])).size.is_none());
        assert!(parse_battery(&battery(&["123456 mAh"])).size.is_none());
        assert_eq!(parse_battery(&battery(&["800 mAh"])).size.as_deref(), Some("800 mAh"));
    }

    #[test]
    fn test_battery_unmatched_field_stays_none() {
        let info = parse_battery(&battery(&["5000 mAh, non-removable"]));
        assert_eq!(info.size.as_deref(), Some("5000 mAh"));
        assert!(info.battery_type.is_none());
    }

    #[test]
    fn test_chemistry_table_patterns_compile() {
        for (label, pattern) in BATTERY_CHEMISTRIES {
            let re = Regex::new(&format!("(?i)^{}$", pattern)).unwrap();
            assert!(re.is_match(label), "{} should match its own pattern", label);
        }
    }
}
