//! Decoding of loosely-shaped scraper output into [`RawDeviceSpecs`].
//!
//! Scrapers emit JSON that is only roughly consistent: fields go missing, come
//! back as `null`, change type between runs, or use slightly different keys.
//! Everything here is tolerant - an unexpected shape becomes `None` or an
//! empty list rather than an error, so merge logic never has to second-guess
//! its inputs.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::device::{RawDeviceSpecs, SpecCategory, SpecEntry};

const NAME_KEYS: &[&str] = &["name"];
const IMG_KEYS: &[&str] = &["img", "image"];
const DETAIL_KEYS: &[&str] = &["detailSpec", "detail_spec"];
const QUICK_KEYS: &[&str] = &["quickSpec", "quick_spec"];
const CATEGORY_KEYS: &[&str] = &["category", "title"];
const SPECIFICATION_KEYS: &[&str] = &["specifications", "specs"];

impl RawDeviceSpecs {
    /// Parse JSON text and normalize it. Fails only if the text is not JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .context("Failed to parse raw device specs JSON")?;
        Ok(Self::from_value(&value))
    }

    /// Normalize an arbitrary JSON value. Non-objects yield an empty record.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            name: first_string(obj, NAME_KEYS),
            img: first_string(obj, IMG_KEYS),
            detail_spec: first_array(obj, DETAIL_KEYS)
                .map(|items| items.iter().filter_map(parse_category).collect())
                .unwrap_or_default(),
            quick_spec: first_array(obj, QUICK_KEYS)
                .map(|items| items.iter().filter_map(parse_entry).collect())
                .unwrap_or_default(),
        }
    }
}

fn parse_category(value: &Value) -> Option<SpecCategory> {
    let obj = value.as_object()?;
    let category = first_string(obj, CATEGORY_KEYS)?;
    let specifications = first_array(obj, SPECIFICATION_KEYS)
        .map(|items| items.iter().filter_map(parse_entry).collect())
        .unwrap_or_default();

    Some(SpecCategory { category, specifications })
}

fn parse_entry(value: &Value) -> Option<SpecEntry> {
    let obj = value.as_object()?;
    let name = first_string(obj, NAME_KEYS)?;
    let value = obj.get("value").and_then(value_as_text)?;

    Some(SpecEntry { name, value })
}

/// Render a scalar (or a list of strings) as spec text.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_array<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().filter_map(|key| obj.get(*key)).find_map(Value::as_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record() {
        let value = json!({
            "name": "Samsung Galaxy A34",
            "img": "https://fdn2.gsmarena.com/vv/bigpic/samsung-galaxy-a34.jpg",
            "detailSpec": [
                {"category": "Memory", "specifications": [{"name": "Internal", "value": "128GB 4GB RAM"}]}
            ],
            "quickSpec": [{"name": "Display size", "value": "6.6\""}]
        });

        let raw = RawDeviceSpecs::from_value(&value);
        assert_eq!(raw.name.as_deref(), Some("Samsung Galaxy A34"));
        assert_eq!(raw.detail_spec.len(), 1);
        assert_eq!(raw.detail_spec[0].specifications[0].value, "128GB 4GB RAM");
        assert_eq!(raw.quick_spec[0].name, "Display size");
    }

    #[test]
    fn test_nulls_and_wrong_types_become_empty() {
        let value = json!({
            "name": null,
            "img": 42,
            "detailSpec": "not an array",
            "quickSpec": null
        });

        let raw = RawDeviceSpecs::from_value(&value);
        assert_eq!(raw, RawDeviceSpecs::default());
    }

    #[test]
    fn test_non_object_root() {
        assert_eq!(RawDeviceSpecs::from_value(&json!(null)), RawDeviceSpecs::default());
        assert_eq!(RawDeviceSpecs::from_value(&json!([1, 2])), RawDeviceSpecs::default());
    }

    #[test]
    fn test_blank_strings_are_absent() {
        let raw = RawDeviceSpecs::from_value(&json!({"name": "   ", "img": ""}));
        assert!(raw.name.is_none());
        assert!(raw.img.is_none());
    }

    #[test]
    fn test_image_alias() {
        let raw = RawDeviceSpecs::from_value(&json!({"image": "https://example.com/a.png"}));
        assert_eq!(raw.img.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        let value = json!({
            "detailSpec": [
                "junk",
                {"specifications": []},
                {"title": "Battery", "specs": [
                    {"name": "Capacity", "value": 5000},
                    {"name": "Charging", "value": ["25W wired", " 15W wireless "]},
                    {"value": "no name"},
                    {"name": "Removable", "value": {"nested": true}}
                ]}
            ]
        });

        let raw = RawDeviceSpecs::from_value(&value);
        assert_eq!(raw.detail_spec.len(), 1);
        let battery = &raw.detail_spec[0];
        assert_eq!(battery.category, "Battery");
        assert_eq!(
            battery.specifications,
            vec![
                SpecEntry::new("Capacity", "5000"),
                SpecEntry::new("Charging", "25W wired, 15W wireless"),
            ]
        );
    }

    #[test]
    fn test_from_json_str_rejects_non_json() {
        assert!(RawDeviceSpecs::from_json_str("not json").is_err());
        assert!(RawDeviceSpecs::from_json_str("{}").is_ok());
    }
}
