//! Reconciliation of official and aggregator scrapes into one device record.
//!
//! The aggregator's detail tree is the source for derived quickSpec fields
//! (storage and battery); the manufacturer's tree is carried along verbatim.
//! Every quickSpec key is computed fresh on each call, so merging the same
//! inputs twice produces the same record.

use thiserror::Error;
use tracing::debug;

use crate::device::{
    non_blank, DeviceIdentity, ExistingRecord, MergedDevice, RawDeviceSpecs, SpecCategory, SpecEntry,
};
use crate::image_selector::ImageSelector;
use crate::spec_parser::{parse_battery, parse_variant};

pub const INTERNAL_STORAGE: &str = "Internal Storage";
pub const RAM_SIZE: &str = "RAM size";
pub const RAM_STORAGE: &str = "RAM Storage";
pub const BATTERY_SIZE: &str = "Battery size";
pub const BATTERY_TYPE: &str = "Battery type";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("No usable brand/model for device (name: {name:?}, brand: {brand:?}, model: {model:?})")]
    MissingIdentity {
        name: Option<String>,
        brand: Option<String>,
        model: Option<String>,
    },
}

/// Merges raw spec pairs. Holds the image selector so the probe cache is
/// shared by every merge done through the same merger.
#[derive(Debug, Clone)]
pub struct SpecMerger {
    image_selector: ImageSelector,
}

impl SpecMerger {
    pub fn new(image_selector: ImageSelector) -> Self {
        Self { image_selector }
    }

    pub fn image_selector(&self) -> &ImageSelector {
        &self.image_selector
    }

    /// Merge one device.
    ///
    /// Fails only when no brand/model pair can be established from `identity`,
    /// the existing record, or any of the device names.
    pub async fn merge_specs(
        &self,
        existing: Option<&ExistingRecord>,
        official: &RawDeviceSpecs,
        unofficial: &RawDeviceSpecs,
        identity: &DeviceIdentity,
    ) -> Result<MergedDevice, MergeError> {
        let name = canonical_name(existing, official, unofficial);
        let names = candidate_names(existing, official, unofficial);
        let (brand, model) = resolve_identity(identity, existing, &names)?;

        debug!(brand = %brand, model = %model, name = ?name, "Merging device specs");

        let img = self
            .image_selector
            .choose_best_image(official.img.as_deref(), unofficial.img.as_deref())
            .await;

        Ok(MergedDevice {
            brand,
            model,
            name,
            img,
            quick_spec: build_quick_spec(official, unofficial),
            official_specs: official.detail_spec.clone(),
            unofficial_specs: unofficial.detail_spec.clone(),
        })
    }
}

/// Device name precedence: existing record, then aggregator, then manufacturer.
pub fn canonical_name(
    existing: Option<&ExistingRecord>,
    official: &RawDeviceSpecs,
    unofficial: &RawDeviceSpecs,
) -> Option<String> {
    non_blank(existing.and_then(|e| e.name.as_deref()))
        .or_else(|| non_blank(unofficial.name.as_deref()))
        .or_else(|| non_blank(official.name.as_deref()))
}

/// Non-blank device names in precedence order: existing, aggregator, manufacturer.
fn candidate_names<'a>(
    existing: Option<&'a ExistingRecord>,
    official: &'a RawDeviceSpecs,
    unofficial: &'a RawDeviceSpecs,
) -> Vec<&'a str> {
    [
        existing.and_then(|e| e.name.as_deref()),
        unofficial.name.as_deref(),
        official.name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .collect()
}

/// Establish brand and model. Explicit identity fields come first, then the
/// existing record. Whatever is still missing is read from the candidate
/// names, walking them in order until one yields it.
fn resolve_identity(
    identity: &DeviceIdentity,
    existing: Option<&ExistingRecord>,
    names: &[&str],
) -> Result<(String, String), MergeError> {
    let brand = non_blank(identity.brand.as_deref())
        .or_else(|| non_blank(existing.and_then(|e| e.brand.as_deref())));
    let model = non_blank(identity.model.as_deref())
        .or_else(|| non_blank(existing.and_then(|e| e.model.as_deref())));

    let (brand, model) = match (brand, model) {
        (Some(brand), Some(model)) => (Some(brand), Some(model)),
        (Some(brand), None) => {
            let model = names.iter().find_map(|name| model_from_name(name, &brand));
            (Some(brand), model)
        }
        (None, Some(model)) => {
            let brand = names.iter().find_map(|name| brand_from_name(name, &model));
            (brand, Some(model))
        }
        (None, None) => match names.iter().find_map(|name| split_device_name(name)) {
            Some((brand, model)) => (Some(brand), Some(model)),
            None => (None, None),
        },
    };

    match (brand, model) {
        (Some(brand), Some(model)) => Ok((brand, model)),
        (brand, model) => Err(MergeError::MissingIdentity {
            name: names.first().map(|n| n.to_string()),
            brand,
            model,
        }),
    }
}

/// "Samsung Galaxy A34" -> ("Samsung", "Galaxy A34"). A single word is no pair.
fn split_device_name(name: &str) -> Option<(String, String)> {
    let (brand, model) = name.trim().split_once(char::is_whitespace)?;
    Some((brand.to_string(), non_blank(Some(model))?))
}

/// Model for a known brand: the name minus a leading brand, or the whole name
/// when it does not start with the brand. A name that is only the brand gives nothing.
fn model_from_name(name: &str, brand: &str) -> Option<String> {
    match strip_prefix_ignore_case(name, brand) {
        Some(rest) => non_blank(Some(rest)),
        None => non_blank(Some(name)),
    }
}

/// Brand for a known model: whatever precedes a trailing model, otherwise the
/// first word of a multi-word name.
fn brand_from_name(name: &str, model: &str) -> Option<String> {
    if let Some(prefix) = strip_suffix_ignore_case(name, model) {
        return non_blank(Some(prefix));
    }
    split_device_name(name).map(|(brand, _)| brand)
}

/// `name` without a leading `word`, matched case-insensitively on a word boundary.
fn strip_prefix_ignore_case<'a>(name: &'a str, word: &str) -> Option<&'a str> {
    let head = name.get(..word.len())?;
    let rest = &name[word.len()..];
    let on_boundary = rest.is_empty() || rest.starts_with(char::is_whitespace);
    (head.eq_ignore_ascii_case(word) && on_boundary).then_some(rest)
}

/// `name` without a trailing `word`, matched case-insensitively on a word boundary.
fn strip_suffix_ignore_case<'a>(name: &'a str, word: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(word.len())?;
    let tail = name.get(split..)?;
    let rest = &name[..split];
    let on_boundary = rest.is_empty() || rest.ends_with(char::is_whitespace);
    (tail.eq_ignore_ascii_case(word) && on_boundary).then_some(rest)
}

fn build_quick_spec(official: &RawDeviceSpecs, unofficial: &RawDeviceSpecs) -> Vec<SpecEntry> {
    let mut quick_spec = Vec::new();

    for entry in official.quick_spec.iter().chain(&unofficial.quick_spec) {
        upsert(&mut quick_spec, &entry.name, &entry.value);
    }

    if let Some(memory) = memory_value(&unofficial.detail_spec) {
        let variant = parse_variant(memory);
        if let Some(internal) = &variant.internal {
            upsert(&mut quick_spec, INTERNAL_STORAGE, internal);
        }
        if let Some(ram) = &variant.ram {
            upsert(&mut quick_spec, RAM_SIZE, ram);
        }
        if let (Some(internal), Some(ram)) = (&variant.internal, &variant.ram) {
            upsert(&mut quick_spec, RAM_STORAGE, &format!("{} / {}", ram, internal));
        }
    }

    let battery = parse_battery(&unofficial.detail_spec);
    if let Some(size) = &battery.size {
        upsert(&mut quick_spec, BATTERY_SIZE, size);
    }
    if let Some(battery_type) = &battery.battery_type {
        upsert(&mut quick_spec, BATTERY_TYPE, battery_type);
    }

    quick_spec
}

/// The storage line of the first "memory" category: the entry named like
/// "internal", otherwise the category's first entry.
fn memory_value(categories: &[SpecCategory]) -> Option<&str> {
    let memory = categories
        .iter()
        .find(|c| c.category.to_lowercase().contains("memory"))?;

    memory
        .specifications
        .iter()
        .find(|s| s.name.to_lowercase().contains("internal"))
        .or_else(|| memory.specifications.first())
        .map(|s| s.value.as_str())
}

/// Last write wins; an existing key keeps its position.
fn upsert(quick_spec: &mut Vec<SpecEntry>, name: &str, value: &str) {
    match quick_spec.iter_mut().find(|entry| entry.name == name) {
        Some(entry) => entry.value = value.to_string(),
        None => quick_spec.push(SpecEntry::new(name, value)),
    }
}
