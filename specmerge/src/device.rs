use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single name/value pair from a scraped spec sheet. The value is free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpecEntry {
    pub name: String,
    pub value: String,
}

impl SpecEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A topical group of specifications, e.g. "Battery" or "Memory".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SpecCategory {
    pub category: String,
    #[serde(default)]
    pub specifications: Vec<SpecEntry>,
}

impl SpecCategory {
    pub fn new(category: impl Into<String>, specifications: Vec<SpecEntry>) -> Self {
        Self {
            category: category.into(),
            specifications,
        }
    }
}

/// Output of one scraping collaborator. Every field may be missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RawDeviceSpecs {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default, rename = "detailSpec")]
    pub detail_spec: Vec<SpecCategory>,
    #[serde(default, rename = "quickSpec")]
    pub quick_spec: Vec<SpecEntry>,
}

/// Caller-supplied brand/model pair. Blank strings count as absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DeviceIdentity {
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            model: Some(model.into()),
        }
    }
}

/// A row previously stored by the upload collaborator for the same device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExistingRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "nama_brand")]
    pub brand: Option<String>,
    #[serde(default, alias = "nama_model")]
    pub model: Option<String>,
    #[serde(default)]
    pub kode_model: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// The reconciled record handed to the upload collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergedDevice {
    pub brand: String,
    pub model: String,
    pub name: Option<String>,
    pub img: Option<String>,
    #[serde(rename = "quickSpec")]
    pub quick_spec: Vec<SpecEntry>,
    pub official_specs: Vec<SpecCategory>,
    pub unofficial_specs: Vec<SpecCategory>,
}

impl MergedDevice {
    /// Look up a quickSpec value by exact name.
    pub fn quick_spec_value(&self, name: &str) -> Option<&str> {
        self.quick_spec
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value.as_str())
    }
}

/// Trim a string and drop it if nothing is left.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
