//! Projection of a merged device onto the persisted row shape.
//!
//! Only whitelisted columns exist on [`UploadRow`]; anything else carried by a
//! [`MergedDevice`] (image, name, quickSpec) is dropped here.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{non_blank, ExistingRecord, MergedDevice, SpecCategory};
use crate::merger::RAM_STORAGE;

pub const DEFAULT_STATUS: &str = "draft";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadRow {
    pub nama_brand: String,
    pub nama_model: String,
    pub variant: Option<String>,
    pub kode_model: Option<String>,
    pub official_specs: Vec<SpecCategory>,
    pub unofficial_specs: Vec<SpecCategory>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadRow {
    /// Build the row to upsert for `merged`.
    ///
    /// A matching existing row keeps its creation time and model code; a new
    /// row is stamped with `now`.
    pub fn from_merged(
        merged: &MergedDevice,
        existing: Option<&ExistingRecord>,
        status: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            nama_brand: merged.brand.clone(),
            nama_model: merged.model.clone(),
            variant: merged.quick_spec_value(RAM_STORAGE).map(str::to_string),
            kode_model: non_blank(existing.and_then(|e| e.kode_model.as_deref())),
            official_specs: merged.official_specs.clone(),
            unofficial_specs: merged.unofficial_specs.clone(),
            status: status.to_string(),
            created_at: existing.and_then(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }

    /// Upsert key.
    pub fn key(&self) -> (&str, &str) {
        (&self.nama_brand, &self.nama_model)
    }
}

/// Destination for upserted rows. One failed write never aborts a batch.
pub trait UploadTarget {
    fn upload(&mut self, row: &UploadRow) -> Result<()>;
}

impl UploadTarget for Vec<UploadRow> {
    /// In-memory upsert by `(nama_brand, nama_model)`.
    fn upload(&mut self, row: &UploadRow) -> Result<()> {
        match self.iter_mut().find(|r| r.key() == row.key()) {
            Some(stored) => {
                let created_at = stored.created_at;
                *stored = row.clone();
                stored.created_at = created_at;
            }
            None => self.push(row.clone()),
        }
        Ok(())
    }
}
