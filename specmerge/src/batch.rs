//! Batch merging of many devices from a JSON job file
//!
//! Supports:
//! - A JSON array of jobs, or an object with a "devices" array
//! - Jobs of the form `{brand?, model?, label?, official?, unofficial?, existing?}`
//! - Concurrent merges sharing one image selector (and its probe cache)
//! - Error resilience (a failed merge or upload never stops the batch)

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::device::{non_blank, DeviceIdentity, ExistingRecord, MergedDevice, RawDeviceSpecs};
use crate::logger::BatchLogger;
use crate::merger::{MergeError, SpecMerger};
use crate::upload::{UploadRow, UploadTarget, DEFAULT_STATUS};

/// One device to merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchJob {
    /// Free-form identifier used in logs and the summary
    pub label: Option<String>,
    pub identity: DeviceIdentity,
    pub official: RawDeviceSpecs,
    pub unofficial: RawDeviceSpecs,
    pub existing: Option<ExistingRecord>,
}

impl BatchJob {
    /// Best human-readable name for this job.
    pub fn display_name(&self, index: usize) -> String {
        non_blank(self.label.as_deref())
            .or_else(|| match (&self.identity.brand, &self.identity.model) {
                (Some(brand), Some(model)) => Some(format!("{} {}", brand, model)),
                _ => None,
            })
            .or_else(|| non_blank(self.unofficial.name.as_deref()))
            .or_else(|| non_blank(self.official.name.as_deref()))
            .unwrap_or_else(|| format!("device #{}", index + 1))
    }
}

/// What happened to one device.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcome {
    /// Merged and written to the upload target
    Uploaded,
    /// Merged; no upload target configured
    Merged,
    /// Merged, but the upload target rejected the row
    UploadFailed,
    /// No brand/model could be established
    MergeFailed,
}

/// Result of merging a single device in a batch
#[derive(Debug, Clone, Serialize)]
pub struct DeviceMergeResult {
    /// Position in the input file
    pub index: usize,
    pub label: String,
    pub outcome: DeviceOutcome,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub image: Option<String>,
    pub variant: Option<String>,
    pub error: Option<String>,
    pub duration_secs: f64,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total_devices: usize,
    pub merged: usize,
    pub failed: usize,
    pub upload_failures: usize,
    /// Per-device results in input order
    pub device_results: Vec<DeviceMergeResult>,
    pub total_duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Knobs for [`run_batch`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    /// `status` column for new and updated rows
    pub status: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            status: DEFAULT_STATUS.to_string(),
        }
    }
}

/// Parse a job file.
pub fn parse_job_file(path: &Path) -> Result<Vec<BatchJob>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    parse_json_jobs(&content)
        .with_context(|| format!("Invalid job file: {}", path.display()))
}

/// Parse jobs from JSON content
///
/// Supports two layouts:
/// 1. Array of jobs: `[{"official": {...}, "unofficial": {...}}]`
/// 2. Object with "devices" array: `{"devices": [...]}`
pub fn parse_json_jobs(content: &str) -> Result<Vec<BatchJob>> {
    let value: Value = serde_json::from_str(content).context("Failed to parse JSON content")?;

    match &value {
        Value::Array(arr) => Ok(parse_json_array(arr)),
        Value::Object(obj) => match obj.get("devices") {
            Some(Value::Array(arr)) => Ok(parse_json_array(arr)),
            Some(_) => bail!("'devices' field must be an array"),
            None => bail!("JSON object must have a 'devices' array field"),
        },
        _ => bail!("JSON must be an array of jobs or an object with a 'devices' field"),
    }
}

/// Non-object elements are skipped.
fn parse_json_array(arr: &[Value]) -> Vec<BatchJob> {
    arr.iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let text = |key: &str| obj.get(key).and_then(Value::as_str).and_then(|s| non_blank(Some(s)));
            let raw = |key: &str| obj.get(key).map(RawDeviceSpecs::from_value).unwrap_or_default();

            BatchJob {
                label: text("label"),
                identity: DeviceIdentity {
                    brand: text("brand"),
                    model: text("model"),
                },
                official: raw("official"),
                unofficial: raw("unofficial"),
                existing: obj.get("existing").and_then(parse_existing),
            }
        })
        .collect()
}

fn parse_existing(value: &Value) -> Option<ExistingRecord> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(existing) => Some(existing),
        Err(e) => {
            warn!("Ignoring malformed existing record: {}", e);
            None
        }
    }
}

/// Merge every job and hand successful rows to `target`.
///
/// Merges run concurrently (at most `options.concurrency` at once); uploads are
/// applied one at a time as merges complete. Neither a failed merge nor a
/// failed upload stops the batch.
pub async fn run_batch(
    jobs: Vec<BatchJob>,
    merger: &SpecMerger,
    options: &BatchOptions,
    mut target: Option<&mut dyn UploadTarget>,
    logger: &BatchLogger,
) -> BatchSummary {
    let mut summary = new_batch_summary();
    let batch_start = Instant::now();
    let concurrency = options.concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    logger.log_batch_start(jobs.len(), concurrency);
    logger.start_progress(jobs.len() as u64).await;

    let mut merges = stream::iter(jobs.into_iter().enumerate().map(|(index, job)| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await;
            let device_start = Instant::now();
            let result = merger
                .merge_specs(job.existing.as_ref(), &job.official, &job.unofficial, &job.identity)
                .await;
            (index, job, result, device_start)
        }
    }))
    .buffer_unordered(concurrency);

    while let Some((index, job, result, device_start)) = merges.next().await {
        let label = job.display_name(index);
        let device_result = match result {
            Ok(merged) => {
                logger.log_device_merged(&label, merged.img.as_deref());
                let row = UploadRow::from_merged(&merged, job.existing.as_ref(), &options.status, Utc::now());
                let (outcome, error) = match target.as_deref_mut() {
                    Some(target) => upload_row(target, &row, &label, logger),
                    None => (DeviceOutcome::Merged, None),
                };
                merged_result(index, label, &merged, row.variant, outcome, error, device_start)
            }
            Err(e) => failed_result(index, label, &e, logger, device_start),
        };
        logger.advance_progress(&device_result.label).await;
        summary.device_results.push(device_result);
    }

    summary.device_results.sort_by_key(|r| r.index);
    summary.total_duration_secs = batch_start.elapsed().as_secs_f64();
    finalize_batch_summary(&mut summary);

    logger
        .finish_progress(&format!(
            "Batch complete: {} merged, {} failed, {} upload failures",
            summary.merged, summary.failed, summary.upload_failures
        ))
        .await;

    summary
}

fn upload_row(
    target: &mut dyn UploadTarget,
    row: &UploadRow,
    label: &str,
    logger: &BatchLogger,
) -> (DeviceOutcome, Option<String>) {
    match target.upload(row) {
        Ok(()) => (DeviceOutcome::Uploaded, None),
        Err(e) => {
            warn!("Upload failed for {}: {:#}", label, e);
            logger.log_upload_failed(label, &format!("{:#}", e));
            (DeviceOutcome::UploadFailed, Some(format!("upload failed: {:#}", e)))
        }
    }
}

fn merged_result(
    index: usize,
    label: String,
    merged: &MergedDevice,
    variant: Option<String>,
    outcome: DeviceOutcome,
    error: Option<String>,
    started: Instant,
) -> DeviceMergeResult {
    DeviceMergeResult {
        index,
        label,
        outcome,
        brand: Some(merged.brand.clone()),
        model: Some(merged.model.clone()),
        image: merged.img.clone(),
        variant,
        error,
        duration_secs: started.elapsed().as_secs_f64(),
    }
}

fn failed_result(
    index: usize,
    label: String,
    error: &MergeError,
    logger: &BatchLogger,
    started: Instant,
) -> DeviceMergeResult {
    debug!("Merge failed for {}: {}", label, error);
    logger.log_device_failed(&label, &error.to_string());

    let MergeError::MissingIdentity { brand, model, .. } = error;
    DeviceMergeResult {
        index,
        label,
        outcome: DeviceOutcome::MergeFailed,
        brand: brand.clone(),
        model: model.clone(),
        image: None,
        variant: None,
        error: Some(error.to_string()),
        duration_secs: started.elapsed().as_secs_f64(),
    }
}

/// Export batch summary to a pretty-printed JSON file
pub fn export_batch_summary(summary: &BatchSummary, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize batch summary")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write batch summary to: {}", output_path.display()))?;

    Ok(())
}

pub fn new_batch_summary() -> BatchSummary {
    BatchSummary {
        total_devices: 0,
        merged: 0,
        failed: 0,
        upload_failures: 0,
        device_results: Vec::new(),
        total_duration_secs: 0.0,
        started_at: Utc::now(),
        completed_at: None,
    }
}

/// Recompute the counters from the per-device results and stamp the end time.
pub fn finalize_batch_summary(summary: &mut BatchSummary) {
    let results = &summary.device_results;
    let count = |outcome: DeviceOutcome| results.iter().filter(|r| r.outcome == outcome).count();
    let (total, failed, upload_failures) = (
        results.len(),
        count(DeviceOutcome::MergeFailed),
        count(DeviceOutcome::UploadFailed),
    );

    summary.total_devices = total;
    summary.failed = failed;
    summary.upload_failures = upload_failures;
    summary.merged = total - failed;
    summary.completed_at = Some(Utc::now());
}
