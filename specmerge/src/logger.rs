use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::RwLock;

use crate::batch::BatchSummary;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only progress bar and final summary
    Summary = 1,   // Per-batch milestones (default)
    Detailed = 2,  // Per-device results and absorbed failures
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

/// Console reporter for batch runs. Messages go through the progress bar when
/// one is active so they don't tear it.
#[derive(Clone)]
pub struct BatchLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    metadata: Arc<Mutex<BatchMetadata>>,
}

#[derive(Default, Clone)]
struct BatchMetadata {
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    devices_merged: usize,
    devices_failed: usize,
    upload_failures: usize,
    output_file: String,
}

impl BatchLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            metadata: Arc::new(Mutex::new(BatchMetadata::default())),
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn with_metadata(&self, f: impl FnOnce(&mut BatchMetadata)) {
        let mut metadata = self.metadata.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut metadata);
    }

    pub async fn start_progress(&self, total_devices: u64) {
        let pb = ProgressBar::new(total_devices);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Merging...");

        *self.progress_bar.write().await = Some(pb);
        self.with_metadata(|m| m.start_time = Some(SystemTime::now()));
    }

    pub async fn advance_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
            pb.inc(1);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        if let Some(pb) = self.progress_bar.write().await.take() {
            pb.finish_and_clear();
        }
        self.with_metadata(|m| m.end_time = Some(SystemTime::now()));
        self.info(final_message);
    }

    pub fn log_batch_start(&self, device_count: usize, concurrency: usize) {
        self.info(&format!("Merging {} devices ({} concurrent)", device_count, concurrency));
    }

    pub fn log_device_merged(&self, label: &str, image: Option<&str>) {
        self.with_metadata(|m| m.devices_merged += 1);
        self.debug(&format!("Merged {} (image: {})", label, image.unwrap_or("none")));
    }

    pub fn log_device_failed(&self, label: &str, error: &str) {
        self.with_metadata(|m| m.devices_failed += 1);
        self.warn(&format!("Merge failed for {}: {}", label, error));
    }

    pub fn log_upload_failed(&self, label: &str, error: &str) {
        self.with_metadata(|m| m.upload_failures += 1);
        self.warn(&format!("Upload failed for {}, skipping: {}", label, error));
    }

    pub fn record_output_file(&self, path: &str) {
        self.with_metadata(|m| m.output_file = path.to_string());
        self.info(&format!("Rows written to {}", path));
    }

    /// Printed regardless of verbosity.
    pub fn print_final_summary(&self, summary: &BatchSummary) {
        let metadata = self.metadata.lock().unwrap_or_else(|e| e.into_inner()).clone();

        println!("\n=== BATCH SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            let duration = end.duration_since(start).unwrap_or_default();
            println!("Duration: {:.2}s", duration.as_secs_f64());
        }
        println!("Devices: {}", summary.total_devices);
        println!("Merged: {}", metadata.devices_merged);
        println!("Failed: {}", metadata.devices_failed);
        println!("Upload failures: {}", metadata.upload_failures);
        if !metadata.output_file.is_empty() {
            println!("Output: {}", metadata.output_file);
        }
        println!("=====================\n");

        for result in summary.device_results.iter().filter(|r| r.error.is_some()) {
            println!("   - {}: {}", result.label, result.error.as_deref().unwrap_or("Unknown error"));
        }
    }
}
