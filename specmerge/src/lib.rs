pub mod batch;
pub mod cli;
pub mod config;
pub mod device;
pub mod image_selector;
pub mod logger;
pub mod merger;
pub mod raw;
pub mod result_sink;
pub mod spec_parser;
pub mod upload;

pub use device::{DeviceIdentity, ExistingRecord, MergedDevice, RawDeviceSpecs, SpecCategory, SpecEntry};
pub use image_selector::{ImageSelector, ImageSelectorOptions};
pub use merger::{MergeError, SpecMerger};
pub use upload::UploadRow;
