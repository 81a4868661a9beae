// result_sink.rs - File-backed upload target using zstd-compressed JSONL
//
// Each merged device is appended as one UploadRow per line, compressed with
// zstd level 3 and flushed every 50 rows so an interrupted batch still leaves
// a readable prefix behind.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::upload::{UploadRow, UploadTarget};

const FLUSH_INTERVAL: usize = 50;
const ZSTD_LEVEL: i32 = 3;

pub struct ResultSink {
    writer: zstd::stream::write::Encoder<'static, BufWriter<File>>,
    path: PathBuf,
    unflushed: usize,
}

impl ResultSink {
    /// Create a sink writing to `path`, creating parent directories as needed.
    pub fn with_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create result sink file: {}", path.display()))?;
        let encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)
            .context("Failed to create zstd encoder")?;

        Ok(Self {
            writer: encoder,
            path: path.to_path_buf(),
            unflushed: 0,
        })
    }

    /// Append a single row.
    pub fn append_one(&mut self, row: &UploadRow) -> Result<()> {
        let json = serde_json::to_string(row).context("Failed to serialize UploadRow")?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.unflushed += 1;

        if self.unflushed >= FLUSH_INTERVAL {
            self.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush zstd encoder")?;
        self.unflushed = 0;
        Ok(())
    }

    /// Finish the zstd frame without reading anything back.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.flush()?;
        self.writer.finish().context("Failed to finalize zstd stream")?;
        Ok(self.path)
    }

    /// Finish the stream and read every row back. Consumes the sink.
    pub fn drain_all(self) -> Result<Vec<UploadRow>> {
        let path = self.finish()?;
        Self::read_results(&path)
    }

    /// Read rows from a zstd-compressed JSONL file.
    /// Corrupt lines are skipped; a truncated frame ends the read.
    pub fn read_results(path: &Path) -> Result<Vec<UploadRow>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open result file: {}", path.display()))?;
        let decoder = zstd::stream::read::Decoder::new(file).context("Failed to create zstd decoder")?;
        let reader = BufReader::new(decoder);

        let mut rows = Vec::new();
        let mut errors = 0;

        for (line_num, line_result) in reader.lines().enumerate() {
            let Ok(line) = line_result else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UploadRow>(&line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    errors += 1;
                    if errors <= 3 {
                        warn!("Skipping corrupt line {} in {}: {}", line_num + 1, path.display(), e);
                    }
                }
            }
        }

        if errors > 3 {
            warn!("{} total corrupt lines skipped in {}", errors, path.display());
        }

        Ok(rows)
    }
}

impl UploadTarget for ResultSink {
    fn upload(&mut self, row: &UploadRow) -> Result<()> {
        self.append_one(row)
    }
}
