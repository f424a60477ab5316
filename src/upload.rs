//! Upload batches and progress bookkeeping
//!
//! Files in a batch are sent one after another. Progress is tracked per
//! position in the batch (two selected files may share a name), and the
//! aggregate is the rounded mean of the per-file percentages.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::providers::DavBody;

/// Where the bytes of an upload come from
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Streamed from disk
    Path(PathBuf),
    /// Already in memory
    Bytes(Vec<u8>),
}

/// A file selected for upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Name the file gets in the target directory
    pub name: String,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            source: UploadSource::Path(path),
        }
    }

    pub fn from_bytes(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            source: UploadSource::Bytes(data),
        }
    }

    /// Content type guessed from the name, `application/octet-stream` otherwise
    pub fn content_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    pub(crate) fn body(&self) -> DavBody {
        match &self.source {
            UploadSource::Path(path) => DavBody::File(path.clone()),
            UploadSource::Bytes(data) => DavBody::Bytes(data.clone()),
        }
    }
}

/// Progress of one file in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProgress {
    pub index: usize,
    pub name: String,
    pub percent: u8,
}

/// Ordered per-file progress records of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    records: Vec<FileProgress>,
}

impl UploadBatch {
    pub fn new(files: &[UploadFile]) -> Self {
        let records = files
            .iter()
            .enumerate()
            .map(|(index, file)| FileProgress {
                index,
                name: file.name.clone(),
                percent: 0,
            })
            .collect();
        Self { records }
    }

    /// Record a tick for file `index`. Per-file progress never goes backwards.
    pub fn update(&mut self, index: usize, percent: u8) {
        if let Some(record) = self.records.get_mut(index) {
            record.percent = record.percent.max(percent.min(100));
        }
    }

    pub fn complete(&mut self, index: usize) {
        self.update(index, 100);
    }

    /// Rounded mean of the per-file percentages
    pub fn aggregate(&self) -> u8 {
        if self.records.is_empty() {
            return 100;
        }
        let sum: u32 = self.records.iter().map(|r| r.percent as u32).sum();
        (sum as f64 / self.records.len() as f64).round() as u8
    }

    pub fn records(&self) -> &[FileProgress] {
        &self.records
    }
}
