//! Batch domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the object that marks a batch upload as complete
pub const MANIFEST_FILE: &str = "manifest.json";

/// Ingest mode of a batch
///
/// Bulk batches are full reloads, delta batches are incremental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    Bulk,
    Delta,
}

impl IngestMode {
    /// Job-name fragment for this mode (`bulk` or `delta`)
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Bulk => "bulk",
            IngestMode::Delta => "delta",
        }
    }

    /// Maps a marker file stem (`bulk.txt` -> `bulk`) to a mode
    ///
    /// Uploaders label incremental batches either `delta` or `incremental`.
    pub fn from_marker(stem: &str) -> Option<Self> {
        match stem {
            "bulk" => Some(IngestMode::Bulk),
            "delta" | "incremental" => Some(IngestMode::Delta),
            _ => None,
        }
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of ingest work discovered in the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Timestamp folder name, e.g. `20240601T0000`
    pub name: String,

    /// Full folder key including the listing prefix and trailing slash
    pub folder: String,

    pub mode: IngestMode,

    /// Object keys captured at discovery time
    pub files: Vec<String>,
}

impl Batch {
    /// Creates a batch living under `prefix`
    pub fn new(prefix: &str, name: impl Into<String>, mode: IngestMode, files: Vec<String>) -> Self {
        let name = name.into();
        let folder = format!("{}{}/", prefix, name);
        Self {
            name,
            folder,
            mode,
            files,
        }
    }

    /// Key of the manifest object that gates this batch
    pub fn manifest_key(&self) -> String {
        format!("{}{}", self.folder, MANIFEST_FILE)
    }
}

/// Checks whether a folder name is a batch timestamp
///
/// Accepted shapes are plain digits (`1532355830`) or digits, a single
/// `T` separator, then digits (`20240601T0000`).
pub fn is_timestamp_name(name: &str) -> bool {
    let mut parts = name.splitn(2, 'T');
    let date = parts.next().unwrap_or_default();
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match parts.next() {
        Some(time) => all_digits(date) && all_digits(time),
        None => all_digits(date),
    }
}
