use serde::{Deserialize, Serialize};
use std::fmt;

use crate::handle::ResourceHandle;

/// `(kind, key)` identity of a handle within one loader
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct FileId {
    pub kind: String,
    pub key: String,
}

impl FileId {
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
        }
    }

    pub fn of(handle: &ResourceHandle) -> Self {
        Self::new(handle.kind(), handle.key())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

/// Outcome of a [`super::Loader::run`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub complete: Vec<FileId>,
    pub failed: Vec<FileId>,
    /// Left waiting on a partner that never finished
    pub stranded: Vec<FileId>,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.complete.len() + self.failed.len() + self.stranded.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.stranded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent {
    FileProgress { file: FileId, fraction: f64 },
    /// Transfer succeeded, decoding is next
    FileLoaded { file: FileId, bytes: u64 },
    FileComplete { file: FileId },
    FileFailed { file: FileId, reason: String },
    Complete(LoadSummary),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::new("image", "hero").to_string(), "image/hero");
    }

    #[test]
    fn test_summary_success() {
        let mut summary = LoadSummary {
            complete: vec![FileId::new("json", "level")],
            ..Default::default()
        };
        assert!(summary.is_success());
        assert_eq!(summary.total(), 1);

        summary.stranded.push(FileId::new("image", "atlas"));
        assert!(!summary.is_success());
        assert_eq!(summary.total(), 2);
    }
}
