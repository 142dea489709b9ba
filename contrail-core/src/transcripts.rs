//! Pending transcript discovery.
//!
//! Transcripts are opaque files dropped into the context working tree by an
//! external capture agent. "Pending" means anything git reports as changed
//! (modified, added, deleted or untracked, recursively) whose extension is a
//! configured transcript extension.

use std::path::PathBuf;

use crate::error::CoreError;
use crate::repo::RepositoryHandle;

/// Which files count as transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFilter {
    extensions: Vec<String>,
}

impl TranscriptFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

impl Default for TranscriptFilter {
    fn default() -> Self {
        Self::new(["jsonl"])
    }
}

/// Transcript paths (relative to the context root) not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTranscriptSet {
    pub paths: Vec<PathBuf>,
}

impl PendingTranscriptSet {
    pub fn scan<R: RepositoryHandle + ?Sized>(
        repo: &R,
        filter: &TranscriptFilter,
    ) -> Result<Self, CoreError> {
        let mut paths: Vec<PathBuf> = repo
            .status()?
            .into_iter()
            .map(|entry| entry.path)
            .filter(|path| filter.matches(path))
            .collect();
        paths.sort();
        paths.dedup();
        Ok(Self { paths })
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}
