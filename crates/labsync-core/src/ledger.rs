//! Persisted ledger of order ids confirmed accepted by the telemetry
//! service.
//!
//! Newline-delimited UTF-8 text, one id per line, append-only across
//! runs. The file is not lock-protected: a single live pipeline instance
//! is assumed.

use labsync_common::Result;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The already-synced ledger file.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the set of already-confirmed order ids.
    ///
    /// A missing ledger file is an empty set (first run); any other IO
    /// failure is an error.
    pub fn load(&self) -> Result<HashSet<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        let ids: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = ids.len(), path = %self.path.display(), "loaded ledger");
        Ok(ids)
    }

    /// Append newly confirmed ids, preserving all prior contents.
    ///
    /// The first id written to a fresh ledger gets no leading newline;
    /// every subsequent id is newline-separated. Ids are never removed
    /// or compacted.
    pub fn append(&self, ids: &[String]) -> Result<()> {
        let mut contents = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        for id in ids {
            if !contents.is_empty() && !contents.ends_with('\n') {
                contents.push('\n');
            }
            contents.push_str(id);
        }

        fs::write(&self.path, contents)?;
        debug!(count = ids.len(), path = %self.path.display(), "appended to ledger");
        Ok(())
    }
}
