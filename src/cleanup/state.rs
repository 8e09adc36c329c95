// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Resumable cleanup state.
//!
//! The wizard records the outcome of every folder it visits, and flushes the
//! whole state to disk after each folder. Two files are kept side by side in
//! the state directory:
//!
//! - `cleanup_state.json`: map of absolute folder path to
//!   `{status, category, timestamp}`. Category is `null` for folders that
//!   could not be inspected.
//! - `cleanup_categories.txt`: flat `path|category` listing, one line per
//!   recorded folder, sorted by path.
//!
//! Both files are replaced atomically through a temporary sibling file, so an
//! interrupted run never leaves a half-written state behind.

use crate::cleanup::classify::Category;

use chrono::{DateTime, Utc};
use mkdirp::mkdirp;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, remove_file, rename, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

const STATE_FILE: &str = "cleanup_state.json";
const LISTING_FILE: &str = "cleanup_categories.txt";

/// Outcome of a visited folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Completed,
    Skipped,
    Failed,
    Deleted,
}

impl Display for FolderStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.pad(match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        })
    }
}

/// Recorded outcome of a single folder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FolderRecord {
    pub status: FolderStatus,
    #[serde(default)]
    pub category: Option<Category>,
    pub timestamp: DateTime<Utc>,
}

/// In-memory cleanup state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CleanupState {
    folders: BTreeMap<PathBuf, FolderRecord>,
}

impl CleanupState {
    /// Record outcome of folder, stamped with current time.
    pub fn record(
        &mut self,
        path: impl Into<PathBuf>,
        status: FolderStatus,
        category: impl Into<Option<Category>>,
    ) {
        self.folders.insert(
            path.into(),
            FolderRecord {
                status,
                category: category.into(),
                timestamp: Utc::now(),
            },
        );
    }

    /// Lookup record of folder.
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&FolderRecord> {
        self.folders.get(path.as_ref())
    }

    /// Check if folder needs no further visits.
    ///
    /// Completed, skipped, and deleted folders are settled. Failed folders
    /// are settled unless the caller wants to retry them.
    pub fn is_settled(&self, path: impl AsRef<Path>, retry_failed: bool) -> bool {
        match self.get(path).map(|record| record.status) {
            None => false,
            Some(FolderStatus::Failed) => !retry_failed,
            Some(_) => true,
        }
    }

    /// Iterate over records, optionally limited to folders below a root.
    pub fn records<'a>(
        &'a self,
        root: Option<&'a Path>,
    ) -> impl Iterator<Item = (&'a PathBuf, &'a FolderRecord)> + 'a {
        self.folders
            .iter()
            .filter(move |(path, _)| root.is_none_or(|root| path.starts_with(root)))
    }

    /// Count records by status and category.
    pub fn summary(&self, root: Option<&Path>) -> StateSummary {
        let mut summary = StateSummary::default();
        for (_, record) in self.records(root) {
            *summary.by_status.entry(record.status).or_default() += 1;
            if let Some(category) = record.category {
                *summary.by_category.entry(category).or_default() += 1;
            }
            summary.total += 1;
        }
        summary
    }

    /// Render flat `path|category` listing.
    pub fn category_listing(&self) -> String {
        let mut out = String::new();
        for (path, record) in &self.folders {
            match record.category {
                Some(category) => out.push_str(&format!("{}|{category}\n", path.display())),
                None => out.push_str(&format!("{}|unclassified\n", path.display())),
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Counts of recorded outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSummary {
    pub total: usize,
    pub by_status: BTreeMap<FolderStatus, usize>,
    pub by_category: BTreeMap<Category, usize>,
}

impl Display for StateSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "{} folder(s) recorded", self.total)?;
        for (status, count) in &self.by_status {
            writeln!(fmt, "  {status:<22} {count}")?;
        }
        for (category, count) in &self.by_category {
            writeln!(fmt, "  {category:<22} {count}")?;
        }
        Ok(())
    }
}

/// Persist cleanup state into a state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    state_dir: PathBuf,
}

impl StateStore {
    /// Construct new state store rooted at a directory.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Path to JSON state file.
    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Path to flat category listing.
    pub fn listing_path(&self) -> PathBuf {
        self.state_dir.join(LISTING_FILE)
    }

    /// Load previously saved state, or empty state if none exists.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if state file cannot be read.
    /// - Return [`StateError::Json`] if state file is corrupt.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self) -> Result<CleanupState> {
        let path = self.state_path();
        if !path.exists() {
            debug!("no previous state at {:?}", path.display());
            return Ok(CleanupState::default());
        }

        let content = read_to_string(&path).map_err(|err| StateError::Read {
            source: err,
            path: path.clone(),
        })?;
        serde_json::from_str(&content).map_err(|err| StateError::Json { source: err, path })
    }

    /// Flush state to both state files.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Write`] if state files cannot be written.
    /// - Return [`StateError::Json`] if state cannot be serialized.
    pub fn save(&self, state: &CleanupState) -> Result<()> {
        mkdirp(&self.state_dir).map_err(|err| StateError::Write {
            source: err,
            path: self.state_dir.clone(),
        })?;

        let json = serde_json::to_string_pretty(state).map_err(|err| StateError::Json {
            source: err,
            path: self.state_path(),
        })?;
        write_atomic(&self.state_path(), &json)?;
        write_atomic(&self.listing_path(), &state.category_listing())?;

        Ok(())
    }

    /// Discard saved state.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Write`] if state files cannot be removed.
    pub fn reset(&self) -> Result<()> {
        for path in [self.state_path(), self.listing_path()] {
            if path.exists() {
                remove_file(&path).map_err(|err| StateError::Write { source: err, path })?;
            }
        }

        Ok(())
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    write(&tmp, content).map_err(|err| StateError::Write {
        source: err,
        path: tmp.clone(),
    })?;
    rename(&tmp, path).map_err(|err| StateError::Write {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Cleanup state error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// State file cannot be read.
    #[error("failed to read cleanup state at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file cannot be written.
    #[error("failed to write cleanup state at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State cannot be (de)serialized.
    #[error("malformed cleanup state at {:?}", path.display())]
    Json {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StateError> = std::result::Result<T, E>;
