// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Disk usage assessment of a directory tree.
//!
//! Walks a root directory without any ignore filters, and without following
//! symbolic links. Usage is aggregated per immediate child of the root, with
//! files sitting directly in the root grouped under `"."`. The largest files
//! over a size threshold and every git repository found along the way are
//! collected as well.
//!
//! Entries that cannot be read are counted and logged, but never abort the
//! walk.

use ignore::WalkBuilder;
use indicatif::HumanBytes;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::Write as FmtWrite,
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Name used for files directly inside root.
pub const ROOT_CHILD: &str = ".";

/// Knobs for an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessOptions {
    /// Minimum size of a file to be listed as large.
    pub threshold_bytes: u64,

    /// Maximum number of large files to list.
    pub top: usize,
}

impl AssessOptions {
    /// Options with threshold given in mebibytes.
    ///
    /// Oversized thresholds saturate at `u64::MAX` bytes.
    pub fn with_threshold_mb(threshold_mb: u64, top: usize) -> Self {
        Self {
            threshold_bytes: threshold_mb.saturating_mul(1024 * 1024),
            top,
        }
    }
}

impl Default for AssessOptions {
    fn default() -> Self {
        Self::with_threshold_mb(100, 25)
    }
}

/// Usage of an immediate child of root.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ChildUsage {
    pub child: String,
    pub bytes: u64,
    pub files: u64,
    pub dirs: u64,
}

/// File over the size threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Result of walking a root directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub root: PathBuf,

    /// Usage per child, sorted by child name.
    pub children: Vec<ChildUsage>,

    /// Largest files, biggest first.
    pub large_files: Vec<LargeFile>,

    /// Git repositories, sorted.
    pub repos: Vec<PathBuf>,

    /// Number of entries that could not be read.
    pub unreadable: u64,
}

/// Walk root directory and assess its usage.
///
/// # Errors
///
/// - Return [`AssessError::NotADirectory`] if root is not a directory.
#[instrument(skip(root, options), level = "debug")]
pub fn assess(root: impl AsRef<Path>, options: &AssessOptions) -> Result<Assessment> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(AssessError::NotADirectory(root.to_path_buf()));
    }

    let mut children: BTreeMap<String, ChildUsage> = BTreeMap::new();
    let mut large_files = Vec::new();
    let mut repos = Vec::new();
    let mut unreadable = 0;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("skip unreadable entry: {error}");
                unreadable += 1;
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let path = entry.path();
        let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
        let key = child_key(root, path, is_dir && entry.depth() == 1);
        let usage = children.entry(key.clone()).or_insert_with(|| ChildUsage {
            child: key,
            ..Default::default()
        });

        if is_dir {
            if entry.depth() > 1 {
                usage.dirs += 1;
            }
            if entry.file_name() == ".git" {
                if let Some(parent) = path.parent() {
                    repos.push(parent.to_path_buf());
                }
            }
            continue;
        }

        let bytes = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(error) => {
                warn!("skip unreadable file {:?}: {error}", path.display());
                unreadable += 1;
                continue;
            }
        };
        usage.files += 1;
        usage.bytes += bytes;

        if bytes >= options.threshold_bytes {
            large_files.push(LargeFile {
                path: path.to_path_buf(),
                bytes,
            });
        }
    }

    large_files.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.path.cmp(&b.path)));
    large_files.truncate(options.top);
    repos.sort();

    info!(
        "assessed {} child(ren) of {:?}, {unreadable} unreadable",
        children.len(),
        root.display()
    );

    Ok(Assessment {
        root: root.to_path_buf(),
        children: children.into_values().collect(),
        large_files,
        repos,
        unreadable,
    })
}

fn child_key(root: &Path, path: &Path, top_level_dir: bool) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), Some(_)) => name.to_string_lossy().into_owned(),
        (Some(Component::Normal(name)), None) if top_level_dir => {
            name.to_string_lossy().into_owned()
        }
        _ => ROOT_CHILD.into(),
    }
}

impl Assessment {
    /// Total bytes of every file found.
    pub fn total_bytes(&self) -> u64 {
        self.children.iter().map(|child| child.bytes).sum()
    }

    /// Render human readable report.
    pub fn render_text(&self) -> String {
        // INVARIANT: Writing into a string never fails.
        let mut text = String::new();
        let _ = writeln!(text, "Assessment of {}", self.root.display());
        let _ = writeln!(text, "Total size: {}", HumanBytes(self.total_bytes()));
        let _ = writeln!(text, "Unreadable entries: {}", self.unreadable);

        let _ = writeln!(text, "\nUsage per child:");
        for child in &self.children {
            let _ = writeln!(
                text,
                "  {:<40} {:>12} {:>8} files {:>6} dirs",
                child.child,
                HumanBytes(child.bytes).to_string(),
                child.files,
                child.dirs
            );
        }

        let _ = writeln!(text, "\nLargest files:");
        if self.large_files.is_empty() {
            let _ = writeln!(text, "  none");
        }
        for file in &self.large_files {
            let _ = writeln!(
                text,
                "  {:>12}  {}",
                HumanBytes(file.bytes).to_string(),
                file.path.display()
            );
        }

        let _ = writeln!(text, "\nGit repositories:");
        if self.repos.is_empty() {
            let _ = writeln!(text, "  none");
        }
        for repo in &self.repos {
            let _ = writeln!(text, "  {}", repo.display());
        }

        text
    }

    /// Write per child usage as CSV.
    ///
    /// # Errors
    ///
    /// - Return [`AssessError::Csv`] if rows cannot be written.
    pub fn write_csv(&self, writer: impl Write) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for child in &self.children {
            writer.serialize(child)?;
        }
        writer.flush().map_err(|err| AssessError::Write {
            source: err,
            path: "<csv>".into(),
        })?;

        Ok(())
    }

    /// Write text and CSV artifacts into output directory.
    ///
    /// Artifacts are named `assessment_<stamp>.txt` and
    /// `assessment_<stamp>.csv`. Returns both paths.
    ///
    /// # Errors
    ///
    /// - Return [`AssessError::Write`] if artifacts cannot be written.
    /// - Return [`AssessError::Csv`] if CSV rows cannot be serialized.
    #[instrument(skip(self, output_dir), level = "debug")]
    pub fn write_reports(
        &self,
        output_dir: impl AsRef<Path>,
        stamp: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        let output_dir = output_dir.as_ref();
        mkdirp::mkdirp(output_dir).map_err(|err| AssessError::Write {
            source: err,
            path: output_dir.display().to_string(),
        })?;

        let text_path = output_dir.join(format!("assessment_{stamp}.txt"));
        std::fs::write(&text_path, self.render_text()).map_err(|err| AssessError::Write {
            source: err,
            path: text_path.display().to_string(),
        })?;

        let csv_path = output_dir.join(format!("assessment_{stamp}.csv"));
        let file = File::create(&csv_path).map_err(|err| AssessError::Write {
            source: err,
            path: csv_path.display().to_string(),
        })?;
        self.write_csv(file)?;
        info!("wrote {:?} and {:?}", text_path.display(), csv_path.display());

        Ok((text_path, csv_path))
    }
}

/// Assessment error types.
#[derive(Debug, thiserror::Error)]
pub enum AssessError {
    /// Root is not a directory.
    #[error("{:?} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Artifact cannot be written.
    #[error("failed to write {path:?}")]
    Write {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// CSV rows cannot be serialized.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Friendly result alias :3
pub type Result<T, E = AssessError> = std::result::Result<T, E>;
