// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Gitignore generation for freshly initialized repositories.
//!
//! Project types are detected from marker files at the top-level of a folder.
//! The generated gitignore holds a common block followed by one block per
//! detected project type.

use glob::Pattern;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::write,
    path::{Path, PathBuf},
};
use tracing::info;

/// Project type detected from marker files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProjectKind {
    Rust,
    Node,
    Python,
    Go,
    Java,
    DotNet,
}

impl ProjectKind {
    const ALL: [ProjectKind; 6] = [
        Self::Rust,
        Self::Node,
        Self::Python,
        Self::Go,
        Self::Java,
        Self::DotNet,
    ];

    /// Marker file patterns relative to project root.
    fn markers(&self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["Cargo.toml"],
            Self::Node => &["package.json"],
            Self::Python => &["pyproject.toml", "requirements.txt", "setup.py"],
            Self::Go => &["go.mod"],
            Self::Java => &["pom.xml", "build.gradle", "build.gradle.kts"],
            Self::DotNet => &["*.csproj", "*.sln"],
        }
    }

    /// Gitignore lines for project type.
    fn ignore_lines(&self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["/target/", "**/*.rs.bk"],
            Self::Node => &["node_modules/", "dist/", "npm-debug.log*", ".env"],
            Self::Python => &[
                "__pycache__/",
                "*.py[cod]",
                ".venv/",
                "venv/",
                "*.egg-info/",
                ".pytest_cache/",
            ],
            Self::Go => &["/bin/", "*.test", "*.out"],
            Self::Java => &["target/", "build/", ".gradle/", "*.class"],
            Self::DotNet => &["bin/", "obj/", "*.user"],
        }
    }
}

impl Display for ProjectKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Rust => "Rust",
            Self::Node => "Node",
            Self::Python => "Python",
            Self::Go => "Go",
            Self::Java => "Java",
            Self::DotNet => ".NET",
        })
    }
}

const COMMON_LINES: &[&str] = &[".DS_Store", "Thumbs.db", "*.swp", "*~", ".idea/", ".vscode/", "*.log"];

/// Detect project types of a folder by marker files.
pub fn detect(path: impl AsRef<Path>) -> Vec<ProjectKind> {
    let root = Pattern::escape(path.as_ref().to_string_lossy().as_ref());
    ProjectKind::ALL
        .into_iter()
        .filter(|kind| {
            kind.markers().iter().any(|marker| {
                glob::glob(&format!("{root}/{marker}"))
                    .map(|mut paths| paths.any(|path| path.is_ok()))
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// Render gitignore content for project types.
pub fn render(kinds: &[ProjectKind]) -> String {
    let mut out = String::from("# General\n");
    for line in COMMON_LINES {
        out.push_str(line);
        out.push('\n');
    }

    for kind in kinds {
        out.push_str(&format!("\n# {kind}\n"));
        for line in kind.ignore_lines() {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// Write gitignore for detected project types, unless one already exists.
///
/// Returns `true` if a gitignore was written.
///
/// # Errors
///
/// - Return [`GitignoreError`] if gitignore cannot be written.
pub fn write_if_missing(path: impl AsRef<Path>) -> Result<bool> {
    let target = path.as_ref().join(".gitignore");
    if target.exists() {
        return Ok(false);
    }

    let kinds = detect(path.as_ref());
    info!(
        "write .gitignore for {:?} with project types {:?}",
        path.as_ref().display(),
        kinds
    );
    write(&target, render(&kinds)).map_err(|err| GitignoreError {
        source: err,
        path: target,
    })?;

    Ok(true)
}

/// Gitignore cannot be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write gitignore at {:?}", path.display())]
pub struct GitignoreError {
    #[source]
    source: std::io::Error,
    path: PathBuf,
}

/// Friendly result alias :3
pub type Result<T, E = GitignoreError> = std::result::Result<T, E>;
