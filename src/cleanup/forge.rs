// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Hosted repository operations.
//!
//! Creating and forking repositories on GitHub has no libgit2 counterpart,
//! so these operations go through the GitHub CLI behind the [`Forge`] trait.

use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
};
use tracing::{info, instrument};

/// Layer of indirection for hosted repository operations.
pub trait Forge {
    /// Create a private repository `owner/name` from local repository at
    /// `path`, add it as "origin", and push current branch.
    fn create_repo(&self, path: &Path, owner: &str, name: &str) -> Result<()>;

    /// Fork the upstream of local repository at `path` into the operator's
    /// account. The fork becomes "origin", the original remote "upstream".
    fn fork(&self, path: &Path) -> Result<()>;
}

/// Forge operations through the GitHub CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct GhForge;

impl Forge for GhForge {
    #[instrument(skip(self, path), level = "debug")]
    fn create_repo(&self, path: &Path, owner: &str, name: &str) -> Result<()> {
        info!("create private repository {owner}/{name}");
        let output = syscall_non_interactive(
            "gh",
            [
                OsStr::new("repo"),
                OsStr::new("create"),
                OsStr::new(&format!("{owner}/{name}")),
                OsStr::new("--private"),
                OsStr::new("--source"),
                path.as_os_str(),
                OsStr::new("--remote"),
                OsStr::new("origin"),
                OsStr::new("--push"),
            ],
            path,
        )?;
        info!("{output}");

        Ok(())
    }

    #[instrument(skip(self, path), level = "debug")]
    fn fork(&self, path: &Path) -> Result<()> {
        info!("fork {:?}", path.display());
        let output = syscall_non_interactive(
            "gh",
            ["repo", "fork", "--remote", "--remote-name", "origin"],
            path,
        )?;
        info!("{output}");

        Ok(())
    }
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: &Path,
) -> Result<String> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .current_dir(cwd)
        .output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(ForgeError::Failed {
            command: cmd.as_ref().to_string_lossy().into_owned(),
            message,
        });
    }

    Ok(message)
}

/// Forge error types.
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Command exits unsuccessfully.
    #[error("command {command:?} failed:\n{message}")]
    Failed { command: String, message: String },

    /// Command cannot be spawned.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = ForgeError> = std::result::Result<T, E>;
