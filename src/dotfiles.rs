// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfiles installer.
//!
//! Dotfiles are kept in a __bare-alias__ repository. Although bare
//! repositories lack a working tree by definition, Git allows users to force
//! one by designating a directory as an alias for a working tree through the
//! "--work-tree" argument. The Git directory and the alias working tree are
//! kept separate, which allows us to treat an entire home directory as a Git
//! repository without needing to initialize it as one.
//!
//! Installation happens in three steps:
//!
//! 1. Clone the dotfiles repository as a bare repository.
//! 2. Check out its tracked files into the work tree, moving pre-existing
//!    files that would be overwritten into a backup directory first.
//! 3. Add a shell alias wrapping git with the right "--git-dir" and
//!    "--work-tree" arguments, plus completion wiring for that alias.
//!
//! # See Also
//!
//! 1. [ArchWiki - dotfiles](https://wiki.archlinux.org/title/Dotfiles#Tracking_dotfiles_directly_with_Git)

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    FetchOptions, ObjectType, Oid, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use mkdirp::mkdirp;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read, read_to_string, rename, symlink_metadata, write},
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

const BLOCK_START: &str = "# >>> mybin dotfiles >>>";
const BLOCK_END: &str = "# <<< mybin dotfiles <<<";

/// Shell whose rc file receives the dotfiles alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
}

impl Shell {
    /// Guess shell from `$SHELL`, defaulting to bash.
    pub fn detect() -> Self {
        match std::env::var("SHELL") {
            Ok(shell) if shell.ends_with("zsh") => Self::Zsh,
            _ => Self::Bash,
        }
    }

    /// Path to rc file of shell within home directory.
    pub fn rc_file(&self, home: impl AsRef<Path>) -> PathBuf {
        match self {
            Self::Bash => home.as_ref().join(".bashrc"),
            Self::Zsh => home.as_ref().join(".zshrc"),
        }
    }

    /// Completion wiring for alias of git.
    fn completion_line(&self, alias: &str) -> String {
        match self {
            Self::Bash => format!(
                "if type __git_complete >/dev/null 2>&1; then __git_complete {alias} __git_main; fi"
            ),
            Self::Zsh => format!("if (( $+functions[compdef] )); then compdef {alias}=git; fi"),
        }
    }
}

impl Display for Shell {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Bash => "bash",
            Self::Zsh => "zsh",
        })
    }
}

/// Locations used by dotfiles installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotfilesLayout {
    /// Bare repository.
    pub git_dir: PathBuf,

    /// Work tree alias that files get checked out into.
    pub work_tree: PathBuf,

    /// Directory receiving pre-existing conflicting files.
    pub backup_dir: PathBuf,
}

impl DotfilesLayout {
    /// Default layout relative to a home directory.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref();
        Self {
            git_dir: home.join(".dotfiles"),
            work_tree: home.to_path_buf(),
            backup_dir: home.join(".dotfiles-backup"),
        }
    }
}

/// Result of checking out dotfiles into the work tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutReport {
    /// Tracked files checked out.
    pub tracked: usize,

    /// Pre-existing files moved into backup directory, relative paths.
    pub backed_up: Vec<PathBuf>,
}

/// Clone dotfiles repository as bare repository, showing clone progress.
///
/// If credentials are required, the user is prompted for them. The
/// progress bar is suspended for user input.
///
/// # Errors
///
/// - Return [`DotfilesError::Git2`] if clone fails.
/// - Return [`DotfilesError::IndicatifStyleTemplate`] if progress bar style
///   is invalid.
#[instrument(skip(url, git_dir, bar), level = "debug")]
pub fn clone_bare(url: impl AsRef<str>, git_dir: impl AsRef<Path>, bar: ProgressBar) -> Result<Repository> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.as_ref().to_string());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let prompter = IndicatifPrompter::new(bar);
    let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    let config = git2::Config::open_default()?;

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            prompter.bar.set_length(stats.total_objects() as u64);
            prompter.bar.set_position(stats.received_objects() as u64);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    let repo = RepoBuilder::new()
        .bare(true)
        .fetch_options(fo)
        .clone(url.as_ref(), git_dir.as_ref())?;
    prompter.bar.finish_and_clear();
    info!("cloned {} into {:?}", url.as_ref(), git_dir.as_ref().display());

    Ok(repo)
}

/// Hide untracked files of work tree from status output.
///
/// A home directory is full of files that are not dotfiles.
///
/// # Errors
///
/// - Return [`DotfilesError::Git2`] if configuration cannot be written.
pub fn configure(repo: &Repository) -> Result<()> {
    repo.config()?
        .set_str("status.showUntrackedFiles", "no")?;
    Ok(())
}

/// List tracked files of HEAD with their blob ids.
///
/// # Errors
///
/// - Return [`DotfilesError::Git2`] if HEAD tree cannot be walked.
pub fn list_tracked_files(repo: &Repository) -> Result<Vec<(PathBuf, Oid)>> {
    let mut entries = Vec::new();
    let tree = repo.head()?.peel_to_commit()?.tree()?;
    let mut trees_and_paths = VecDeque::new();
    trees_and_paths.push_front((tree, PathBuf::new()));

    // Use DFS to traverse HEAD tree.
    while let Some((tree, path)) = trees_and_paths.pop_front() {
        for tree_entry in &tree {
            let name = String::from_utf8_lossy(tree_entry.name_bytes()).into_owned();
            match tree_entry.kind() {
                // INVARIANT: Hit a tree? Traverse it!
                Some(ObjectType::Tree) => {
                    let next_tree = repo.find_tree(tree_entry.id())?;
                    trees_and_paths.push_front((next_tree, path.join(name)));
                }
                // INVARIANT: Hit a blob? Record our current path!
                Some(ObjectType::Blob) => entries.push((path.join(name), tree_entry.id())),
                _ => continue,
            }
        }
    }

    entries.sort();
    Ok(entries)
}

/// Check out HEAD of bare repository into work tree alias.
///
/// Pre-existing files whose content differs from the tracked version are
/// moved into the backup directory first, keeping their relative path.
/// Identical files are left alone.
///
/// # Errors
///
/// - Return [`DotfilesError::Backup`] if a conflicting file cannot be moved.
/// - Return [`DotfilesError::Git2`] if checkout fails.
#[instrument(skip(repo, layout), level = "debug")]
pub fn checkout(repo: &Repository, layout: &DotfilesLayout) -> Result<CheckoutReport> {
    let tracked = list_tracked_files(repo)?;
    let mut report = CheckoutReport {
        tracked: tracked.len(),
        backed_up: Vec::new(),
    };

    for (path, oid) in &tracked {
        let target = layout.work_tree.join(path);
        let Ok(metadata) = symlink_metadata(&target) else {
            continue;
        };

        if metadata.is_file() {
            let blob = repo.find_blob(*oid)?;
            if read(&target).map(|bytes| bytes == blob.content()).unwrap_or(false) {
                debug!("{:?} already matches tracked content", path.display());
                continue;
            }
        }

        backup(&target, &layout.backup_dir.join(path))?;
        report.backed_up.push(path.clone());
    }

    repo.set_workdir(&layout.work_tree, false)?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    info!(
        "checked out {} tracked file(s) into {:?}",
        report.tracked,
        layout.work_tree.display()
    );

    Ok(report)
}

fn backup(from: &Path, to: &Path) -> Result<()> {
    let to_error = |err| DotfilesError::Backup {
        source: err,
        path: from.to_path_buf(),
    };
    if let Some(parent) = to.parent() {
        mkdirp(parent).map_err(to_error)?;
    }
    warn!("back up {:?} to {:?}", from.display(), to.display());
    rename(from, to).map_err(to_error)?;

    Ok(())
}

/// Render marked shell block with alias and completion wiring.
pub fn shell_block(shell: Shell, alias: &str, git_dir: &Path, work_tree: &Path) -> String {
    format!(
        "{BLOCK_START}\nalias {alias}='git --git-dir=\"{}\" --work-tree=\"{}\"'\n{}\n{BLOCK_END}\n",
        git_dir.display(),
        work_tree.display(),
        shell.completion_line(alias),
    )
}

/// Insert marked block into rc content, replacing any previous block.
pub fn upsert_block(existing: &str, block: &str) -> String {
    let start = existing.find(BLOCK_START);
    let end = existing
        .find(BLOCK_END)
        .map(|index| index + BLOCK_END.len());

    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            let rest = existing[end..].strip_prefix('\n').unwrap_or(&existing[end..]);
            format!("{}{block}{rest}", &existing[..start])
        }
        _ if existing.is_empty() => block.to_owned(),
        _ if existing.ends_with('\n') => format!("{existing}\n{block}"),
        _ => format!("{existing}\n\n{block}"),
    }
}

/// Install shell block into rc file.
///
/// Returns `true` if rc file changed.
///
/// # Errors
///
/// - Return [`DotfilesError::ShellRc`] if rc file cannot be read or written.
#[instrument(skip(rc_file, block), level = "debug")]
pub fn install_shell_block(rc_file: impl AsRef<Path>, block: &str) -> Result<bool> {
    let rc_file = rc_file.as_ref();
    let to_error = |err| DotfilesError::ShellRc {
        source: err,
        path: rc_file.to_path_buf(),
    };

    let existing = if rc_file.exists() {
        read_to_string(rc_file).map_err(to_error)?
    } else {
        String::new()
    };

    let updated = upsert_block(&existing, block);
    if updated == existing {
        debug!("{:?} already up to date", rc_file.display());
        return Ok(false);
    }

    write(rc_file, updated).map_err(to_error)?;
    info!("updated {:?}", rc_file.display());

    Ok(true)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Open previously cloned bare repository, if there is one.
pub fn open_existing(git_dir: impl AsRef<Path>) -> Option<Repository> {
    Repository::open_bare(git_dir.as_ref()).ok()
}

/// Dotfiles installer error types.
#[derive(Debug, thiserror::Error)]
pub enum DotfilesError {
    /// Conflicting file cannot be moved into backup directory.
    #[error("failed to back up {:?}", path.display())]
    Backup {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Shell rc file cannot be read or written.
    #[error("failed to update shell rc file {:?}", path.display())]
    ShellRc {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = DotfilesError> = std::result::Result<T, E>;
