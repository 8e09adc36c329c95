// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository sync with retries and conflict branches.
//!
//! Brings the current branch of a clean repository in line with its
//! upstream on "origin":
//!
//! - Up to date: nothing happens.
//! - Behind only: fast-forward.
//! - Ahead only: push local commits.
//! - Diverged: merge in memory. A clean merge is committed and pushed. On
//!   conflict, local commits are preserved on a __conflict branch__, and the
//!   local branch is hard reset to upstream.
//!
//! Network operations are retried a fixed number of times with a linear
//! sleep backoff between attempts.

use crate::git;

use chrono::Local;
use git2::{build::CheckoutBuilder, AnnotatedCommit, Repository, ResetType};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    thread::sleep,
    time::Duration,
};
use tracing::{info, instrument, warn};

/// Retry policy for network operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, at least one.
    pub attempts: u32,

    /// Backoff multiplied by attempt number between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Run operation until it succeeds or attempts run out.
    ///
    /// Sleeps `backoff * attempt` after each failed attempt except the last.
    /// The last error is returned if every attempt fails.
    pub fn run<T, E, O>(&self, what: &str, mut operation: O) -> std::result::Result<T, E>
    where
        O: FnMut() -> std::result::Result<T, E>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) if attempt < attempts => {
                    let wait = self.backoff * attempt;
                    warn!("{what} failed (attempt {attempt}/{attempts}): {error}; retry in {wait:?}");
                    sleep(wait);
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Outcome of a repository sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local branch already matches upstream.
    UpToDate,

    /// Local branch was behind and got fast-forwarded.
    FastForwarded,

    /// Diverged histories merged cleanly and pushed.
    Merged,

    /// Local branch was ahead and got pushed.
    Pushed { commits: usize },

    /// Merge failed; local commits preserved on branch.
    Conflict { branch: String },
}

impl Display for SyncOutcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UpToDate => write!(fmt, "up to date"),
            Self::FastForwarded => write!(fmt, "fast-forwarded"),
            Self::Merged => write!(fmt, "merged and pushed"),
            Self::Pushed { commits } => write!(fmt, "pushed {commits} commit(s)"),
            Self::Conflict { branch } => {
                write!(fmt, "conflict, local commits preserved on {branch}")
            }
        }
    }
}

/// Sync current branch of repository with "origin".
///
/// # Errors
///
/// - Return [`SyncError::Dirty`] if working tree has uncommitted changes.
/// - Return [`SyncError::NoUpstream`] if upstream branch cannot be found.
/// - Return [`SyncError::Git`] or [`SyncError::Git2`] if git operations fail
///   after all retries.
#[instrument(skip(path, policy), level = "debug")]
pub fn sync_repo(path: impl AsRef<Path>, policy: &RetryPolicy) -> Result<SyncOutcome> {
    const REMOTE: &str = "origin";

    let path = path.as_ref();
    let repo = Repository::open(path)?;
    if git::is_dirty(&repo)? {
        return Err(SyncError::Dirty(path.to_path_buf()));
    }

    let branch = git::current_branch(&repo)?;
    info!("sync {branch} of {:?}", path.display());
    policy.run("fetch", || git::fetch(&repo, REMOTE))?;

    let upstream_oid = git::upstream_oid(&repo, REMOTE, &branch)?
        .ok_or_else(|| SyncError::NoUpstream(format!("{REMOTE}/{branch}")))?;
    let upstream = repo.find_annotated_commit(upstream_oid)?;
    let (analysis, _) = repo.merge_analysis(&[&upstream])?;

    if analysis.is_up_to_date() {
        let (ahead, _) = match git::head_commit(&repo) {
            Some(local) => repo.graph_ahead_behind(local.id(), upstream_oid)?,
            None => (0, 0),
        };
        if ahead == 0 {
            return Ok(SyncOutcome::UpToDate);
        }

        policy.run("push", || git::push(&repo, REMOTE, &branch))?;
        return Ok(SyncOutcome::Pushed { commits: ahead });
    }

    if analysis.is_fast_forward() {
        fast_forward(&repo, &branch, &upstream)?;
        return Ok(SyncOutcome::FastForwarded);
    }

    merge_or_preserve(&repo, REMOTE, &branch, &upstream, policy)
}

fn fast_forward(repo: &Repository, branch: &str, upstream: &AnnotatedCommit<'_>) -> Result<()> {
    let refname = format!("refs/heads/{branch}");
    let mut reference = repo.find_reference(&refname)?;
    reference.set_target(upstream.id(), "sync: fast-forward")?;
    repo.set_head(&refname)?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    info!("fast-forwarded {branch} to {}", upstream.id());

    Ok(())
}

fn merge_or_preserve(
    repo: &Repository,
    remote: &str,
    branch: &str,
    upstream: &AnnotatedCommit<'_>,
    policy: &RetryPolicy,
) -> Result<SyncOutcome> {
    let local = git::head_commit(repo).ok_or(git::GitError::DetachedHead)?;
    let theirs = repo.find_commit(upstream.id())?;
    let mut index = repo.merge_commits(&local, &theirs, None)?;

    if index.has_conflicts() {
        let name = conflict_branch_name(branch, &Local::now().format("%Y%m%d-%H%M%S").to_string());
        repo.branch(&name, &local, false)?;
        warn!("merge of {branch} conflicts, local commits preserved on {name}");

        repo.reset(theirs.as_object(), ResetType::Hard, None)?;
        return Ok(SyncOutcome::Conflict { branch: name });
    }

    let tree_oid = index.write_tree_to(repo)?;
    let tree = repo.find_tree(tree_oid)?;
    let signature = repo.signature()?;
    let message = format!("Merge {remote}/{branch} into {branch}");
    repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        &message,
        &tree,
        &[&local, &theirs],
    )?;
    repo.checkout_head(Some(CheckoutBuilder::default().force()))?;
    info!("merged {remote}/{branch} into {branch}");

    policy.run("push", || git::push(repo, remote, branch))?;
    Ok(SyncOutcome::Merged)
}

/// Name of conflict branch for branch at a timestamp.
pub fn conflict_branch_name(branch: &str, stamp: &str) -> String {
    format!("conflict/{branch}-{stamp}")
}

/// Repository sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Working tree has uncommitted changes.
    #[error("{:?} has uncommitted changes, commit or stash them first", .0.display())]
    Dirty(PathBuf),

    /// Upstream branch cannot be found.
    #[error("upstream {0} not found")]
    NoUpstream(String),

    /// Shared git plumbing fails.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn instant() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn retry_stops_at_first_success() {
        let calls = Cell::new(0);
        let result: std::result::Result<u32, String> = instant().run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err("boom".into())
            } else {
                Ok(7)
            }
        });

        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn retry_returns_last_error_after_all_attempts() {
        let calls = Cell::new(0);
        let result: std::result::Result<(), String> = instant().run("op", || {
            calls.set(calls.get() + 1);
            Err(format!("boom {}", calls.get()))
        });

        assert_eq!(result, Err("boom 3".into()));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_always_makes_one_attempt() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            attempts: 0,
            backoff: Duration::ZERO,
        };
        let _: std::result::Result<(), String> = policy.run("op", || {
            calls.set(calls.get() + 1);
            Err("boom".into())
        });

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn conflict_branch_embeds_branch_and_stamp() {
        assert_eq!(
            conflict_branch_name("main", "20250101-120000"),
            "conflict/main-20250101-120000"
        );
    }
}
