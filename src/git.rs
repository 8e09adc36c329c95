// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shared libgit2 plumbing.
//!
//! Small helpers around [`git2`] used by both the cleanup wizard and the
//! repository sync tool: working tree status, staging and committing
//! everything, and authenticated fetch/push against a named remote.

use auth_git2::GitAuthenticator;
use git2::{
    BranchType, Commit, FetchOptions, IndexAddOption, Oid, PushOptions, RemoteCallbacks,
    Repository, StatusOptions,
};
use tracing::{debug, instrument, warn};

/// Check if working tree has uncommitted changes, untracked files included.
///
/// Bare repositories have no working tree, thus are never dirty.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if status cannot be computed.
pub fn is_dirty(repo: &Repository) -> Result<bool> {
    if repo.is_bare() {
        return Ok(false);
    }

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .recurse_untracked_dirs(false);
    Ok(!repo.statuses(Some(&mut opts))?.is_empty())
}

/// Name of branch that HEAD points to.
///
/// # Errors
///
/// - Return [`GitError::DetachedHead`] if HEAD is not a branch.
/// - Return [`GitError::Git2`] if HEAD cannot be read.
pub fn current_branch(repo: &Repository) -> Result<String> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(GitError::DetachedHead);
    }

    head.shorthand()
        .map(str::to_owned)
        .ok_or(GitError::DetachedHead)
}

/// Latest commit of HEAD, if any exists yet.
pub fn head_commit(repo: &Repository) -> Option<Commit<'_>> {
    repo.head().ok().and_then(|head| head.peel_to_commit().ok())
}

/// Count local commits that upstream does not have.
///
/// Falls back to `refs/remotes/<remote>/<branch>` when the branch has no
/// configured upstream. If neither exists, every commit of the branch counts
/// as unpushed. Unborn or detached HEADs count as zero.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if the commit graph cannot be walked.
pub fn ahead_of_upstream(repo: &Repository, remote: &str) -> Result<usize> {
    let Some(local) = head_commit(repo).map(|commit| commit.id()) else {
        return Ok(0);
    };
    let Ok(branch_name) = current_branch(repo) else {
        return Ok(0);
    };

    if let Some(upstream) = upstream_oid(repo, remote, &branch_name)? {
        let (ahead, _) = repo.graph_ahead_behind(local, upstream)?;
        return Ok(ahead);
    }

    let mut walk = repo.revwalk()?;
    walk.push(local)?;
    Ok(walk.count())
}

/// Resolve upstream commit of a local branch.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if branch lookup fails.
pub fn upstream_oid(repo: &Repository, remote: &str, branch_name: &str) -> Result<Option<Oid>> {
    let branch = repo.find_branch(branch_name, BranchType::Local)?;
    if let Ok(upstream) = branch.upstream() {
        return Ok(upstream.get().target());
    }

    let tracking = format!("refs/remotes/{remote}/{branch_name}");
    Ok(repo
        .find_reference(&tracking)
        .ok()
        .and_then(|reference| reference.target()))
}

/// Stage every change in working tree and commit it to HEAD.
///
/// Deletions are staged as well. Returns `None` if the staged tree matches
/// the tree of HEAD, i.e., there is nothing to commit. The first commit of an
/// unborn branch is always made.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if staging or committing fails.
#[instrument(skip(repo, message), level = "debug")]
pub fn commit_all(repo: &Repository, message: impl AsRef<str>) -> Result<Option<Oid>> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"].iter(), None)?;
    index.write()?;

    // INVARIANT: Always use new tree produced by index after staging.
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let parent = head_commit(repo);
    if let Some(parent) = &parent {
        if parent.tree_id() == tree_oid {
            debug!("nothing to commit in {:?}", repo.path().display());
            return Ok(None);
        }
    }

    let signature = repo.signature()?;
    let parents = parent.iter().collect::<Vec<_>>();
    let oid = repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message.as_ref(),
        &tree,
        &parents,
    )?;

    Ok(Some(oid))
}

/// Fetch configured refspecs of a remote.
///
/// Credentials are prompted for through [`GitAuthenticator`] if the remote
/// requires them.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if fetch fails.
#[instrument(skip(repo), level = "debug")]
pub fn fetch(repo: &Repository, remote: &str) -> Result<()> {
    let authenticator = GitAuthenticator::default();
    let config = repo.config()?;
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    let mut remote = repo.find_remote(remote)?;
    remote.fetch(&[] as &[&str], Some(&mut fo), None)?;

    Ok(())
}

/// Push local branch to branch of same name on remote.
///
/// Rejected reference updates are reported as errors. Sets the upstream of
/// the local branch after a successful push.
///
/// # Errors
///
/// - Return [`GitError::Git2`] if push fails or is rejected.
#[instrument(skip(repo), level = "debug")]
pub fn push(repo: &Repository, remote: &str, branch: &str) -> Result<()> {
    let authenticator = GitAuthenticator::default();
    let config = repo.config()?;
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.push_update_reference(|refname, status| match status {
        Some(message) => Err(git2::Error::from_str(&format!(
            "push of {refname} rejected: {message}"
        ))),
        None => Ok(()),
    });

    let mut po = PushOptions::new();
    po.remote_callbacks(rc);
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    repo.find_remote(remote)?
        .push(&[refspec.as_str()], Some(&mut po))?;

    let mut local = repo.find_branch(branch, BranchType::Local)?;
    if let Err(error) = local.set_upstream(Some(&format!("{remote}/{branch}"))) {
        warn!("cannot set upstream of {branch} to {remote}/{branch}: {error}");
    }

    Ok(())
}

/// Shared git error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// HEAD does not point to a branch.
    #[error("HEAD is detached or unborn")]
    DetachedHead,

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;
