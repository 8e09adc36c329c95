// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Gather classification facts about folders.

use crate::{
    cleanup::classify::{RemoteInfo, RepoFacts},
    git,
};

use git2::{ErrorCode, Repository};
use std::path::Path;
use tracing::{debug, instrument};

/// Layer of indirection for folder inspection.
pub trait RepoInspector {
    /// Gather facts about a folder.
    ///
    /// The folder itself must be the repository root. Parent repositories are
    /// never searched.
    fn inspect(&self, path: &Path) -> Result<RepoFacts>;
}

/// Folder inspection through libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Inspector;

impl RepoInspector for Git2Inspector {
    #[instrument(skip(self, path), level = "debug")]
    fn inspect(&self, path: &Path) -> Result<RepoFacts> {
        debug!("inspect {:?}", path.display());
        let repo = match Repository::open(path) {
            Ok(repo) => repo,
            Err(error) if error.code() == ErrorCode::NotFound => {
                return Ok(RepoFacts::not_a_repo());
            }
            Err(error) => return Err(error.into()),
        };

        let mut remotes = Vec::new();
        for name in repo.remotes()?.iter().flatten() {
            let remote = repo.find_remote(name)?;
            remotes.push(RemoteInfo {
                name: name.to_owned(),
                url: remote.url().unwrap_or_default().to_owned(),
            });
        }

        let remote_name = remotes
            .iter()
            .find(|remote| remote.name == "origin")
            .or_else(|| remotes.first())
            .map(|remote| remote.name.clone())
            .unwrap_or_else(|| "origin".into());

        Ok(RepoFacts {
            is_repo: true,
            dirty: git::is_dirty(&repo)?,
            ahead: git::ahead_of_upstream(&repo, &remote_name)?,
            remotes,
        })
    }
}

/// Folder inspection error types.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    /// Shared git plumbing fails.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = InspectError> = std::result::Result<T, E>;
