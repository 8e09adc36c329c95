// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod integration;

use anyhow::Result;
use git2::{IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>, kind: RepoKind) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(kind.is_bare());
        let repo = Repository::init_opts(path.as_ref(), &opts)?;
        set_identity(&repo)?;

        if kind.is_bare() {
            repo.config()?.set_str("status.showUntrackedFiles", "no")?;
        }

        Ok(Self { repo })
    }

    /// Clone existing repository with a usable identity.
    pub(crate) fn clone_of(url: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::clone(&url.as_ref().to_string_lossy(), path.as_ref())?;
        set_identity(&repo)?;

        Ok(Self { repo })
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Working tree of normal repositories, git directory of bare ones.
    pub(crate) fn path(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    pub(crate) fn head(&self) -> Result<Oid> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    pub(crate) fn add_remote(&self, name: &str, url: impl AsRef<str>) -> Result<()> {
        self.repo.remote(name, url.as_ref())?;
        Ok(())
    }

    /// Point remote-tracking branch at current HEAD, as if just fetched.
    pub(crate) fn track_head(&self, remote: &str) -> Result<()> {
        let head = self.head()?;
        self.repo.reference(
            &format!("refs/remotes/{remote}/main"),
            head,
            true,
            "fixture: track head",
        )?;
        Ok(())
    }

    /// Stage and commit file, also writing it into working tree if there is one.
    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<Oid> {
        let filename = filename.as_ref();
        let contents = contents.as_ref();

        let mut index = self.repo.index()?;
        if let Some(workdir) = self.repo.workdir() {
            let target = workdir.join(filename);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, contents)?;
            index.add_path(filename)?;
            index.write()?;
        } else {
            let entry = IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: 0o100644,
                uid: 0,
                gid: 0,
                file_size: contents.len() as u32,
                id: self.repo.blob(contents.as_bytes())?,
                flags: 0,
                flags_extended: 0,
                path: filename.to_string_lossy().into_owned().into_bytes(),
            };
            index.add_frombuffer(&entry, contents.as_bytes())?;
        }

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Ok(head) = self.repo.head() {
            parents.push(head.peel_to_commit()?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        // INVARIANT: Commit to HEAD by appending to obtained parent commits.
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {filename:?}").as_ref(),
            &tree,
            &parents,
        )?;

        Ok(oid)
    }
}

// INVARIANT: Always provide valid name and email.
//   - Git will complain if this is not set in CI/CD environments.
fn set_identity(repo: &Repository) -> Result<()> {
    let mut config = repo.config()?;
    config.set_str("user.name", "John Doe")?;
    config.set_str("user.email", "john@doe.com")?;
    Ok(())
}

/// Point libgit2 at a throwaway global configuration with a valid identity.
///
/// Only call this from sealed tests, before any other libgit2 call.
pub(crate) fn isolate_global_config(home: impl AsRef<Path>) -> Result<()> {
    let home = home.as_ref();
    fs::write(
        home.join(".gitconfig"),
        "[user]\n\tname = John Doe\n\temail = john@doe.com\n",
    )?;
    std::env::set_var("HOME", home);
    std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) enum RepoKind {
    #[default]
    Bare,

    Normal,
}

impl RepoKind {
    pub(crate) fn is_bare(&self) -> bool {
        match self {
            Self::Bare => true,
            Self::Normal => false,
        }
    }
}
