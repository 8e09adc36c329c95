// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository cleanup wizard.
//!
//! The wizard walks the immediate child folders of a root directory, one at a
//! time, and sorts each one into a [`Category`]:
//!
//! 1. __not_a_repo__: folder is not a git repository.
//! 2. __no_remote__: repository without any remote.
//! 3. __external_to_fork__: repository whose primary remote belongs to
//!    someone other than the operator.
//! 4. __my_repo_with_changes__: operator's repository with uncommitted or
//!    unpushed work.
//! 5. __my_repo_clean__: operator's repository fully in sync.
//!
//! For each category the operator picks one of a fixed set of [`Action`]s.
//! Whatever happens, the outcome is recorded and the state is flushed to disk
//! before the next folder is visited. Thus, the wizard can be interrupted at
//! any point and resumed later without revisiting settled folders.
//!
//! # See Also
//!
//! 1. [`state`] for the persistent state layout.
//! 2. [`classify`] for the exact decision order.

pub mod classify;
pub mod forge;
pub mod gitignore;
pub mod inspect;
pub mod state;

pub use classify::{classify, Category, RepoFacts};
pub use state::{CleanupState, FolderStatus, StateStore};

use crate::{
    cleanup::{
        forge::{Forge, GhForge},
        inspect::{Git2Inspector, RepoInspector},
    },
    git,
};

use git2::{Repository, RepositoryInitOptions};
use inquire::{Confirm, InquireError, Select, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_dir, remove_dir_all, rename},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

/// Operator action on a classified folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write gitignore, initialize repository, and make initial commit.
    Initialize,

    /// Initialize, then publish as private GitHub repository.
    InitializeAndPublish,

    /// Publish as private GitHub repository.
    Publish,

    /// Fork into operator's account.
    Fork,

    /// Commit everything and push current branch.
    CommitAndPush,

    /// Leave folder as is.
    Keep,

    /// Move folder into archive directory.
    Archive,

    /// Do nothing, but remember the folder was seen.
    Skip,

    /// Remove folder from disk.
    Delete,
}

impl Action {
    /// Actions offered for a category, in prompt order.
    pub fn for_category(category: Category) -> &'static [Action] {
        match category {
            Category::NotARepo => &[
                Self::Initialize,
                Self::InitializeAndPublish,
                Self::Skip,
                Self::Delete,
            ],
            Category::NoRemote => &[Self::Publish, Self::Skip, Self::Delete],
            Category::ExternalToFork => &[Self::Fork, Self::Skip],
            Category::MyRepoWithChanges => &[Self::CommitAndPush, Self::Skip],
            Category::MyRepoClean => &[Self::Keep, Self::Archive, Self::Delete],
        }
    }
}

impl Display for Action {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Initialize => "initialize repository",
            Self::InitializeAndPublish => "initialize and publish to GitHub",
            Self::Publish => "publish to GitHub (private)",
            Self::Fork => "fork into my account",
            Self::CommitAndPush => "commit all and push",
            Self::Keep => "keep",
            Self::Archive => "archive",
            Self::Skip => "skip",
            Self::Delete => "delete",
        })
    }
}

/// Layer of indirection for operator decisions.
pub trait Decider {
    /// Pick an action for a classified folder.
    fn choose(&mut self, folder: &Path, category: Category, actions: &[Action]) -> Result<Action>;

    /// Ask operator to confirm a destructive step.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;

    /// Ask operator for a commit message.
    fn commit_message(&mut self, folder: &Path) -> Result<String>;
}

/// Operator decisions through terminal prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquireDecider;

impl Decider for InquireDecider {
    fn choose(&mut self, folder: &Path, category: Category, actions: &[Action]) -> Result<Action> {
        let message = format!("{} [{category}]", folder.display());
        match Select::new(&message, actions.to_vec()).prompt() {
            Ok(action) => Ok(action),
            // INVARIANT: Escape means skip, Ctrl-C aborts the whole run.
            Err(InquireError::OperationCanceled) => Ok(Action::Skip),
            Err(error) => Err(error.into()),
        }
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        Ok(Confirm::new(prompt).with_default(false).prompt()?)
    }

    fn commit_message(&mut self, folder: &Path) -> Result<String> {
        let message = format!("commit message for {}", folder.display());
        Ok(Text::new(&message)
            .with_default("chore: checkpoint local changes")
            .prompt()?)
    }
}

/// Cleanup wizard settings.
#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    /// Owners considered to be the operator's own.
    pub owners: Vec<String>,

    /// Operator's GitHub login used when publishing.
    pub github_user: String,

    /// Directory archived folders are moved into.
    pub archive_dir: Option<PathBuf>,

    /// Revisit folders that failed in a previous run.
    pub retry_failed: bool,
}

/// Outcome of one visited folder in a wizard run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub path: PathBuf,
    pub category: Category,
    pub status: FolderStatus,
}

/// Repository cleanup manager.
#[derive(Debug)]
pub struct CleanupManager<I = Git2Inspector, F = GhForge>
where
    I: RepoInspector,
    F: Forge,
{
    inspector: I,
    forge: F,
    store: StateStore,
    options: CleanupOptions,
}

impl<I, F> CleanupManager<I, F>
where
    I: RepoInspector,
    F: Forge,
{
    /// Construct new cleanup manager.
    pub fn new(inspector: I, forge: F, store: StateStore, options: CleanupOptions) -> Self {
        Self {
            inspector,
            forge,
            store,
            options,
        }
    }

    /// State store used to persist progress.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Classify every child folder of root without changing anything.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::ReadRoot`] if root cannot be listed.
    /// - Return [`CleanupError::Inspect`] if a folder cannot be inspected.
    #[instrument(skip(self, root), level = "debug")]
    pub fn scan(&self, root: impl AsRef<Path>) -> Result<Vec<(PathBuf, Category)>> {
        let mut classified = Vec::new();
        for folder in list_folders(root.as_ref())? {
            let facts = self.inspector.inspect(&folder)?;
            classified.push((folder, classify(&facts, &self.options.owners)));
        }

        Ok(classified)
    }

    /// Run the interactive wizard over every unsettled child folder of root.
    ///
    /// State is flushed after each folder. Action failures are recorded as
    /// [`FolderStatus::Failed`] and do not stop the run. So are folders that
    /// cannot be inspected, without a category and without a [`Visit`]. Interrupting a
    /// prompt stops the run with an error, keeping progress made so far.
    ///
    /// # Errors
    ///
    /// - Return [`CleanupError::ReadRoot`] if root cannot be listed.
    /// - Return [`CleanupError::State`] if state cannot be loaded or saved.
    /// - Return [`CleanupError::Prompt`] if operator interrupts a prompt.
    #[instrument(skip(self, root, decider), level = "debug")]
    pub fn run(&self, root: impl AsRef<Path>, decider: &mut impl Decider) -> Result<Vec<Visit>> {
        let mut state = self.store.load()?;
        let mut visits = Vec::new();

        for folder in list_folders(root.as_ref())? {
            if state.is_settled(&folder, self.options.retry_failed) {
                info!("skip settled folder {:?}", folder.display());
                continue;
            }

            let facts = match self.inspector.inspect(&folder) {
                Ok(facts) => facts,
                Err(error) => {
                    warn!("cannot inspect {:?}: {error}", folder.display());
                    state.record(&folder, FolderStatus::Failed, None);
                    self.store.save(&state)?;
                    continue;
                }
            };
            let category = classify(&facts, &self.options.owners);
            info!("{:?} is {category}", folder.display());

            let action = decider.choose(&folder, category, Action::for_category(category))?;
            let status = match self.execute(&folder, action, decider) {
                Ok(status) => status,
                Err(CleanupError::Prompt(error)) => return Err(error.into()),
                Err(error) => {
                    error!("{action} failed for {:?}: {error:?}", folder.display());
                    FolderStatus::Failed
                }
            };

            state.record(&folder, status, category);
            self.store.save(&state)?;
            visits.push(Visit {
                path: folder,
                category,
                status,
            });
        }

        Ok(visits)
    }

    #[instrument(skip(self, folder, decider), level = "debug")]
    fn execute(
        &self,
        folder: &Path,
        action: Action,
        decider: &mut impl Decider,
    ) -> Result<FolderStatus> {
        match action {
            Action::Skip => Ok(FolderStatus::Skipped),
            Action::Keep => Ok(FolderStatus::Completed),
            Action::Delete => {
                let prompt = format!("permanently delete {}?", folder.display());
                if !decider.confirm(&prompt)? {
                    return Ok(FolderStatus::Skipped);
                }
                info!("delete {:?}", folder.display());
                remove_dir_all(folder).map_err(|err| CleanupError::Filesystem {
                    source: err,
                    path: folder.to_path_buf(),
                })?;
                Ok(FolderStatus::Deleted)
            }
            Action::Archive => {
                self.archive(folder)?;
                Ok(FolderStatus::Completed)
            }
            Action::Initialize => {
                initialize(folder)?;
                Ok(FolderStatus::Completed)
            }
            Action::InitializeAndPublish => {
                initialize(folder)?;
                self.publish(folder)?;
                Ok(FolderStatus::Completed)
            }
            Action::Publish => {
                self.publish(folder)?;
                Ok(FolderStatus::Completed)
            }
            Action::Fork => {
                self.forge.fork(folder)?;
                Ok(FolderStatus::Completed)
            }
            Action::CommitAndPush => {
                let message = decider.commit_message(folder)?;
                commit_and_push(folder, &message)?;
                Ok(FolderStatus::Completed)
            }
        }
    }

    fn publish(&self, folder: &Path) -> Result<()> {
        if self.options.github_user.is_empty() {
            return Err(CleanupError::MissingGithubUser);
        }
        let name = folder_name(folder)?;
        Ok(self
            .forge
            .create_repo(folder, &self.options.github_user, &name)?)
    }

    fn archive(&self, folder: &Path) -> Result<()> {
        let archive_dir = self
            .options
            .archive_dir
            .as_ref()
            .ok_or(CleanupError::MissingArchiveDir)?;
        mkdirp::mkdirp(archive_dir).map_err(|err| CleanupError::Filesystem {
            source: err,
            path: archive_dir.clone(),
        })?;

        let target = archive_dir.join(folder_name(folder)?);
        if target.exists() {
            return Err(CleanupError::ArchiveOccupied(target));
        }

        info!("archive {:?} to {:?}", folder.display(), target.display());
        rename(folder, &target).map_err(|err| CleanupError::Filesystem {
            source: err,
            path: target.clone(),
        })?;

        Ok(())
    }
}

/// Write gitignore, initialize repository on "main", and commit everything.
///
/// # Errors
///
/// - Return [`CleanupError::Gitignore`] if gitignore cannot be written.
/// - Return [`CleanupError::Git2`] if repository cannot be initialized.
/// - Return [`CleanupError::Git`] if initial commit fails.
#[instrument(skip(folder), level = "debug")]
pub fn initialize(folder: &Path) -> Result<()> {
    gitignore::write_if_missing(folder)?;

    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(folder, &opts)?;
    git::commit_all(&repo, "Initial commit")?;
    info!("initialized repository at {:?}", folder.display());

    Ok(())
}

/// Commit every change and push current branch to "origin".
///
/// # Errors
///
/// - Return [`CleanupError::Git2`] if repository cannot be opened.
/// - Return [`CleanupError::Git`] if commit or push fails.
#[instrument(skip(folder, message), level = "debug")]
pub fn commit_and_push(folder: &Path, message: &str) -> Result<()> {
    let repo = Repository::open(folder)?;
    if git::commit_all(&repo, message)?.is_none() {
        info!("nothing to commit in {:?}", folder.display());
    }

    let branch = git::current_branch(&repo)?;
    git::push(&repo, "origin", &branch)?;
    info!("pushed {branch} of {:?}", folder.display());

    Ok(())
}

/// List visible child folders of root, sorted by name, as absolute paths.
///
/// # Errors
///
/// - Return [`CleanupError::ReadRoot`] if root cannot be listed.
pub fn list_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let to_error = |err| CleanupError::ReadRoot {
        source: err,
        path: root.to_path_buf(),
    };
    let root = root.canonicalize().map_err(to_error)?;

    let mut folders = Vec::new();
    for entry in read_dir(&root).map_err(to_error)? {
        let entry = entry.map_err(to_error)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let is_dir = entry.file_type().map_err(to_error)?.is_dir();
        if is_dir && !hidden {
            folders.push(entry.path());
        }
    }
    folders.sort();

    Ok(folders)
}

fn folder_name(folder: &Path) -> Result<String> {
    folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CleanupError::NoFolderName(folder.to_path_buf()))
}

/// Cleanup wizard error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    /// Root directory cannot be listed.
    #[error("failed to list folders of {:?}", path.display())]
    ReadRoot {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Folder cannot be moved or removed.
    #[error("filesystem operation failed at {:?}", path.display())]
    Filesystem {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Archive target already exists.
    #[error("archive target {:?} already exists", .0.display())]
    ArchiveOccupied(PathBuf),

    /// No archive directory configured.
    #[error("no archive directory configured")]
    MissingArchiveDir,

    /// No GitHub user configured.
    #[error("no GitHub user configured")]
    MissingGithubUser,

    /// Folder path has no final component.
    #[error("{:?} has no folder name", .0.display())]
    NoFolderName(PathBuf),

    /// Prompting the operator fails or is interrupted.
    #[error(transparent)]
    Prompt(#[from] InquireError),

    /// Folder inspection fails.
    #[error(transparent)]
    Inspect(#[from] inspect::InspectError),

    /// Cleanup state cannot be loaded or saved.
    #[error(transparent)]
    State(#[from] state::StateError),

    /// Gitignore cannot be written.
    #[error(transparent)]
    Gitignore(#[from] gitignore::GitignoreError),

    /// Forge operation fails.
    #[error(transparent)]
    Forge(#[from] forge::ForgeError),

    /// Shared git plumbing fails.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CleanupError> = std::result::Result<T, E>;
