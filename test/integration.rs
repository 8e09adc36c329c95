// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{isolate_global_config, RepoFixture, RepoKind};

use anyhow::Result;
use mybin::{
    cleanup::{
        forge::{Forge, Result as ForgeResult},
        inspect::Git2Inspector,
        Action, Category, CleanupManager, CleanupOptions, Decider, FolderStatus, StateStore,
    },
    dotfiles::{self, DotfilesLayout},
    git,
    sync::{sync_repo, RetryPolicy, SyncError, SyncOutcome},
};
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

fn instant() -> RetryPolicy {
    RetryPolicy {
        attempts: 1,
        backoff: Duration::ZERO,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Default)]
struct ScriptedDecider {
    choices: HashMap<String, Action>,
    asked: Vec<String>,
    declines: bool,
}

impl ScriptedDecider {
    fn new(choices: impl IntoIterator<Item = (&'static str, Action)>) -> Self {
        Self {
            choices: choices
                .into_iter()
                .map(|(name, action)| (name.to_string(), action))
                .collect(),
            asked: Vec::new(),
            declines: false,
        }
    }

    fn declining(mut self) -> Self {
        self.declines = true;
        self
    }
}

impl Decider for ScriptedDecider {
    fn choose(
        &mut self,
        folder: &Path,
        _category: Category,
        actions: &[Action],
    ) -> mybin::cleanup::Result<Action> {
        let name = file_name(folder);
        self.asked.push(name.clone());
        let action = self.choices.get(&name).copied().unwrap_or(Action::Skip);
        assert!(actions.contains(&action), "{action} not offered for {name}");
        Ok(action)
    }

    fn confirm(&mut self, _prompt: &str) -> mybin::cleanup::Result<bool> {
        Ok(!self.declines)
    }

    fn commit_message(&mut self, _folder: &Path) -> mybin::cleanup::Result<String> {
        Ok("chore: checkpoint".into())
    }
}

#[derive(Debug, Default)]
struct RecordingForge {
    calls: RefCell<Vec<String>>,
}

impl Forge for &RecordingForge {
    fn create_repo(&self, path: &Path, owner: &str, name: &str) -> ForgeResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("create {owner}/{name} from {}", file_name(path)));
        Ok(())
    }

    fn fork(&self, path: &Path) -> ForgeResult<()> {
        self.calls
            .borrow_mut()
            .push(format!("fork {}", file_name(path)));
        Ok(())
    }
}

fn repo_with_remote(root: &Path, name: &str, url: &str) -> Result<RepoFixture> {
    let fixture = RepoFixture::new(root.join(name), RepoKind::Normal)?;
    fixture.stage_and_commit("README.md", format!("# {name}\n"))?;
    fixture.add_remote("origin", url)?;
    Ok(fixture)
}

#[test]
fn scan_classifies_every_child_folder() -> Result<()> {
    let root = tempfile::tempdir()?;
    let root = root.path();

    fs::create_dir(root.join("plain"))?;
    fs::write(root.join("plain/notes.txt"), "todo")?;
    fs::create_dir(root.join(".hidden"))?;

    let lonely = RepoFixture::new(root.join("lonely"), RepoKind::Normal)?;
    lonely.stage_and_commit("main.rs", "fn main() {}\n")?;

    repo_with_remote(root, "foreign", "https://github.com/torvalds/linux.git")?;

    let dirty = repo_with_remote(root, "dirty", "https://github.com/octocat/dirty.git")?;
    dirty.track_head("origin")?;
    fs::write(root.join("dirty/scratch.txt"), "wip")?;

    repo_with_remote(root, "ahead", "https://github.com/octocat/ahead.git")?;

    let clean = repo_with_remote(root, "clean", "git@github.com:Octocat/clean.git")?;
    clean.track_head("origin")?;

    let forge = RecordingForge::default();
    let manager = CleanupManager::new(
        Git2Inspector,
        &forge,
        StateStore::new(root.join(".state")),
        CleanupOptions {
            owners: vec!["octocat".into()],
            ..Default::default()
        },
    );

    let result = manager
        .scan(root)?
        .into_iter()
        .map(|(path, category)| (file_name(&path), category))
        .collect::<Vec<_>>();
    let expect = vec![
        ("ahead".to_string(), Category::MyRepoWithChanges),
        ("clean".to_string(), Category::MyRepoClean),
        ("dirty".to_string(), Category::MyRepoWithChanges),
        ("foreign".to_string(), Category::ExternalToFork),
        ("lonely".to_string(), Category::NoRemote),
        ("plain".to_string(), Category::NotARepo),
    ];
    assert_eq!(result, expect);
    assert!(!manager.store().state_path().exists());

    Ok(())
}

#[sealed_test]
fn wizard_records_outcomes_and_resumes() -> Result<()> {
    let home = tempfile::tempdir()?;
    isolate_global_config(home.path())?;

    let root = tempfile::tempdir()?;
    let root = root.path();
    let state_dir = tempfile::tempdir()?;
    let archive = tempfile::tempdir()?;

    fs::create_dir(root.join("plain"))?;
    fs::write(root.join("plain/Cargo.toml"), "[package]\nname = \"plain\"\n")?;
    fs::create_dir(root.join("junk"))?;
    let lonely = RepoFixture::new(root.join("lonely"), RepoKind::Normal)?;
    lonely.stage_and_commit("main.rs", "fn main() {}\n")?;
    repo_with_remote(root, "foreign", "https://github.com/torvalds/linux.git")?;
    let clean = repo_with_remote(root, "clean", "https://github.com/octocat/clean.git")?;
    clean.track_head("origin")?;

    let forge = RecordingForge::default();
    let options = CleanupOptions {
        owners: vec!["octocat".into()],
        github_user: "octocat".into(),
        archive_dir: None,
        retry_failed: false,
    };
    let manager = CleanupManager::new(
        Git2Inspector,
        &forge,
        StateStore::new(state_dir.path()),
        options.clone(),
    );

    let mut decider = ScriptedDecider::new([
        ("plain", Action::Initialize),
        ("junk", Action::Delete),
        ("lonely", Action::Publish),
        ("foreign", Action::Fork),
        ("clean", Action::Archive),
    ]);
    let visits = manager.run(root, &mut decider)?;
    let result = visits
        .iter()
        .map(|visit| (file_name(&visit.path), visit.category, visit.status))
        .collect::<Vec<_>>();
    let expect = vec![
        ("clean".to_string(), Category::MyRepoClean, FolderStatus::Failed),
        ("foreign".to_string(), Category::ExternalToFork, FolderStatus::Completed),
        ("junk".to_string(), Category::NotARepo, FolderStatus::Deleted),
        ("lonely".to_string(), Category::NoRemote, FolderStatus::Completed),
        ("plain".to_string(), Category::NotARepo, FolderStatus::Completed),
    ];
    assert_eq!(result, expect);
    assert_eq!(
        *forge.calls.borrow(),
        vec!["fork foreign".to_string(), "create octocat/lonely from lonely".to_string()]
    );

    assert!(!root.join("junk").exists());
    assert!(root.join("plain/.git").is_dir());
    assert!(fs::read_to_string(root.join("plain/.gitignore"))?.contains("/target/"));
    let initialized = git2::Repository::open(root.join("plain"))?;
    assert!(!git::is_dirty(&initialized)?);

    let store = manager.store();
    assert!(store.state_path().is_file());
    let listing = fs::read_to_string(store.listing_path())?;
    assert_eq!(listing.lines().count(), 5);
    assert!(listing.lines().any(|line| line.ends_with("/foreign|external_to_fork")));

    // Settled folders are never revisited.
    let mut decider = ScriptedDecider::default();
    let visits = manager.run(root, &mut decider)?;
    assert!(visits.is_empty());
    assert!(decider.asked.is_empty());

    // Failed folders are revisited on request.
    let manager = CleanupManager::new(
        Git2Inspector,
        &forge,
        StateStore::new(state_dir.path()),
        CleanupOptions {
            archive_dir: Some(archive.path().to_path_buf()),
            retry_failed: true,
            ..options
        },
    );
    let mut decider = ScriptedDecider::new([("clean", Action::Archive)]);
    let visits = manager.run(root, &mut decider)?;
    assert_eq!(decider.asked, vec!["clean".to_string()]);
    assert_eq!(visits[0].status, FolderStatus::Completed);
    assert!(archive.path().join("clean/.git").is_dir());
    assert!(!root.join("clean").exists());

    let summary = manager.store().load()?.summary(None);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.by_status.get(&FolderStatus::Completed), Some(&4));
    assert_eq!(summary.by_status.get(&FolderStatus::Failed), None);

    Ok(())
}

#[sealed_test]
fn wizard_commits_publishes_keeps_and_honors_declined_delete() -> Result<()> {
    let home = tempfile::tempdir()?;
    isolate_global_config(home.path())?;

    let root = tempfile::tempdir()?;
    let root = root.path();
    let state_dir = tempfile::tempdir()?;
    let remotes = tempfile::tempdir()?;

    // Fetch URL names the operator, pushes land in a local bare repository.
    let origin = remotes.path().join("changes.git");
    RepoFixture::new(&origin, RepoKind::Bare)?;
    let changes = repo_with_remote(root, "changes", "https://github.com/octocat/changes.git")?;
    changes
        .repo()
        .remote_set_pushurl("origin", Some(&*origin.to_string_lossy()))?;
    fs::write(root.join("changes/wip.txt"), "unsaved\n")?;

    fs::create_dir(root.join("fresh"))?;
    fs::write(root.join("fresh/package.json"), "{}\n")?;
    let kept = repo_with_remote(root, "kept", "https://github.com/octocat/kept.git")?;
    kept.track_head("origin")?;
    fs::create_dir(root.join("precious"))?;
    fs::write(root.join("precious/thesis.txt"), "chapter one\n")?;

    let forge = RecordingForge::default();
    let manager = CleanupManager::new(
        Git2Inspector,
        &forge,
        StateStore::new(state_dir.path()),
        CleanupOptions {
            owners: vec!["octocat".into()],
            github_user: "octocat".into(),
            ..Default::default()
        },
    );

    let mut decider = ScriptedDecider::new([
        ("changes", Action::CommitAndPush),
        ("fresh", Action::InitializeAndPublish),
        ("kept", Action::Keep),
        ("precious", Action::Delete),
    ])
    .declining();
    let visits = manager.run(root, &mut decider)?;
    let result = visits
        .iter()
        .map(|visit| (file_name(&visit.path), visit.category, visit.status))
        .collect::<Vec<_>>();
    let expect = vec![
        ("changes".to_string(), Category::MyRepoWithChanges, FolderStatus::Completed),
        ("fresh".to_string(), Category::NotARepo, FolderStatus::Completed),
        ("kept".to_string(), Category::MyRepoClean, FolderStatus::Completed),
        ("precious".to_string(), Category::NotARepo, FolderStatus::Skipped),
    ];
    assert_eq!(result, expect);

    // Local work is committed and lands in the push remote.
    assert!(!git::is_dirty(changes.repo())?);
    let pushed = git2::Repository::open_bare(&origin)?.refname_to_id("refs/heads/main")?;
    assert_eq!(pushed, changes.head()?);
    let head = changes.repo().head()?.peel_to_commit()?;
    assert_eq!(head.message(), Some("chore: checkpoint"));

    // Initialized, then published through the forge.
    assert!(root.join("fresh/.git").is_dir());
    assert!(fs::read_to_string(root.join("fresh/.gitignore"))?.contains("node_modules/"));
    assert_eq!(
        *forge.calls.borrow(),
        vec!["create octocat/fresh from fresh".to_string()]
    );

    assert!(root.join("kept/.git").is_dir());
    assert_eq!(
        fs::read_to_string(root.join("precious/thesis.txt"))?,
        "chapter one\n"
    );

    Ok(())
}

struct SyncSetup {
    _dir: tempfile::TempDir,
    origin: PathBuf,
    upstream: RepoFixture,
    local: RepoFixture,
}

impl SyncSetup {
    /// Bare origin, plus two clones of it: "upstream" pushes, "local" syncs.
    fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let origin = dir.path().join("origin.git");
        RepoFixture::new(&origin, RepoKind::Bare)?;

        let upstream = RepoFixture::new(dir.path().join("upstream"), RepoKind::Normal)?;
        upstream.stage_and_commit("README.md", "hello\n")?;
        upstream.add_remote("origin", origin.to_string_lossy())?;
        git::push(upstream.repo(), "origin", "main")?;

        let local = RepoFixture::clone_of(&origin, dir.path().join("local"))?;

        Ok(Self {
            _dir: dir,
            origin,
            upstream,
            local,
        })
    }

    fn publish(&self, filename: &str, contents: &str) -> Result<()> {
        self.upstream.stage_and_commit(filename, contents)?;
        git::push(self.upstream.repo(), "origin", "main")?;
        Ok(())
    }

    fn origin_main(&self) -> Result<git2::Oid> {
        let origin = git2::Repository::open_bare(&self.origin)?;
        Ok(origin.refname_to_id("refs/heads/main")?)
    }
}

#[test]
fn sync_leaves_matching_repository_alone() -> Result<()> {
    let setup = SyncSetup::new()?;

    let outcome = sync_repo(setup.local.path(), &instant())?;
    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert_eq!(setup.local.head()?, setup.origin_main()?);

    Ok(())
}

#[test]
fn sync_fast_forwards_behind_repository() -> Result<()> {
    let setup = SyncSetup::new()?;
    setup.publish("news.txt", "fresh\n")?;

    let outcome = sync_repo(setup.local.path(), &instant())?;
    assert_eq!(outcome, SyncOutcome::FastForwarded);
    assert_eq!(setup.local.head()?, setup.origin_main()?);
    assert_eq!(fs::read_to_string(setup.local.path().join("news.txt"))?, "fresh\n");

    Ok(())
}

#[test]
fn sync_pushes_local_commits() -> Result<()> {
    let setup = SyncSetup::new()?;
    setup.local.stage_and_commit("local.txt", "mine\n")?;
    setup.local.stage_and_commit("local2.txt", "also mine\n")?;

    let outcome = sync_repo(setup.local.path(), &instant())?;
    assert_eq!(outcome, SyncOutcome::Pushed { commits: 2 });
    assert_eq!(setup.local.head()?, setup.origin_main()?);

    Ok(())
}

#[test]
fn sync_merges_diverged_histories() -> Result<()> {
    let setup = SyncSetup::new()?;
    setup.publish("theirs.txt", "theirs\n")?;
    setup.local.stage_and_commit("ours.txt", "ours\n")?;

    let outcome = sync_repo(setup.local.path(), &instant())?;
    assert_eq!(outcome, SyncOutcome::Merged);

    let head = setup.local.repo().head()?.peel_to_commit()?;
    assert_eq!(head.parent_count(), 2);
    assert_eq!(head.id(), setup.origin_main()?);
    assert!(setup.local.path().join("theirs.txt").is_file());
    assert!(setup.local.path().join("ours.txt").is_file());

    Ok(())
}

#[test]
fn sync_preserves_local_commits_on_conflict() -> Result<()> {
    let setup = SyncSetup::new()?;
    setup.publish("README.md", "theirs\n")?;
    let ours = setup.local.stage_and_commit("README.md", "ours\n")?;

    let outcome = sync_repo(setup.local.path(), &instant())?;
    let branch = match outcome {
        SyncOutcome::Conflict { branch } => branch,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert!(branch.starts_with("conflict/main-"));

    let preserved = setup
        .local
        .repo()
        .find_branch(&branch, git2::BranchType::Local)?;
    assert_eq!(preserved.get().target(), Some(ours));
    assert_eq!(setup.local.head()?, setup.origin_main()?);
    assert_eq!(fs::read_to_string(setup.local.path().join("README.md"))?, "theirs\n");

    Ok(())
}

#[test]
fn sync_refuses_dirty_working_tree() -> Result<()> {
    let setup = SyncSetup::new()?;
    fs::write(setup.local.path().join("scratch.txt"), "wip")?;

    let result = sync_repo(setup.local.path(), &instant());
    assert!(matches!(result, Err(SyncError::Dirty(_))));

    Ok(())
}

#[test]
fn dotfiles_checkout_backs_up_conflicting_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = RepoFixture::new(dir.path().join("source.git"), RepoKind::Bare)?;
    source.stage_and_commit(".bashrc", "export EDITOR=vim\n")?;
    source.stage_and_commit(".config/git/config", "[user]\n")?;
    source.stage_and_commit(".profile", "same\n")?;

    let home = dir.path().join("home");
    fs::create_dir_all(&home)?;
    fs::write(home.join(".bashrc"), "old\n")?;
    fs::write(home.join(".profile"), "same\n")?;

    let layout = DotfilesLayout::with_home(&home);
    let repo = git2::build::RepoBuilder::new()
        .bare(true)
        .clone(&source.path().to_string_lossy(), &layout.git_dir)?;
    dotfiles::configure(&repo)?;

    let report = dotfiles::checkout(&repo, &layout)?;
    assert_eq!(report.tracked, 3);
    assert_eq!(report.backed_up, vec![PathBuf::from(".bashrc")]);
    assert_eq!(fs::read_to_string(home.join(".bashrc"))?, "export EDITOR=vim\n");
    assert_eq!(fs::read_to_string(home.join(".config/git/config"))?, "[user]\n");
    assert_eq!(fs::read_to_string(layout.backup_dir.join(".bashrc"))?, "old\n");
    assert!(!layout.backup_dir.join(".profile").exists());
    assert!(dotfiles::open_existing(&layout.git_dir).is_some());

    Ok(())
}
