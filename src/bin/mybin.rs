// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use mybin::{
    analyze,
    assess::{assess, AssessOptions},
    cleanup::{
        forge::GhForge, inspect::Git2Inspector, CleanupManager, CleanupOptions, InquireDecider,
        StateStore,
    },
    config::ToolConfig,
    dotfiles::{self, DotfilesLayout, Shell},
    iam, mremote,
    path::{default_config_path, default_data_dir, home_dir},
    sync::{sync_repo, RetryPolicy},
    workbook,
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::{
    fs::{read_to_string, OpenOptions},
    path::{Path, PathBuf},
    process::exit,
    sync::Mutex,
    time::Duration,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "mybin [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Append log output to file as well.
    #[arg(long, global = true, value_name = "path")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;
        match self.command {
            Command::Cleanup(opts) => run_cleanup(opts, &config),
            Command::Sync(opts) => run_sync(opts, &config),
            Command::Dotfiles(opts) => run_dotfiles(opts, &config),
            Command::Iam(opts) => run_iam(opts),
            Command::Assess(opts) => run_assess(opts, &config),
            Command::Analyze(opts) => run_analyze(opts),
            Command::Workbook(opts) => run_workbook(opts, &config),
            Command::Mremote(opts) => run_mremote(opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Sort and tidy a directory of repositories.
    #[command(subcommand)]
    Cleanup(CleanupCommand),

    /// Sync repositories with their upstream.
    #[command(override_usage = "mybin sync [options] <repo>...")]
    Sync(SyncOptions),

    /// Install dotfiles from bare repository.
    #[command(subcommand)]
    Dotfiles(DotfilesCommand),

    /// Report on AWS group permissions.
    #[command(subcommand)]
    Iam(IamCommand),

    /// Assess disk usage of directory tree.
    #[command(override_usage = "mybin assess [options] <root>")]
    Assess(AssessArgs),

    /// Outline codebase for getting up to speed on it.
    #[command(override_usage = "mybin analyze [options] <root>")]
    Analyze(AnalyzeArgs),

    /// Build Excel workbooks from dated CSV exports.
    #[command(override_usage = "mybin workbook [options] [<name>]...")]
    Workbook(WorkbookOptions),

    /// Generate mRemoteNG connection file from host inventory.
    #[command(override_usage = "mybin mremote [options] <inventory>")]
    Mremote(MremoteOptions),
}

#[derive(Debug, Clone, Subcommand)]
enum CleanupCommand {
    /// Classify child folders without changing anything.
    Scan {
        /// Directory whose child folders get classified.
        #[arg(value_name = "root")]
        root: PathBuf,
    },

    /// Run interactive cleanup wizard.
    Run {
        /// Directory whose child folders get visited.
        #[arg(value_name = "root")]
        root: PathBuf,

        /// Revisit folders that failed in a previous run.
        #[arg(long)]
        retry_failed: bool,

        /// Discard previous progress first.
        #[arg(long)]
        reset: bool,
    },

    /// Summarize saved cleanup progress.
    Status {
        /// Only count folders below this directory.
        #[arg(value_name = "root")]
        root: Option<PathBuf>,
    },
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Repositories to sync.
    #[arg(required = true, value_name = "repo")]
    pub repos: Vec<PathBuf>,

    /// Attempts per network operation.
    #[arg(short, long, value_name = "n")]
    pub attempts: Option<u32>,

    /// Base backoff in seconds between attempts.
    #[arg(short, long, value_name = "secs")]
    pub backoff: Option<u64>,
}

#[derive(Debug, Clone, Subcommand)]
enum DotfilesCommand {
    /// Clone dotfiles, check them out, and set up shell alias.
    Install {
        /// URL of dotfiles repository.
        #[arg(short, long, value_name = "url")]
        url: Option<String>,

        /// Path to bare repository.
        #[arg(long, value_name = "path")]
        git_dir: Option<PathBuf>,

        /// Path to work tree alias.
        #[arg(long, value_name = "path")]
        work_tree: Option<PathBuf>,

        /// Leave shell rc file alone.
        #[arg(long)]
        no_shell: bool,
    },

    /// Install shell alias for dotfiles repository.
    Shell {
        /// Shell to set up.
        #[arg(short, long, value_enum)]
        shell: Option<Shell>,

        /// Name of alias.
        #[arg(short, long, value_name = "name")]
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum IamCommand {
    /// Report permissions and covered groups of every group.
    Report {
        /// Exported groups with their policies, as JSON.
        #[arg(value_name = "export.json")]
        export: PathBuf,

        /// Write report to file instead of stdout.
        #[arg(short, long, value_name = "path")]
        output: Option<PathBuf>,
    },

    /// Check if group A covers every permission of group B.
    Compare {
        /// Exported groups with their policies, as JSON.
        #[arg(value_name = "export.json")]
        export: PathBuf,

        #[arg(value_name = "group_a")]
        group_a: String,

        #[arg(value_name = "group_b")]
        group_b: String,
    },
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AssessArgs {
    /// Directory to assess.
    #[arg(value_name = "root")]
    pub root: PathBuf,

    /// Directory to write reports into.
    #[arg(short, long, value_name = "path", default_value = ".")]
    pub output_dir: PathBuf,

    /// Minimum size in MiB of large files.
    #[arg(long, value_name = "n")]
    pub threshold_mb: Option<u64>,

    /// Number of large files to list.
    #[arg(long, value_name = "n")]
    pub top: Option<usize>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AnalyzeArgs {
    /// Repository to analyze.
    #[arg(value_name = "root", default_value = ".")]
    pub root: PathBuf,

    /// Directory to write analysis into.
    #[arg(short, long, value_name = "path", default_value = "analysis")]
    pub output_dir: PathBuf,

    /// Only write the Markdown summary.
    #[arg(long)]
    pub summary_only: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct WorkbookOptions {
    /// Workbooks to build, all configured ones if empty.
    #[arg(value_name = "name")]
    pub names: Vec<String>,

    /// Mark output files as dry run.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MremoteOptions {
    /// CSV inventory of hosts.
    #[arg(value_name = "inventory.csv")]
    pub inventory: PathBuf,

    /// Path of generated connection file.
    #[arg(short, long, value_name = "path", default_value = "confCons.xml")]
    pub output: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let (file_layer, file_error) = match cli.log_file.as_deref().map(open_log_file).transpose() {
        Ok(file) => (
            file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            None,
        ),
        Err(error) => (None, Some(error)),
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(file_layer)
        .with(filter)
        .init();

    if let Some(error) = file_error {
        warn!("{error:?}");
    }

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent)
            .with_context(|| format!("failed to create log directory {:?}", parent.display()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {:?}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<ToolConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        debug!("no configuration at {:?}, use defaults", path.display());
        return Ok(ToolConfig::default());
    }

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read configuration {:?}", path.display()))?;
    data.parse::<ToolConfig>()
        .with_context(|| format!("invalid configuration {:?}", path.display()))
}

fn run_cleanup(command: CleanupCommand, config: &ToolConfig) -> Result<()> {
    let state_dir = match &config.cleanup.state_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let store = StateStore::new(state_dir);

    match command {
        CleanupCommand::Scan { root } => {
            let manager = cleanup_manager(store, config, false);
            for (folder, category) in manager.scan(root)? {
                println!("{:<22} {}", category.as_str(), folder.display());
            }
        }
        CleanupCommand::Run {
            root,
            retry_failed,
            reset,
        } => {
            if reset {
                store.reset()?;
                info!("discarded previous cleanup progress");
            }

            let manager = cleanup_manager(store, config, retry_failed);
            let visits = manager.run(root, &mut InquireDecider)?;
            info!("visited {} folder(s)", visits.len());

            let state = manager.store().load()?;
            println!("{}", state.summary(None));
        }
        CleanupCommand::Status { root } => {
            let root = root.map(|root| root.canonicalize().unwrap_or(root));
            let state = store.load()?;
            if state.is_empty() {
                info!("no cleanup progress recorded yet");
            }
            println!("{}", state.summary(root.as_deref()));
        }
    }

    Ok(())
}

fn cleanup_manager(store: StateStore, config: &ToolConfig, retry_failed: bool) -> CleanupManager {
    let options = CleanupOptions {
        owners: config.github.owners(),
        github_user: config.github.user.clone(),
        archive_dir: config.cleanup.archive_dir.clone(),
        retry_failed,
    };

    CleanupManager::new(Git2Inspector, GhForge, store, options)
}

fn run_sync(opts: SyncOptions, config: &ToolConfig) -> Result<()> {
    let policy = RetryPolicy {
        attempts: opts.attempts.unwrap_or(config.sync.attempts),
        backoff: Duration::from_secs(opts.backoff.unwrap_or(config.sync.backoff_secs)),
    };

    let mut failed = 0;
    for repo in &opts.repos {
        match sync_repo(repo, &policy) {
            Ok(outcome) => info!("{}: {outcome}", repo.display()),
            Err(err) => {
                error!("{}: {:?}", repo.display(), anyhow!(err));
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} repositories failed to sync", opts.repos.len());
    }

    Ok(())
}

fn dotfiles_layout(config: &ToolConfig, home: &Path) -> DotfilesLayout {
    let mut layout = DotfilesLayout::with_home(home);
    if let Some(git_dir) = &config.dotfiles.git_dir {
        layout.git_dir = git_dir.clone();
    }
    if let Some(work_tree) = &config.dotfiles.work_tree {
        layout.work_tree = work_tree.clone();
    }
    if let Some(backup_dir) = &config.dotfiles.backup_dir {
        layout.backup_dir = backup_dir.clone();
    }

    layout
}

fn run_dotfiles(command: DotfilesCommand, config: &ToolConfig) -> Result<()> {
    let home = home_dir()?;
    let mut layout = dotfiles_layout(config, &home);

    match command {
        DotfilesCommand::Install {
            url,
            git_dir,
            work_tree,
            no_shell,
        } => {
            if let Some(git_dir) = git_dir {
                layout.git_dir = git_dir;
            }
            if let Some(work_tree) = work_tree {
                layout.work_tree = work_tree;
            }

            let repo = match dotfiles::open_existing(&layout.git_dir) {
                Some(repo) => {
                    info!("use existing repository at {:?}", layout.git_dir.display());
                    repo
                }
                None => {
                    let url = url
                        .or_else(|| config.dotfiles.url.clone())
                        .ok_or_else(|| anyhow!("no dotfiles URL given or configured"))?;
                    dotfiles::clone_bare(url, &layout.git_dir, ProgressBar::no_length())?
                }
            };
            dotfiles::configure(&repo)?;

            let report = dotfiles::checkout(&repo, &layout)?;
            if !report.backed_up.is_empty() {
                warn!(
                    "moved {} conflicting file(s) into {:?}",
                    report.backed_up.len(),
                    layout.backup_dir.display()
                );
            }

            if !no_shell {
                let shell = config.dotfiles.shell.unwrap_or_else(Shell::detect);
                install_alias(shell, &config.dotfiles.alias, &layout, &home)?;
            }
        }
        DotfilesCommand::Shell { shell, alias } => {
            let shell = shell
                .or(config.dotfiles.shell)
                .unwrap_or_else(Shell::detect);
            let alias = alias.unwrap_or_else(|| config.dotfiles.alias.clone());
            install_alias(shell, &alias, &layout, &home)?;
        }
    }

    Ok(())
}

fn install_alias(shell: Shell, alias: &str, layout: &DotfilesLayout, home: &Path) -> Result<()> {
    let block = dotfiles::shell_block(shell, alias, &layout.git_dir, &layout.work_tree);
    let rc_file = shell.rc_file(home);
    if dotfiles::install_shell_block(&rc_file, &block)? {
        info!("added {alias} alias to {:?}, restart {shell} to use it", rc_file.display());
    }

    Ok(())
}

fn run_iam(command: IamCommand) -> Result<()> {
    match command {
        IamCommand::Report { export, output } => {
            let groups = iam::load_export(export)?;
            let report = iam::build_report(&groups);
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json + "\n")
                        .with_context(|| format!("failed to write {:?}", path.display()))?;
                    info!("wrote report of {} group(s) to {:?}", report.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        IamCommand::Compare {
            export,
            group_a,
            group_b,
        } => {
            let groups = iam::load_export(export)?;
            let comparison = iam::compare(&groups, &group_a, &group_b)?;
            if comparison.covers {
                println!("{group_a} covers every permission of {group_b}");
            } else {
                println!("{group_a} does not cover {group_b}, missing:");
                for grant in comparison.missing {
                    println!("  {grant}");
                }
            }
        }
    }

    Ok(())
}

fn run_assess(opts: AssessArgs, config: &ToolConfig) -> Result<()> {
    let options = AssessOptions::with_threshold_mb(
        opts.threshold_mb.unwrap_or(config.assess.threshold_mb),
        opts.top.unwrap_or(config.assess.top),
    );

    let assessment = assess(&opts.root, &options)?;
    let stamp = Local::now().format("%Y%m%d_%H%M").to_string();
    assessment.write_reports(&opts.output_dir, &stamp)?;
    print!("{}", assessment.render_text());

    Ok(())
}

fn run_analyze(opts: AnalyzeArgs) -> Result<()> {
    let analysis = analyze::analyze(&opts.root)?;
    let written = analysis.write_reports(&opts.output_dir, opts.summary_only)?;
    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}

fn run_workbook(opts: WorkbookOptions, config: &ToolConfig) -> Result<()> {
    if config.workbooks.is_empty() {
        bail!("no workbook definitions configured");
    }

    let definitions = if opts.names.is_empty() {
        config.workbooks.iter().collect::<Vec<_>>()
    } else {
        opts.names
            .iter()
            .map(|name| {
                config
                    .workbook(name)
                    .ok_or_else(|| anyhow!("no workbook named {name:?} configured"))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let stamp = Local::now().format("%Y%m%d_%H%M").to_string();
    if opts.dry_run {
        info!("dry run, output files get marked with _dryrun");
    }
    for definition in definitions {
        workbook::generate(definition, &stamp, opts.dry_run)?;
    }

    Ok(())
}

fn run_mremote(opts: MremoteOptions) -> Result<()> {
    let connections = mremote::load_inventory(&opts.inventory)?;
    let xml = mremote::render_conf(&connections);
    mremote::write_conf(&opts.output, &xml)?;

    Ok(())
}
