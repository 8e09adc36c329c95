// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that mybin uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! ```toml
//! [github]
//! user = "octocat"
//! orgs = ["octo-org"]
//!
//! [cleanup]
//! state_dir = "$XDG_DATA_HOME/mybin"
//! archive_dir = "~/Archive"
//!
//! [sync]
//! attempts = 3
//! backoff_secs = 2
//!
//! [dotfiles]
//! url = "git@github.com:octocat/dotfiles.git"
//! alias = "dotfiles"
//!
//! [[workbook]]
//! name = "Route53"
//! input_dir = "~/reports/route53"
//! output_dir = "~/reports/out"
//! required_columns = ["name", "type", "value"]
//! sheets = [{ prefix = "zone-a", sheet = "zone-a.com" }]
//! filter = { column = "type", values = ["NAME", "CNAME"] }
//! ```
//!
//! Every path field is shell expanded on load, so `~` and environment
//! variables may be used freely.

use crate::dotfiles::Shell;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Top-level configuration of all tools.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Identity of the operator on GitHub.
    pub github: GithubSettings,

    /// Repository cleanup wizard settings.
    pub cleanup: CleanupSettings,

    /// Repository sync retry policy.
    pub sync: SyncSettings,

    /// Dotfiles installer settings.
    pub dotfiles: DotfilesSettings,

    /// Data assessment settings.
    pub assess: AssessSettings,

    /// Workbook report definitions.
    #[serde(rename = "workbook", skip_serializing_if = "Vec::is_empty")]
    pub workbooks: Vec<WorkbookDefinition>,
}

impl ToolConfig {
    /// Find workbook definition by name.
    pub fn workbook(&self, name: impl AsRef<str>) -> Option<&WorkbookDefinition> {
        self.workbooks
            .iter()
            .find(|workbook| workbook.name == name.as_ref())
    }
}

impl FromStr for ToolConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: ToolConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        expand_optional(&mut config.cleanup.state_dir)?;
        expand_optional(&mut config.cleanup.archive_dir)?;
        expand_optional(&mut config.dotfiles.git_dir)?;
        expand_optional(&mut config.dotfiles.work_tree)?;
        expand_optional(&mut config.dotfiles.backup_dir)?;
        for workbook in &mut config.workbooks {
            workbook.input_dir = expand(&workbook.input_dir)?;
            workbook.output_dir = expand(&workbook.output_dir)?;
        }

        Ok(config)
    }
}

impl Display for ToolConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// GitHub identity of the operator.
///
/// Repositories whose remote owner matches the user or one of the
/// organizations are considered "mine" by the cleanup wizard.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubSettings {
    /// GitHub login of the operator.
    pub user: String,

    /// Organizations whose repositories count as the operator's own.
    pub orgs: Vec<String>,
}

impl GithubSettings {
    /// All owners considered to be the operator's own.
    pub fn owners(&self) -> Vec<String> {
        let mut owners = Vec::with_capacity(self.orgs.len() + 1);
        if !self.user.is_empty() {
            owners.push(self.user.clone());
        }
        owners.extend(self.orgs.iter().cloned());
        owners
    }
}

/// Cleanup wizard settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Directory holding the resumable cleanup state.
    pub state_dir: Option<PathBuf>,

    /// Directory that archived folders are moved into.
    pub archive_dir: Option<PathBuf>,
}

/// Retry policy for repository sync.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Number of attempts for each network operation.
    pub attempts: u32,

    /// Base backoff between attempts, multiplied by attempt number.
    pub backoff_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_secs: 2,
        }
    }
}

/// Dotfiles installer settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DotfilesSettings {
    /// Remote URL of the dotfiles repository.
    pub url: Option<String>,

    /// Location of the bare repository.
    pub git_dir: Option<PathBuf>,

    /// Work tree that dotfiles get checked out into.
    pub work_tree: Option<PathBuf>,

    /// Where conflicting pre-existing files are moved to.
    pub backup_dir: Option<PathBuf>,

    /// Name of the shell alias wrapping git for the bare repository.
    pub alias: String,

    /// Shell whose rc file receives the alias.
    pub shell: Option<Shell>,
}

impl Default for DotfilesSettings {
    fn default() -> Self {
        Self {
            url: None,
            git_dir: None,
            work_tree: None,
            backup_dir: None,
            alias: "dotfiles".into(),
            shell: None,
        }
    }
}

/// Data assessment settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssessSettings {
    /// Minimum size in MiB for a file to be listed as large.
    pub threshold_mb: u64,

    /// Maximum number of large files to list.
    pub top: usize,
}

impl Default for AssessSettings {
    fn default() -> Self {
        Self {
            threshold_mb: 100,
            top: 25,
        }
    }
}

/// Workbook report definition.
///
/// Input CSV files are named `<prefix>_<YYYYMMDD>.csv`. Each prefix is mapped
/// onto a fixed sheet name, or all prefixes are combined into one sheet.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct WorkbookDefinition {
    /// Name of the workbook, also used as output file stem.
    pub name: String,

    /// Directory to search for input CSV files.
    pub input_dir: PathBuf,

    /// Directory to write workbooks into.
    pub output_dir: PathBuf,

    /// Columns that every input file must provide.
    #[serde(default)]
    pub required_columns: Vec<String>,

    /// Fixed prefix to sheet name mapping.
    #[serde(default)]
    pub sheets: Vec<SheetMapping>,

    /// Combine every discovered prefix into a single sheet of this name.
    pub combine_into: Option<String>,

    /// Keep only rows whose column value is listed.
    pub filter: Option<RowFilter>,

    /// Columns to sort rows by.
    #[serde(default)]
    pub sort_by: Vec<String>,
}

/// Mapping of input CSV prefix to sheet name.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SheetMapping {
    /// Prefix of input CSV file name.
    pub prefix: String,

    /// Sheet to write rows of the prefix into.
    pub sheet: String,
}

/// Row filter by column value.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RowFilter {
    /// Column to inspect.
    pub column: String,

    /// Accepted values, compared case-insensitively.
    pub values: Vec<String>,
}

fn expand(path: &std::path::Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

fn expand_optional(path: &mut Option<PathBuf>) -> Result<()> {
    if let Some(inner) = path.as_mut() {
        *inner = expand(inner)?;
    }

    Ok(())
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
