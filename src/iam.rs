// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! AWS group-permission reports.
//!
//! Works on an exported JSON document listing every IAM group along with the
//! inline and attached policies of that group. For each group, a report lists
//! policy names, the number of distinct allowed actions, and the other groups
//! whose permissions are fully covered by it.
//!
//! See [`coverage`] for the rules that decide whether one group covers
//! another.

pub mod coverage;
pub mod policy;

#[doc(inline)]
pub use coverage::*;
#[doc(inline)]
pub use policy::*;

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, instrument};

/// Named policy attached to a group.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedPolicy {
    pub policy_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_arn: Option<String>,

    pub policy_document: PolicyDocument,
}

/// Single group entry of an export.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupExport {
    pub group_name: String,

    #[serde(default)]
    pub inline_policies: Vec<NamedPolicy>,

    #[serde(default)]
    pub attached_policies: Vec<NamedPolicy>,
}

impl GroupExport {
    /// Every policy document of group, inline first.
    pub fn documents(&self) -> impl Iterator<Item = &PolicyDocument> {
        self.inline_policies
            .iter()
            .chain(self.attached_policies.iter())
            .map(|policy| &policy.policy_document)
    }

    /// Effective permission set of group.
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet::from_documents(self.documents())
    }
}

/// Report entry for one group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupReport {
    pub group_name: String,
    pub inline_policies: Vec<String>,
    pub attached_policies: Vec<String>,
    pub permission_count: usize,
    pub includes_groups: Vec<String>,
}

/// Load group export from JSON file.
///
/// # Errors
///
/// - Return [`IamError::Read`] if file cannot be read.
/// - Return [`IamError::Json`] if file content is not a valid export.
#[instrument(skip(path), level = "debug")]
pub fn load_export(path: impl AsRef<Path>) -> Result<Vec<GroupExport>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|err| IamError::Read {
        source: err,
        path: path.display().to_string(),
    })?;
    let groups: Vec<GroupExport> = serde_json::from_str(&data)?;
    debug!("loaded {} group(s) from {:?}", groups.len(), path.display());

    Ok(groups)
}

/// Build report for every group, in export order.
pub fn build_report(groups: &[GroupExport]) -> Vec<GroupReport> {
    let permissions = groups
        .iter()
        .map(GroupExport::permissions)
        .collect::<Vec<_>>();

    groups
        .iter()
        .zip(permissions.iter())
        .enumerate()
        .map(|(index, (group, own))| {
            let mut includes_groups = groups
                .iter()
                .zip(permissions.iter())
                .enumerate()
                .filter(|(other, (_, theirs))| *other != index && own.covers(theirs))
                .map(|(_, (other, _))| other.group_name.clone())
                .collect::<Vec<_>>();
            includes_groups.sort();

            GroupReport {
                group_name: group.group_name.clone(),
                inline_policies: sorted_names(&group.inline_policies),
                attached_policies: sorted_names(&group.attached_policies),
                permission_count: own.permission_count(),
                includes_groups,
            }
        })
        .collect()
}

fn sorted_names(policies: &[NamedPolicy]) -> Vec<String> {
    let mut names = policies
        .iter()
        .map(|policy| policy.policy_name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names
}

/// Result of comparing two groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// Group A covers group B.
    pub covers: bool,

    /// Grants of B that A does not cover, rendered.
    pub missing: Vec<String>,
}

/// Compare permissions of group `a` against group `b`.
///
/// # Errors
///
/// - Return [`IamError::UnknownGroup`] if either group is not in export.
pub fn compare(groups: &[GroupExport], a: &str, b: &str) -> Result<Comparison> {
    let find = |name: &str| {
        groups
            .iter()
            .find(|group| group.group_name == name)
            .ok_or_else(|| IamError::UnknownGroup(name.into()))
    };
    let a = find(a)?.permissions();
    let b = find(b)?.permissions();

    Ok(Comparison {
        covers: a.covers(&b),
        missing: a
            .missing_grants(&b)
            .into_iter()
            .map(ToString::to_string)
            .collect(),
    })
}

/// IAM report error types.
#[derive(Debug, thiserror::Error)]
pub enum IamError {
    /// Export file cannot be read.
    #[error("failed to read IAM export {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Export file is not valid.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Group is missing from export.
    #[error("group {0:?} not found in export")]
    UnknownGroup(String),
}

/// Friendly result alias :3
pub type Result<T, E = IamError> = std::result::Result<T, E>;
