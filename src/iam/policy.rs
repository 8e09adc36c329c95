// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! IAM policy document layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field that holds either one value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// View values as slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values.as_slice(),
        }
    }
}

/// IAM policy document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub statement: OneOrMany<Statement>,
}

impl PolicyDocument {
    /// Statements of document.
    pub fn statements(&self) -> &[Statement] {
        self.statement.as_slice()
    }
}

/// Effect of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Single policy statement.
///
/// A missing resource element means every resource.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<OneOrMany<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl Statement {
    /// Listed actions, empty if statement uses "NotAction".
    pub fn actions(&self) -> &[String] {
        self.action.as_ref().map(OneOrMany::as_slice).unwrap_or(&[])
    }

    /// Listed resources, `["*"]` if neither resource element is present.
    pub fn resources(&self) -> Vec<String> {
        match (&self.resource, &self.not_resource) {
            (Some(resource), _) => resource.as_slice().to_vec(),
            (None, None) => vec!["*".into()],
            (None, Some(_)) => Vec::new(),
        }
    }

    /// Statement is phrased through "NotAction" or "NotResource".
    pub fn is_negated(&self) -> bool {
        self.not_action.is_some() || self.not_resource.is_some()
    }
}
