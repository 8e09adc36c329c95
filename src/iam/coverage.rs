// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Permission coverage between groups.
//!
//! A __grant__ is an (action, resource, condition) triple allowed by a policy
//! statement. Group A covers group B when every grant of B is proven by an
//! allow statement of A, and no deny statement of A may block it.
//!
//! # Pattern Semantics
//!
//! Actions and resources are wildcard patterns where `*` matches any sequence
//! and `?` matches a single character, anywhere in the pattern. Actions are
//! compared case-insensitively, resources case-sensitively.
//!
//! The checks here are deliberately one-sided: a grant is only reported as
//! covered when that provably holds. Whenever a statement cannot be reasoned
//! about precisely, e.g., "NotAction" in the covering group or a conditional
//! deny, coverage is refused rather than assumed.

use crate::iam::policy::{Effect, PolicyDocument, Statement};

use serde_json::Value;
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Single allowed (action, resource, condition) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    /// Lowercased action pattern.
    pub action: String,

    /// Resource pattern.
    pub resource: String,

    /// Condition block the grant is subject to.
    pub condition: Option<Value>,

    /// Grant stems from a "NotAction"/"NotResource" statement, and stands in
    /// for everything.
    pub broad: bool,
}

impl Display for Grant {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.broad {
            write!(fmt, "NotAction/NotResource statement")?;
        } else {
            write!(fmt, "{} on {}", self.action, self.resource)?;
        }
        if self.condition.is_some() {
            write!(fmt, " (conditional)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DenyRule {
    actions: Vec<String>,
    not_actions: Vec<String>,
    resources: Vec<String>,
    not_resources: Vec<String>,
    conditional: bool,
}

impl DenyRule {
    /// Check if deny might apply to grant.
    fn may_block(&self, grant: &Grant) -> bool {
        if self.conditional || grant.broad {
            return true;
        }

        let action_hit = if self.not_actions.is_empty() {
            self.actions
                .iter()
                .any(|action| patterns_overlap(action, &grant.action))
        } else {
            !self
                .not_actions
                .iter()
                .any(|action| pattern_covers(action, &grant.action))
        };

        let resource_hit = if self.not_resources.is_empty() {
            self.resources
                .iter()
                .any(|resource| patterns_overlap(resource, &grant.resource))
        } else {
            !self
                .not_resources
                .iter()
                .any(|resource| pattern_covers(resource, &grant.resource))
        };

        action_hit && resource_hit
    }
}

/// Effective permission set of a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionSet {
    grants: Vec<Grant>,
    denies: Vec<DenyRule>,
}

impl PermissionSet {
    /// Collect grants and deny rules from policy documents.
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a PolicyDocument>) -> Self {
        let mut set = Self::default();
        for statement in documents.into_iter().flat_map(PolicyDocument::statements) {
            set.add_statement(statement);
        }
        set
    }

    fn add_statement(&mut self, statement: &Statement) {
        match statement.effect {
            Effect::Allow if statement.is_negated() => self.grants.push(Grant {
                action: "*".into(),
                resource: "*".into(),
                condition: statement.condition.clone(),
                broad: true,
            }),
            Effect::Allow => {
                for action in statement.actions() {
                    for resource in statement.resources() {
                        self.grants.push(Grant {
                            action: action.to_lowercase(),
                            resource,
                            condition: statement.condition.clone(),
                            broad: false,
                        });
                    }
                }
            }
            Effect::Deny => {
                let lowercase = |values: &[String]| -> Vec<String> {
                    values.iter().map(|value| value.to_lowercase()).collect()
                };
                self.denies.push(DenyRule {
                    actions: lowercase(statement.actions()),
                    not_actions: statement
                        .not_action
                        .as_ref()
                        .map(|values| lowercase(values.as_slice()))
                        .unwrap_or_default(),
                    resources: statement.resources(),
                    not_resources: statement
                        .not_resource
                        .as_ref()
                        .map(|values| values.as_slice().to_vec())
                        .unwrap_or_default(),
                    conditional: statement.condition.is_some(),
                });
            }
        }
    }

    /// All allowed grants.
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Number of distinct allowed action patterns.
    pub fn permission_count(&self) -> usize {
        self.grants
            .iter()
            .filter(|grant| !grant.broad)
            .map(|grant| grant.action.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Check if a single grant is provably allowed by this set.
    pub fn covers_grant(&self, grant: &Grant) -> bool {
        let proven = self.grants.iter().filter(|own| !own.broad).any(|own| {
            pattern_covers(&own.action, &grant.action)
                && pattern_covers(&own.resource, &grant.resource)
                && (own.condition.is_none() || own.condition == grant.condition)
        });

        proven && !self.denies.iter().any(|deny| deny.may_block(grant))
    }

    /// Grants of other set that this set does not provably cover.
    pub fn missing_grants<'a>(&self, other: &'a PermissionSet) -> Vec<&'a Grant> {
        other
            .grants
            .iter()
            .filter(|grant| !self.covers_grant(grant))
            .collect()
    }

    /// Check if this set covers every grant of other set.
    ///
    /// Sets without any grant are never considered covered.
    pub fn covers(&self, other: &PermissionSet) -> bool {
        !other.grants.is_empty() && self.missing_grants(other).is_empty()
    }
}

/// Check if every string matched by `q` is also matched by `p`.
pub fn pattern_covers(p: &str, q: &str) -> bool {
    let p = p.chars().collect::<Vec<_>>();
    let q = q.chars().collect::<Vec<_>>();

    // covers[i][j]: p[i..] covers q[j..]
    let mut covers = vec![vec![false; q.len() + 1]; p.len() + 1];
    covers[p.len()][q.len()] = true;
    for i in (0..p.len()).rev() {
        for j in (0..=q.len()).rev() {
            covers[i][j] = match p[i] {
                '*' => covers[i + 1][j] || (j < q.len() && covers[i][j + 1]),
                _ if j == q.len() || q[j] == '*' => false,
                '?' => covers[i + 1][j + 1],
                _ if q[j] == '?' => false,
                literal => literal == q[j] && covers[i + 1][j + 1],
            };
        }
    }

    covers[0][0]
}

/// Check if some string is matched by both `a` and `b`.
pub fn patterns_overlap(a: &str, b: &str) -> bool {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();

    // overlap[i][j]: a[i..] and b[j..] share a match
    let mut overlap = vec![vec![false; b.len() + 1]; a.len() + 1];
    for i in (0..=a.len()).rev() {
        for j in (0..=b.len()).rev() {
            if i == a.len() && j == b.len() {
                overlap[i][j] = true;
                continue;
            }

            let mut result = false;
            if i < a.len() && a[i] == '*' {
                result |= overlap[i + 1][j] || (j < b.len() && overlap[i][j + 1]);
            }
            if j < b.len() && b[j] == '*' {
                result |= overlap[i][j + 1] || (i < a.len() && overlap[i + 1][j]);
            }
            if i < a.len() && j < b.len() && a[i] != '*' && b[j] != '*' {
                let compatible = a[i] == '?' || b[j] == '?' || a[i] == b[j];
                result |= compatible && overlap[i + 1][j + 1];
            }
            overlap[i][j] = result;
        }
    }

    overlap[0][0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    fn set(json: &str) -> PermissionSet {
        let document: PolicyDocument = serde_json::from_str(json).unwrap();
        PermissionSet::from_documents([&document])
    }

    #[test_case("s3:GetObject", "s3:GetObject", true; "identical literals")]
    #[test_case("s3:*", "s3:GetObject", true; "trailing wildcard")]
    #[test_case("s3:Get*", "s3:*", false; "narrow wildcard never covers wide one")]
    #[test_case("s3:*Object", "s3:GetObject", true; "leading wildcard")]
    #[test_case("s3:Get?bject", "s3:GetObject", true; "single character wildcard")]
    #[test_case("s3:GetObject", "s3:Get?bject", false; "literal never covers wildcard")]
    #[test_case("*", "s3:*", true; "star covers everything")]
    #[test_case("s3:*", "s3", false; "prefix is not enough")]
    #[test_case("arn:aws:s3:::bucket/*", "arn:aws:s3:::bucket/a/*", true; "nested resource")]
    #[test]
    fn pattern_covers_cases(p: &str, q: &str, expect: bool) {
        pretty_assertions::assert_eq!(pattern_covers(p, q), expect);
    }

    #[test_case("s3:Get*", "s3:*Object", true; "both wildcards meet")]
    #[test_case("s3:Get*", "ec2:*", false; "different services")]
    #[test_case("*", "anything", true; "star overlaps everything")]
    #[test_case("a?c", "abc", true; "single character wildcard")]
    #[test_case("ab", "abc", false; "different lengths")]
    #[test]
    fn patterns_overlap_cases(a: &str, b: &str, expect: bool) {
        pretty_assertions::assert_eq!(patterns_overlap(a, b), expect);
    }

    #[test]
    fn wildcard_group_covers_specific_group() {
        let admin = set(r#"{ "Statement": { "Effect": "Allow", "Action": "s3:*", "Resource": "*" } }"#);
        let reader = set(
            r#"{ "Statement": { "Effect": "Allow", "Action": ["S3:GetObject", "s3:ListBucket"], "Resource": "arn:aws:s3:::data/*" } }"#,
        );

        assert!(admin.covers(&reader));
        assert!(!reader.covers(&admin));
        pretty_assertions::assert_eq!(reader.permission_count(), 2);
    }

    #[test]
    fn deny_blocks_coverage() {
        let admin = set(
            r#"{ "Statement": [
                { "Effect": "Allow", "Action": "s3:*", "Resource": "*" },
                { "Effect": "Deny", "Action": "s3:Delete*", "Resource": "arn:aws:s3:::data/*" }
            ] }"#,
        );
        let deleter = set(
            r#"{ "Statement": { "Effect": "Allow", "Action": "s3:DeleteObject", "Resource": "arn:aws:s3:::data/old" } }"#,
        );
        let reader = set(
            r#"{ "Statement": { "Effect": "Allow", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::data/old" } }"#,
        );

        assert!(!admin.covers(&deleter));
        assert!(admin.covers(&reader));
    }

    #[test_case(
        r#"{ "Effect": "Deny", "NotAction": "iam:*", "Resource": "*" }"#,
        "s3:GetObject", "*", false;
        "not action deny blocks anything outside its list"
    )]
    #[test_case(
        r#"{ "Effect": "Deny", "NotAction": "iam:*", "Resource": "*" }"#,
        "iam:ListUsers", "*", true;
        "not action deny spares its list"
    )]
    #[test_case(
        r#"{ "Effect": "Deny", "Action": "*", "NotResource": "arn:aws:s3:::public/*" }"#,
        "s3:GetObject", "arn:aws:s3:::public/logo.png", true;
        "not resource deny spares its list"
    )]
    #[test_case(
        r#"{ "Effect": "Deny", "Action": "*", "NotResource": "arn:aws:s3:::public/*" }"#,
        "s3:GetObject", "arn:aws:s3:::private/keys", false;
        "not resource deny blocks anything outside its list"
    )]
    #[test_case(
        r#"{ "Effect": "Deny", "Action": "ec2:*", "Condition": { "Bool": { "aws:SecureTransport": "false" } } }"#,
        "s3:GetObject", "*", false;
        "conditional deny blocks every grant"
    )]
    #[test]
    fn deny_statements_against_full_access(deny: &str, action: &str, resource: &str, expect: bool) {
        let guarded = set(&format!(
            r#"{{ "Statement": [ {{ "Effect": "Allow", "Action": "*", "Resource": "*" }}, {deny} ] }}"#
        ));
        let member = set(&format!(
            r#"{{ "Statement": {{ "Effect": "Allow", "Action": "{action}", "Resource": "{resource}" }} }}"#
        ));

        pretty_assertions::assert_eq!(guarded.covers(&member), expect);
    }

    #[test]
    fn not_action_allow_needs_full_access() {
        let power = set(r#"{ "Statement": { "Effect": "Allow", "NotAction": "iam:*", "Resource": "*" } }"#);
        let admin = set(r#"{ "Statement": { "Effect": "Allow", "Action": "*", "Resource": "*" } }"#);
        let reader = set(r#"{ "Statement": { "Effect": "Allow", "Action": "s3:GetObject" } }"#);

        assert!(admin.covers(&power));
        assert!(!power.covers(&reader));
        pretty_assertions::assert_eq!(power.permission_count(), 0);
    }

    #[test]
    fn conditions_must_match() {
        let conditional = set(
            r#"{ "Statement": { "Effect": "Allow", "Action": "ec2:*", "Condition": { "Bool": { "aws:MultiFactorAuthPresent": "true" } } } }"#,
        );
        let plain = set(r#"{ "Statement": { "Effect": "Allow", "Action": "ec2:StartInstances" } }"#);
        let same_condition = set(
            r#"{ "Statement": { "Effect": "Allow", "Action": "ec2:StartInstances", "Condition": { "Bool": { "aws:MultiFactorAuthPresent": "true" } } } }"#,
        );

        assert!(!conditional.covers(&plain));
        assert!(conditional.covers(&same_condition));
        assert!(plain.covers(&same_condition));
    }

    #[test]
    fn empty_group_is_never_covered() {
        let admin = set(r#"{ "Statement": { "Effect": "Allow", "Action": "*", "Resource": "*" } }"#);
        let empty = set(r#"{ "Statement": [] }"#);

        assert!(!admin.covers(&empty));
        pretty_assertions::assert_eq!(admin.missing_grants(&empty).len(), 0);
    }

    #[test]
    fn missing_grants_lists_uncovered_triples() {
        let reader = set(r#"{ "Statement": { "Effect": "Allow", "Action": "s3:Get*" } }"#);
        let writer = set(r#"{ "Statement": { "Effect": "Allow", "Action": ["s3:GetObject", "s3:PutObject"] } }"#);

        let missing = reader
            .missing_grants(&writer)
            .into_iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        pretty_assertions::assert_eq!(missing, vec!["s3:putobject on *"]);
    }
}
