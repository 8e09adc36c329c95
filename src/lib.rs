// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Operator toolbox.
//!
//! A collection of small tools for keeping a workstation in order:
//!
//! - [`cleanup`]: resumable wizard that sorts and tidies a directory of
//!   repositories.
//! - [`sync`]: bring repositories in line with their upstream, preserving
//!   local work on conflict.
//! - [`dotfiles`]: install dotfiles from a bare-alias repository.
//! - [`iam`]: report which AWS groups cover the permissions of others.
//! - [`assess`]: disk usage assessment of a directory tree.
//! - [`analyze`]: outline of a codebase for getting up to speed on it.
//! - [`workbook`]: Excel workbooks from dated CSV exports.
//! - [`mremote`]: mRemoteNG connection files from a host inventory.

pub mod analyze;
pub mod assess;
pub mod cleanup;
pub mod config;
pub mod dotfiles;
pub mod git;
pub mod iam;
pub mod mremote;
pub mod path;
pub mod sync;
pub mod workbook;
