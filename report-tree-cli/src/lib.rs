// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `report-tree` command-line tool.
//!
//! This crate is not meant to be depended on as a library. Its interface is the `report-tree`
//! binary.

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::ReportTreeApp;
#[doc(hidden)]
pub use errors::{ExpectedError, ReportTreeExitCode};
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
