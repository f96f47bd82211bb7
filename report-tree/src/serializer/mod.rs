// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering a finished tree into a report.
//!
//! The listener only knows about the [`ReportSerializer`] trait. [`LegacyJunitSerializer`] is
//! the stock implementation, producing JUnit XML in the layout most CI systems understand.

mod junit;

pub use junit::LegacyJunitSerializer;

use crate::{errors::SerializeReportError, node::TestNode, store::ReportView};
use std::io;

/// Renders the results under one root node into a byte sink.
pub trait ReportSerializer: Send + Sync {
    /// Writes the report for `root` to `out`.
    ///
    /// The caller owns `out` and is responsible for flushing and closing it.
    fn write_report(
        &self,
        view: &ReportView<'_>,
        root: &TestNode,
        out: &mut dyn io::Write,
    ) -> Result<(), SerializeReportError>;
}
