// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Aggregates the results of a hierarchical test execution and writes one XML report per root
//! node once that root finishes.
//!
//! The flow of data is:
//!
//! 1. A test runner drives a [`TestExecutionListener`](events::TestExecutionListener) with
//!    lifecycle notifications.
//! 2. [`XmlReportListener`](listener::XmlReportListener) forwards those notifications to a
//!    [`ResultStore`](store::ResultStore) scoped to the current [`TestPlan`](plan::TestPlan).
//! 3. When a root node is skipped or finishes, the store is handed to a
//!    [`ReportSerializer`](serializer::ReportSerializer) which writes the report file.

pub mod config;
pub mod errors;
pub mod events;
pub mod listener;
pub mod node;
pub mod plan;
pub mod replay;
pub mod serializer;
pub mod store;
pub mod time;
