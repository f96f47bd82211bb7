// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::ResultStore;
use crate::{
    events::{ExecutionOutcome, ReportEntry},
    node::{TestNode, TestNodeId},
    plan::TestPlan,
};
use chrono::{DateTime, FixedOffset};

/// A read-only view of a [`ResultStore`] and the plan it belongs to, handed to serializers.
#[derive(Clone, Copy, Debug)]
pub struct ReportView<'a> {
    store: &'a ResultStore,
    plan: &'a TestPlan,
}

impl<'a> ReportView<'a> {
    /// Creates a new view.
    pub fn new(store: &'a ResultStore, plan: &'a TestPlan) -> Self {
        Self { store, plan }
    }

    /// See [`ResultStore::is_effectively_skipped`].
    pub fn is_effectively_skipped(&self, node: &TestNodeId) -> bool {
        self.store.is_effectively_skipped(node)
    }

    /// See [`ResultStore::skip_reason`].
    pub fn skip_reason(&self, node: &TestNodeId) -> Option<String> {
        self.store.skip_reason(node)
    }

    /// See [`ResultStore::duration_seconds`].
    pub fn duration_seconds(&self, node: &TestNodeId) -> f64 {
        self.store.duration_seconds(node)
    }

    /// See [`ResultStore::finished_ancestor_results`].
    pub fn finished_ancestor_results(&self, node: &TestNodeId) -> Vec<ExecutionOutcome> {
        self.store.finished_ancestor_results(node)
    }

    /// See [`ResultStore::diagnostics`].
    pub fn diagnostics(&self, node: &TestNodeId) -> Vec<ReportEntry> {
        self.store.diagnostics(node)
    }

    /// See [`ResultStore::start_time`].
    pub fn start_time(&self, node: &TestNodeId) -> Option<DateTime<FixedOffset>> {
        self.store.start_time(node)
    }

    /// Returns the parent of `node`.
    pub fn parent_of(&self, node: &TestNodeId) -> Option<TestNodeId> {
        self.store.parent_of(node)
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: &TestNodeId) -> Option<TestNode> {
        self.plan.get(id)
    }

    /// Returns the direct children of `node`.
    pub fn children(&self, node: &TestNodeId) -> Vec<TestNode> {
        self.plan.children(node)
    }

    /// Returns every descendant of `node`, depth-first.
    pub fn descendants(&self, node: &TestNodeId) -> Vec<TestNode> {
        self.plan.descendants(node)
    }

    /// Returns the time at which the report is being produced.
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.store.clock().now()
    }
}
