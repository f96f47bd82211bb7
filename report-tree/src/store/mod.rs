// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrency-safe storage of execution results for one test plan.
//!
//! A [`ResultStore`] is created when a plan starts and dropped when it finishes. Worker threads
//! record starts, ends, outcomes, skips and diagnostic entries into it as nodes execute; once a
//! root finishes, a serializer reads it back through a [`ReportView`].
//!
//! Skips are resolved lazily: marking a container as skipped doesn't touch its descendants
//! (which may not even be registered yet). Instead, queries walk from a node up to the root
//! through the injected [`ParentLookup`] and stop at the first skipped node they find.

mod sharded;
mod view;

pub use view::ReportView;

use crate::{
    events::{CauseFormatter, ExecutionOutcome, ReportEntry, default_cause_formatter},
    node::TestNodeId,
    plan::ParentLookup,
    time::Clock,
};
use chrono::{DateTime, FixedOffset, Utc};
use sharded::ShardedMap;
use std::{fmt, sync::Arc};

/// Prefix applied to a skip reason inherited from an ancestor.
pub const INHERITED_SKIP_PREFIX: &str = "parent was skipped: ";

/// Execution facts for every node of one test plan.
pub struct ResultStore {
    tree: Arc<dyn ParentLookup>,
    clock: Arc<dyn Clock>,
    cause_formatter: CauseFormatter,
    finished: ShardedMap<ExecutionOutcome>,
    skipped: ShardedMap<String>,
    start_times: ShardedMap<DateTime<FixedOffset>>,
    end_times: ShardedMap<DateTime<FixedOffset>>,
    entries: ShardedMap<Vec<ReportEntry>>,
}

impl ResultStore {
    /// Creates an empty store for a tree, timestamping events with `clock`.
    pub fn new(tree: Arc<dyn ParentLookup>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tree,
            clock,
            cause_formatter: default_cause_formatter(),
            finished: ShardedMap::new(),
            skipped: ShardedMap::new(),
            start_times: ShardedMap::new(),
            end_times: ShardedMap::new(),
            entries: ShardedMap::new(),
        }
    }

    /// Sets the function used to turn abort causes into skip reasons.
    pub fn with_cause_formatter(mut self, cause_formatter: CauseFormatter) -> Self {
        self.cause_formatter = cause_formatter;
        self
    }

    /// Returns the clock used by this store.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ---
    // Mutations
    // ---

    /// Records that `node` was skipped. A missing reason is stored as an empty string.
    ///
    /// Marking a node skipped twice keeps the last reason.
    pub fn mark_skipped(&self, node: &TestNodeId, reason: Option<&str>) {
        self.skipped
            .insert(node.clone(), reason.unwrap_or_default().to_owned());
    }

    /// Records the current time as the start of `node`, replacing any earlier start.
    pub fn mark_started(&self, node: &TestNodeId) {
        self.start_times.insert(node.clone(), self.clock.now());
    }

    /// Records the current time as the end of `node`, along with its outcome.
    ///
    /// An aborted node is stored as skipped, with its formatted cause (or an empty string) as the
    /// reason, and no outcome is kept for it.
    pub fn mark_finished(&self, node: &TestNodeId, outcome: ExecutionOutcome) {
        self.end_times.insert(node.clone(), self.clock.now());
        match outcome {
            ExecutionOutcome::Aborted(cause) => {
                let reason = cause
                    .as_ref()
                    .map(|cause| (self.cause_formatter)(cause))
                    .unwrap_or_default();
                self.skipped.insert(node.clone(), reason);
            }
            outcome => self.finished.insert(node.clone(), outcome),
        }
    }

    /// Appends a diagnostic entry to `node`'s list.
    pub fn add_diagnostic(&self, node: &TestNodeId, entry: ReportEntry) {
        self.entries
            .update_or_default(node, |entries| entries.push(entry));
    }

    // ---
    // Queries
    // ---

    /// Returns true if `node` or any of its ancestors was skipped.
    pub fn is_effectively_skipped(&self, node: &TestNodeId) -> bool {
        self.find_skipped_ancestor(node).is_some()
    }

    /// Returns the reason `node` is effectively skipped, or `None` if it isn't.
    ///
    /// If the reason belongs to an ancestor rather than the node itself, it is prefixed with
    /// [`INHERITED_SKIP_PREFIX`]. The nearest skipped ancestor wins.
    pub fn skip_reason(&self, node: &TestNodeId) -> Option<String> {
        let skipped = self.find_skipped_ancestor(node)?;
        let reason = self.skipped.get_cloned(&skipped).unwrap_or_default();
        if &skipped == node {
            Some(reason)
        } else {
            Some(format!("{INHERITED_SKIP_PREFIX}{reason}"))
        }
    }

    /// Returns the skip reason recorded directly for `node`, ignoring ancestors.
    pub fn direct_skip_reason(&self, node: &TestNodeId) -> Option<String> {
        self.skipped.get_cloned(node)
    }

    /// Returns the time between the start and end of `node`, in seconds.
    ///
    /// A missing start is treated as the Unix epoch, and a missing end as equal to the start.
    /// Spans are measured at millisecond precision and are never negative.
    pub fn duration_seconds(&self, node: &TestNodeId) -> f64 {
        let start = self
            .start_times
            .get_cloned(node)
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset());
        let end = self.end_times.get_cloned(node).unwrap_or(start);
        let millis = (end - start).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Returns the recorded start time of `node`.
    pub fn start_time(&self, node: &TestNodeId) -> Option<DateTime<FixedOffset>> {
        self.start_times.get_cloned(node)
    }

    /// Returns the recorded end time of `node`.
    pub fn end_time(&self, node: &TestNodeId) -> Option<DateTime<FixedOffset>> {
        self.end_times.get_cloned(node)
    }

    /// Returns the outcome recorded directly for `node`. Aborted nodes have none.
    pub fn outcome(&self, node: &TestNodeId) -> Option<ExecutionOutcome> {
        self.finished.get_cloned(node)
    }

    /// Returns the outcomes recorded for `node` and each of its ancestors, walking up to the root.
    ///
    /// Nodes without an outcome (not finished yet, skipped, or aborted) contribute nothing.
    pub fn finished_ancestor_results(&self, node: &TestNodeId) -> Vec<ExecutionOutcome> {
        self.ancestors(node)
            .filter_map(|ancestor| self.finished.get_cloned(&ancestor))
            .collect()
    }

    /// Returns the diagnostic entries published for `node`, in publish order.
    pub fn diagnostics(&self, node: &TestNodeId) -> Vec<ReportEntry> {
        self.entries.get_cloned(node).unwrap_or_default()
    }

    /// Returns the number of diagnostic entries published for `node`.
    pub fn diagnostic_count(&self, node: &TestNodeId) -> usize {
        self.entries.with(node, Vec::len).unwrap_or(0)
    }

    /// Returns the parent of `node`, as resolved by the injected tree.
    pub fn parent_of(&self, node: &TestNodeId) -> Option<TestNodeId> {
        self.tree.parent_of(node)
    }

    fn find_skipped_ancestor(&self, node: &TestNodeId) -> Option<TestNodeId> {
        self.ancestors(node)
            .find(|ancestor| self.skipped.contains_key(ancestor))
    }

    /// Iterates from `node` (inclusive) up to the root.
    fn ancestors(&self, node: &TestNodeId) -> Ancestors<'_> {
        Ancestors {
            tree: &*self.tree,
            next: Some(node.clone()),
        }
    }
}

impl fmt::Debug for ResultStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStore")
            .field("clock", &self.clock)
            .field("finished", &self.finished.len())
            .field("skipped", &self.skipped.len())
            .field("started", &self.start_times.len())
            .field("ended", &self.end_times.len())
            .field("with_entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

struct Ancestors<'a> {
    tree: &'a dyn ParentLookup,
    next: Option<TestNodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = TestNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = self.tree.parent_of(&current);
        Some(current)
    }
}
