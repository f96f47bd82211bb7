// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events delivered by a test runner, and the listener interface that receives them.

use crate::{
    errors::DisplayErrorChain,
    node::TestNode,
    plan::TestPlan,
};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, sync::Arc};

/// The terminal result of executing a node.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    /// The node executed successfully.
    Successful,

    /// The node failed, optionally with a cause.
    Failed(Option<TestCause>),

    /// The node was aborted partway through, optionally with a cause.
    Aborted(Option<TestCause>),
}

impl ExecutionOutcome {
    /// Returns true if this is [`ExecutionOutcome::Successful`].
    pub fn is_successful(&self) -> bool {
        matches!(self, ExecutionOutcome::Successful)
    }

    /// Returns the cause attached to this outcome, if any.
    pub fn cause(&self) -> Option<&TestCause> {
        match self {
            ExecutionOutcome::Successful => None,
            ExecutionOutcome::Failed(cause) | ExecutionOutcome::Aborted(cause) => cause.as_ref(),
        }
    }
}

/// How a failure cause is classified in reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CauseKind {
    /// A failed assertion. Reported as a JUnit `failure`.
    Assertion,

    /// Any other error. Reported as a JUnit `error`.
    Error,
}

/// The cause of a failed or aborted execution.
#[derive(Clone)]
pub struct TestCause {
    kind: CauseKind,
    error: Arc<dyn Error + Send + Sync>,
}

impl TestCause {
    /// Creates a new cause.
    pub fn new(kind: CauseKind, error: impl Error + Send + Sync + 'static) -> Self {
        Self {
            kind,
            error: Arc::new(error),
        }
    }

    /// Creates a cause representing a failed assertion.
    pub fn assertion(error: impl Error + Send + Sync + 'static) -> Self {
        Self::new(CauseKind::Assertion, error)
    }

    /// Creates a cause representing an unexpected error.
    pub fn error(error: impl Error + Send + Sync + 'static) -> Self {
        Self::new(CauseKind::Error, error)
    }

    /// Returns the kind of this cause.
    pub fn kind(&self) -> CauseKind {
        self.kind
    }

    /// Returns the underlying error.
    pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.error
    }

    /// Returns the top-level message of this cause.
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Debug for TestCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCause")
            .field("kind", &self.kind)
            .field("error", &self.message())
            .finish()
    }
}

/// Converts a cause into the text stored for an aborted node and shown in reports.
pub type CauseFormatter = Arc<dyn Fn(&TestCause) -> String + Send + Sync>;

/// Formats a cause with everything that caused it. This is the default.
pub fn format_cause_chain(cause: &TestCause) -> String {
    DisplayErrorChain::new(cause.as_error()).to_string()
}

/// Formats only the top-level message of a cause.
pub fn format_cause_message(cause: &TestCause) -> String {
    cause.message()
}

/// Returns the default [`CauseFormatter`].
pub fn default_cause_formatter() -> CauseFormatter {
    Arc::new(format_cause_chain)
}

/// A diagnostic entry published by the runner while a node executes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    timestamp: DateTime<FixedOffset>,
    values: IndexMap<String, String>,
}

impl ReportEntry {
    /// Creates an entry with the given key/value pairs, in order.
    pub fn new(
        timestamp: DateTime<FixedOffset>,
        values: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            timestamp,
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Creates a free-text entry, stored under the `value` key.
    pub fn text(timestamp: DateTime<FixedOffset>, text: impl Into<String>) -> Self {
        Self::new(timestamp, [("value", text.into())])
    }

    /// Returns the time at which this entry was published.
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// Returns the key/value pairs in this entry, in publish order.
    pub fn values(&self) -> &IndexMap<String, String> {
        &self.values
    }
}

/// Receives lifecycle notifications from a test runner.
///
/// The runner may deliver notifications for different nodes from multiple threads at once, so
/// every method takes `&self`. All methods have empty default implementations.
pub trait TestExecutionListener: Send + Sync {
    /// Called once before any node of the plan executes.
    fn plan_started(&self, _plan: &Arc<TestPlan>) {}

    /// Called once after every node of the plan has finished or been skipped.
    fn plan_finished(&self, _plan: &Arc<TestPlan>) {}

    /// Called when a node is skipped without executing.
    fn node_skipped(&self, _node: &TestNode, _reason: Option<&str>) {}

    /// Called when a node starts executing.
    fn node_started(&self, _node: &TestNode) {}

    /// Called when a node publishes a diagnostic entry.
    fn diagnostic_published(&self, _node: &TestNode, _entry: &ReportEntry) {}

    /// Called when a node finishes executing.
    fn node_finished(&self, _node: &TestNode, _outcome: &ExecutionOutcome) {}
}

/// A single lifecycle notification.
#[derive(Clone, Debug)]
pub enum LifecycleEvent<'a> {
    /// See [`TestExecutionListener::plan_started`].
    PlanStarted(&'a Arc<TestPlan>),

    /// See [`TestExecutionListener::plan_finished`].
    PlanFinished(&'a Arc<TestPlan>),

    /// See [`TestExecutionListener::node_skipped`].
    NodeSkipped {
        /// The skipped node.
        node: &'a TestNode,
        /// Why the node was skipped.
        reason: Option<&'a str>,
    },

    /// See [`TestExecutionListener::node_started`].
    NodeStarted(&'a TestNode),

    /// See [`TestExecutionListener::diagnostic_published`].
    DiagnosticPublished {
        /// The node that published the entry.
        node: &'a TestNode,
        /// The published entry.
        entry: &'a ReportEntry,
    },

    /// See [`TestExecutionListener::node_finished`].
    NodeFinished {
        /// The node that finished.
        node: &'a TestNode,
        /// How it finished.
        outcome: &'a ExecutionOutcome,
    },
}

impl LifecycleEvent<'_> {
    /// Delivers this event to a listener.
    pub fn dispatch_to(&self, listener: &dyn TestExecutionListener) {
        match *self {
            LifecycleEvent::PlanStarted(plan) => listener.plan_started(plan),
            LifecycleEvent::PlanFinished(plan) => listener.plan_finished(plan),
            LifecycleEvent::NodeSkipped { node, reason } => listener.node_skipped(node, reason),
            LifecycleEvent::NodeStarted(node) => listener.node_started(node),
            LifecycleEvent::DiagnosticPublished { node, entry } => {
                listener.diagnostic_published(node, entry)
            }
            LifecycleEvent::NodeFinished { node, outcome } => listener.node_finished(node, outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("expected 2 but was 3")]
    struct Mismatch {
        #[source]
        source: io::Error,
    }

    #[test]
    fn cause_formatters() {
        let cause = TestCause::assertion(Mismatch {
            source: io::Error::other("reading fixture"),
        });
        assert_eq!(cause.kind(), CauseKind::Assertion);
        assert_eq!(format_cause_message(&cause), "expected 2 but was 3");
        assert_eq!(
            format_cause_chain(&cause),
            "expected 2 but was 3\n  caused by:\n  - reading fixture"
        );
        assert_eq!(default_cause_formatter()(&cause), format_cause_chain(&cause));
    }

    #[test]
    fn outcome_cause() {
        let cause = TestCause::error(io::Error::other("boom"));
        assert!(ExecutionOutcome::Successful.is_successful());
        assert!(ExecutionOutcome::Successful.cause().is_none());
        assert!(ExecutionOutcome::Failed(None).cause().is_none());
        assert_eq!(
            ExecutionOutcome::Aborted(Some(cause))
                .cause()
                .map(TestCause::message)
                .as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn report_entry_keeps_order() {
        let timestamp = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z").unwrap();
        let entry = ReportEntry::new(timestamp, [("zeta", "1"), ("alpha", "2")]);
        let keys: Vec<_> = entry.values().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha"]);

        let entry = ReportEntry::text(timestamp, "hello");
        assert_eq!(entry.values().get("value").map(String::as_str), Some("hello"));
    }

    #[derive(Default)]
    struct Recorder(parking_lot::Mutex<Vec<String>>);

    impl TestExecutionListener for Recorder {
        fn node_started(&self, node: &TestNode) {
            self.0.lock().push(format!("started {}", node.id()));
        }

        fn node_finished(&self, node: &TestNode, outcome: &ExecutionOutcome) {
            self.0
                .lock()
                .push(format!("finished {} {}", node.id(), outcome.is_successful()));
        }
    }

    #[test]
    fn dispatch_reaches_listener() {
        let recorder = Recorder::default();
        let node = TestNode::root("[engine:e]", "e");
        let plan = Arc::new(TestPlan::from_nodes([node.clone()]));

        for event in [
            LifecycleEvent::PlanStarted(&plan),
            LifecycleEvent::NodeStarted(&node),
            LifecycleEvent::NodeFinished {
                node: &node,
                outcome: &ExecutionOutcome::Successful,
            },
            LifecycleEvent::PlanFinished(&plan),
        ] {
            event.dispatch_to(&recorder);
        }

        assert_eq!(
            *recorder.0.lock(),
            ["started [engine:e]", "finished [engine:e] true"]
        );
    }
}
