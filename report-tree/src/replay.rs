// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replaying a recorded event log through a listener.
//!
//! An event log is a sequence of JSON objects, one per line, each tagged by an `event` field:
//!
//! ```text
//! {"event":"plan-started","at":"2024-01-01T00:00:00Z","nodes":[...]}
//! {"event":"node-started","at":"2024-01-01T00:00:00Z","id":"[engine:a]"}
//! {"event":"node-finished","at":"2024-01-01T00:00:01.5Z","id":"[engine:a]","outcome":{"status":"successful"}}
//! {"event":"plan-finished"}
//! ```
//!
//! Every record may carry an `at` timestamp. The [`ManualClock`] is set to it before the event
//! is dispatched, so durations in the resulting reports match the recorded run.

use crate::{
    errors::ReplayError,
    events::{
        CauseKind, ExecutionOutcome, LifecycleEvent, ReportEntry, TestCause,
        TestExecutionListener,
    },
    node::{TestNode, TestNodeId},
    plan::TestPlan,
    time::{Clock, ManualClock},
};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::Deserialize;
use std::{error::Error, fmt, io::BufRead, sync::Arc};
use tracing::{debug, warn};

/// Counts of what happened during a replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// The number of events delivered to the listener.
    pub dispatched: usize,

    /// The number of events dropped because they named an unknown node.
    pub ignored: usize,

    /// The number of test plans that were started.
    pub plans: usize,
}

/// Reads an event log line by line and delivers each event to `listener`.
///
/// Blank lines are skipped. Events naming a node the plan doesn't know about are logged and
/// dropped. A line that can't be parsed stops the replay.
pub fn replay_events(
    reader: impl BufRead,
    listener: &dyn TestExecutionListener,
    clock: &ManualClock,
) -> Result<ReplaySummary, ReplayError> {
    let mut summary = ReplaySummary::default();
    let mut plan: Option<Arc<TestPlan>> = None;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(ReplayError::Read)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: RecordedLine =
            serde_json::from_str(line).map_err(|error| ReplayError::Parse {
                line: line_number,
                error,
            })?;
        if let Some(at) = record.at {
            clock.set(at);
        }

        match record.event {
            RecordedEvent::PlanStarted { nodes } => {
                let new_plan = Arc::new(TestPlan::from_nodes(nodes));
                debug!("replaying test plan with {} nodes", new_plan.len());
                LifecycleEvent::PlanStarted(&new_plan).dispatch_to(listener);
                plan = Some(new_plan);
                summary.plans += 1;
            }
            RecordedEvent::PlanFinished => {
                let current = require_plan(plan.as_ref(), line_number)?;
                LifecycleEvent::PlanFinished(current).dispatch_to(listener);
                plan = None;
            }
            RecordedEvent::NodeRegistered { node } => {
                require_plan(plan.as_ref(), line_number)?.add(node);
                continue;
            }
            RecordedEvent::NodeSkipped { id, reason } => {
                let current = require_plan(plan.as_ref(), line_number)?;
                let Some(node) = lookup(current, &id, line_number) else {
                    summary.ignored += 1;
                    continue;
                };
                LifecycleEvent::NodeSkipped {
                    node: &node,
                    reason: reason.as_deref(),
                }
                .dispatch_to(listener);
            }
            RecordedEvent::NodeStarted { id } => {
                let current = require_plan(plan.as_ref(), line_number)?;
                let Some(node) = lookup(current, &id, line_number) else {
                    summary.ignored += 1;
                    continue;
                };
                LifecycleEvent::NodeStarted(&node).dispatch_to(listener);
            }
            RecordedEvent::DiagnosticPublished { id, values } => {
                let current = require_plan(plan.as_ref(), line_number)?;
                let Some(node) = lookup(current, &id, line_number) else {
                    summary.ignored += 1;
                    continue;
                };
                let entry = ReportEntry::new(clock.now(), values);
                LifecycleEvent::DiagnosticPublished {
                    node: &node,
                    entry: &entry,
                }
                .dispatch_to(listener);
            }
            RecordedEvent::NodeFinished { id, outcome } => {
                let current = require_plan(plan.as_ref(), line_number)?;
                let Some(node) = lookup(current, &id, line_number) else {
                    summary.ignored += 1;
                    continue;
                };
                let outcome = outcome.into_outcome();
                LifecycleEvent::NodeFinished {
                    node: &node,
                    outcome: &outcome,
                }
                .dispatch_to(listener);
            }
        }
        summary.dispatched += 1;
    }

    Ok(summary)
}

fn require_plan(
    plan: Option<&Arc<TestPlan>>,
    line: usize,
) -> Result<&Arc<TestPlan>, ReplayError> {
    plan.ok_or(ReplayError::NoPlan { line })
}

fn lookup(plan: &TestPlan, id: &TestNodeId, line: usize) -> Option<TestNode> {
    let node = plan.get(id);
    if node.is_none() {
        warn!("event on line {line} names unknown node `{id}`, ignoring");
    }
    node
}

#[derive(Debug, Deserialize)]
struct RecordedLine {
    #[serde(default)]
    at: Option<DateTime<FixedOffset>>,
    #[serde(flatten)]
    event: RecordedEvent,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum RecordedEvent {
    PlanStarted {
        #[serde(default)]
        nodes: Vec<TestNode>,
    },
    NodeRegistered {
        node: TestNode,
    },
    NodeSkipped {
        id: TestNodeId,
        #[serde(default)]
        reason: Option<String>,
    },
    NodeStarted {
        id: TestNodeId,
    },
    DiagnosticPublished {
        id: TestNodeId,
        values: IndexMap<String, String>,
    },
    NodeFinished {
        id: TestNodeId,
        outcome: RecordedOutcome,
    },
    PlanFinished,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum RecordedOutcome {
    Successful,
    Failed {
        #[serde(default)]
        cause: Option<RecordedCause>,
    },
    Aborted {
        #[serde(default)]
        cause: Option<RecordedCause>,
    },
}

impl RecordedOutcome {
    fn into_outcome(self) -> ExecutionOutcome {
        match self {
            RecordedOutcome::Successful => ExecutionOutcome::Successful,
            RecordedOutcome::Failed { cause } => {
                ExecutionOutcome::Failed(cause.map(RecordedCause::into_cause))
            }
            RecordedOutcome::Aborted { cause } => {
                ExecutionOutcome::Aborted(cause.map(RecordedCause::into_cause))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RecordedCause {
    #[serde(default)]
    kind: Option<CauseKind>,
    message: String,
    #[serde(default)]
    caused_by: Vec<String>,
}

impl RecordedCause {
    fn into_cause(self) -> TestCause {
        let kind = self.kind.unwrap_or(CauseKind::Error);
        TestCause::new(kind, RecordedError::from_chain(self.message, self.caused_by))
    }
}

/// An error reconstructed from an event log.
///
/// The recorded `caused-by` messages become this error's [`source`](Error::source) chain, in
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedError {
    message: String,
    source: Option<Box<RecordedError>>,
}

impl RecordedError {
    /// Builds an error with `message`, caused by each of `caused_by` in turn.
    pub fn from_chain(message: impl Into<String>, caused_by: Vec<String>) -> Self {
        let source = caused_by
            .into_iter()
            .rev()
            .fold(None, |source, message| {
                Some(Box::new(RecordedError { message, source }))
            });
        Self {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for RecordedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::format_cause_chain;
    use chrono::Utc;
    use indoc::indoc;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[derive(Debug, Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl TestExecutionListener for Recorder {
        fn plan_started(&self, plan: &Arc<TestPlan>) {
            self.push(format!("plan-started {}", plan.len()));
        }

        fn plan_finished(&self, _plan: &Arc<TestPlan>) {
            self.push("plan-finished".to_owned());
        }

        fn node_skipped(&self, node: &TestNode, reason: Option<&str>) {
            self.push(format!("skipped {} {reason:?}", node.id()));
        }

        fn node_started(&self, node: &TestNode) {
            self.push(format!("started {}", node.id()));
        }

        fn diagnostic_published(&self, node: &TestNode, entry: &ReportEntry) {
            let values: Vec<_> = entry
                .values()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            self.push(format!(
                "diagnostic {} {} {}",
                node.id(),
                entry.timestamp().to_rfc3339(),
                values.join(",")
            ));
        }

        fn node_finished(&self, node: &TestNode, outcome: &ExecutionOutcome) {
            let outcome = match outcome {
                ExecutionOutcome::Successful => "successful".to_owned(),
                ExecutionOutcome::Failed(cause) => format!(
                    "failed {:?}",
                    cause.as_ref().map(|cause| (cause.kind(), format_cause_chain(cause)))
                ),
                ExecutionOutcome::Aborted(cause) => {
                    format!("aborted {:?}", cause.as_ref().map(TestCause::message))
                }
            };
            self.push(format!("finished {} {outcome}", node.id()));
        }
    }

    fn epoch() -> DateTime<FixedOffset> {
        DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
    }

    const LOG: &str = indoc! {r#"
        {"event":"plan-started","at":"2024-05-01T10:00:00Z","nodes":[{"id":"[engine:e]","display-name":"Engine","kind":"container"}]}
        {"event":"node-registered","node":{"id":"[engine:e]/[test:t]","parent":"[engine:e]","display-name":"t()","kind":"test"}}

        {"event":"node-started","id":"[engine:e]"}
        {"event":"node-started","id":"[engine:e]/[test:t]"}
        {"event":"diagnostic-published","at":"2024-05-01T10:00:01Z","id":"[engine:e]/[test:t]","values":{"key":"value"}}
        {"event":"node-finished","id":"[engine:e]/[test:t]","outcome":{"status":"failed","cause":{"kind":"assertion","message":"expected 1","caused-by":["reading fixture"]}}}
        {"event":"node-finished","id":"[engine:e]","outcome":{"status":"aborted"}}
        {"event":"plan-finished"}
    "#};

    #[test]
    fn replays_in_order() {
        let recorder = Recorder::default();
        let clock = ManualClock::new(epoch());
        let summary = replay_events(Cursor::new(LOG), &recorder, &clock).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                dispatched: 7,
                ignored: 0,
                plans: 1,
            }
        );
        assert_eq!(
            recorder.events(),
            vec![
                "plan-started 1".to_owned(),
                "started [engine:e]".to_owned(),
                "started [engine:e]/[test:t]".to_owned(),
                "diagnostic [engine:e]/[test:t] 2024-05-01T10:00:01+00:00 key=value".to_owned(),
                "finished [engine:e]/[test:t] failed Some((Assertion, \"expected 1\\n  caused by:\\n  - reading fixture\"))".to_owned(),
                "finished [engine:e] aborted None".to_owned(),
                "plan-finished".to_owned(),
            ]
        );
        // The clock keeps the last recorded timestamp.
        assert_eq!(clock.now().to_rfc3339(), "2024-05-01T10:00:01+00:00");
    }

    #[test]
    fn unknown_nodes_are_ignored() {
        let log = indoc! {r#"
            {"event":"plan-started","nodes":[{"id":"[engine:e]","display-name":"Engine","kind":"container"}]}
            {"event":"node-started","id":"[engine:missing]"}
            {"event":"node-skipped","id":"[engine:e]","reason":"disabled"}
        "#};
        let recorder = Recorder::default();
        let clock = ManualClock::new(epoch());
        let summary = replay_events(Cursor::new(log), &recorder, &clock).unwrap();

        assert_eq!(summary.ignored, 1);
        assert_eq!(
            recorder.events(),
            vec![
                "plan-started 1".to_owned(),
                "skipped [engine:e] Some(\"disabled\")".to_owned(),
            ]
        );
    }

    #[test]
    fn malformed_line_names_line_number() {
        let log = "\n{\"event\":\"plan-started\",\"nodes\":[]}\n{\"event\":\"node-exploded\"}\n";
        let recorder = Recorder::default();
        let clock = ManualClock::new(epoch());
        let error = replay_events(Cursor::new(log), &recorder, &clock).unwrap_err();
        assert!(
            matches!(error, ReplayError::Parse { line: 3, .. }),
            "unexpected error: {error:?}"
        );
    }

    #[test]
    fn event_before_plan() {
        let log = "{\"event\":\"node-started\",\"id\":\"[engine:e]\"}\n";
        let recorder = Recorder::default();
        let clock = ManualClock::new(epoch());
        let error = replay_events(Cursor::new(log), &recorder, &clock).unwrap_err();
        assert!(
            matches!(error, ReplayError::NoPlan { line: 1 }),
            "unexpected error: {error:?}"
        );
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn recorded_error_chain() {
        let error = RecordedError::from_chain(
            "top",
            vec!["middle".to_owned(), "bottom".to_owned()],
        );
        let mut chain = Vec::new();
        let mut current: Option<&(dyn Error + 'static)> = Some(&error);
        while let Some(error) = current {
            chain.push(error.to_string());
            current = error.source();
        }
        assert_eq!(chain, vec!["top", "middle", "bottom"]);
    }
}
