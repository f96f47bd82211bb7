// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit XML output for a single root node.

use super::ReportSerializer;
use crate::{
    errors::SerializeReportError,
    events::{
        CauseFormatter, CauseKind, ExecutionOutcome, ReportEntry, TestCause,
        default_cause_formatter,
    },
    node::TestNode,
    store::ReportView,
};
use debug_ignore::DebugIgnore;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{fmt::Write as _, io, time::Duration};

/// Writes one JUnit test suite per root node, with one test case per test underneath it.
///
/// * Skipped tests (directly, through an ancestor, or by being aborted) are reported as
///   `<skipped>` with the skip reason as the message.
/// * Otherwise, the first failed outcome found walking from the test up to the root decides the
///   status: an assertion cause is a `<failure>`, anything else (including no cause) an
///   `<error>`.
/// * Diagnostic entries of the root become suite `<property>` elements; those of a test are
///   listed in its `<system-out>`.
#[derive(Clone, Debug)]
pub struct LegacyJunitSerializer {
    include_diagnostics: bool,
    cause_formatter: DebugIgnore<CauseFormatter>,
}

impl LegacyJunitSerializer {
    /// Creates a serializer that includes diagnostics and formats causes with their full chain.
    pub fn new() -> Self {
        Self {
            include_diagnostics: true,
            cause_formatter: DebugIgnore(default_cause_formatter()),
        }
    }

    /// Sets whether diagnostic entries are written out.
    pub fn with_diagnostics(mut self, include_diagnostics: bool) -> Self {
        self.include_diagnostics = include_diagnostics;
        self
    }

    /// Sets how failure causes are rendered in `<failure>` and `<error>` bodies.
    pub fn with_cause_formatter(mut self, cause_formatter: CauseFormatter) -> Self {
        self.cause_formatter = DebugIgnore(cause_formatter);
        self
    }

    /// Builds the JUnit report for `root` without writing it anywhere.
    pub fn build_report(&self, view: &ReportView<'_>, root: &TestNode) -> Report {
        let mut test_suite = TestSuite::new(root.legacy_reporting_name());
        test_suite
            .set_timestamp(view.start_time(root.id()).unwrap_or_else(|| view.now()))
            .set_time(seconds_to_duration(view.duration_seconds(root.id())));

        if self.include_diagnostics {
            for entry in view.diagnostics(root.id()) {
                for (key, value) in entry.values() {
                    test_suite.add_property((key.clone(), value.clone()));
                }
            }
        }

        let tests = std::iter::once(root.clone())
            .chain(view.descendants(root.id()))
            .filter(|node| node.kind().is_test());
        for node in tests {
            test_suite.add_test_case(self.test_case(view, root, &node));
        }

        let mut report = Report::new(root.legacy_reporting_name());
        report.add_test_suites([test_suite]);
        report
    }

    fn test_case(&self, view: &ReportView<'_>, root: &TestNode, node: &TestNode) -> TestCase {
        let classname = node
            .parent_id()
            .and_then(|parent| view.node(parent))
            .map_or_else(
                || root.legacy_reporting_name().to_owned(),
                |parent| parent.legacy_reporting_name().to_owned(),
            );

        let mut test_case = TestCase::new(node.legacy_reporting_name(), self.status(view, node));
        test_case
            .set_classname(classname)
            .set_time(seconds_to_duration(view.duration_seconds(node.id())));
        if let Some(start_time) = view.start_time(node.id()) {
            test_case.set_timestamp(start_time);
        }

        let entries = if self.include_diagnostics {
            view.diagnostics(node.id())
        } else {
            Vec::new()
        };
        test_case.set_system_out(system_out(node, &entries));

        test_case
    }

    fn status(&self, view: &ReportView<'_>, node: &TestNode) -> TestCaseStatus {
        if let Some(reason) = view.skip_reason(node.id()) {
            let mut status = TestCaseStatus::skipped();
            status.set_message(reason);
            return status;
        }

        let failure = view
            .finished_ancestor_results(node.id())
            .into_iter()
            .find_map(|outcome| match outcome {
                ExecutionOutcome::Failed(cause) => Some(cause),
                ExecutionOutcome::Successful | ExecutionOutcome::Aborted(_) => None,
            });

        match failure {
            None => TestCaseStatus::success(),
            Some(cause) => self.failure_status(cause.as_ref()),
        }
    }

    fn failure_status(&self, cause: Option<&TestCause>) -> TestCaseStatus {
        let kind = match cause.map(TestCause::kind) {
            Some(CauseKind::Assertion) => NonSuccessKind::Failure,
            Some(CauseKind::Error) | None => NonSuccessKind::Error,
        };
        let mut status = TestCaseStatus::non_success(kind);
        if let Some(cause) = cause {
            status
                .set_message(cause.message())
                .set_description((self.cause_formatter)(cause));
        }
        status
    }
}

impl Default for LegacyJunitSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSerializer for LegacyJunitSerializer {
    fn write_report(
        &self,
        view: &ReportView<'_>,
        root: &TestNode,
        out: &mut dyn io::Write,
    ) -> Result<(), SerializeReportError> {
        self.build_report(view, root)
            .serialize(out)
            .map_err(SerializeReportError::Junit)
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_from_secs_f64(seconds).unwrap_or_default()
}

fn system_out(node: &TestNode, entries: &[ReportEntry]) -> String {
    let mut out = String::new();
    // Writing to a String is infallible.
    _ = writeln!(out, "unique-id: {}", node.id());
    _ = writeln!(out, "display-name: {}", node.display_name());
    for (index, entry) in entries.iter().enumerate() {
        _ = writeln!(
            out,
            "Report Entry #{} (timestamp: {})",
            index + 1,
            entry.timestamp().to_rfc3339(),
        );
        for (key, value) in entry.values() {
            _ = writeln!(out, "\t- {key}: {value}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        node::NodeKind,
        plan::TestPlan,
        store::ResultStore,
        time::ManualClock,
    };
    use chrono::{DateTime, TimeDelta};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("expected <1> but was <2>")]
    struct AssertionFailed;

    const ROOT: &str = "[engine:e]";
    const CLASS: &str = "[engine:e]/[class:C]";

    fn test_id(name: &str) -> String {
        format!("{CLASS}/[method:{name}]")
    }

    struct Fixture {
        plan: Arc<TestPlan>,
        store: ResultStore,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new(tests: &[&str]) -> Self {
            let plan = TestPlan::from_nodes([
                TestNode::root(ROOT, "Engine"),
                TestNode::child(CLASS, ROOT, "C", NodeKind::Container)
                    .with_legacy_reporting_name("com.example.C"),
            ]);
            for name in tests {
                plan.add(TestNode::child(test_id(name), CLASS, *name, NodeKind::Test));
            }
            let plan = Arc::new(plan);
            let clock = Arc::new(ManualClock::new(
                DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z").unwrap(),
            ));
            let store = ResultStore::new(plan.clone(), clock.clone());
            Self { plan, store, clock }
        }

        fn report(&self, serializer: &LegacyJunitSerializer) -> String {
            let view = ReportView::new(&self.store, &self.plan);
            let root = self.plan.get(&ROOT.into()).unwrap();
            let mut out = Vec::new();
            serializer.write_report(&view, &root, &mut out).unwrap();
            String::from_utf8(out).unwrap()
        }

        fn test_case(&self, serializer: &LegacyJunitSerializer, name: &str) -> TestCase {
            let view = ReportView::new(&self.store, &self.plan);
            let root = self.plan.get(&ROOT.into()).unwrap();
            let node = self.plan.get(&test_id(name).into()).unwrap();
            serializer.test_case(&view, &root, &node)
        }
    }

    fn message(status: &TestCaseStatus) -> Option<&str> {
        match status {
            TestCaseStatus::Success { .. } => None,
            TestCaseStatus::NonSuccess { message, .. } => message.as_deref(),
            TestCaseStatus::Skipped { message, .. } => message.as_deref(),
        }
    }

    #[test]
    fn statuses() {
        let fixture = Fixture::new(&["pass", "fail", "error", "aborted", "skipped"]);
        let store = &fixture.store;
        store.mark_started(&ROOT.into());
        for name in ["pass", "fail", "error", "aborted"] {
            store.mark_started(&test_id(name).into());
        }
        fixture.clock.advance(TimeDelta::milliseconds(250));

        store.mark_finished(&test_id("pass").into(), ExecutionOutcome::Successful);
        store.mark_finished(
            &test_id("fail").into(),
            ExecutionOutcome::Failed(Some(TestCause::assertion(AssertionFailed))),
        );
        store.mark_finished(&test_id("error").into(), ExecutionOutcome::Failed(None));
        store.mark_finished(&test_id("aborted").into(), ExecutionOutcome::Aborted(None));
        store.mark_skipped(&test_id("skipped").into(), Some("not on this platform"));

        let serializer = LegacyJunitSerializer::new();

        let pass = fixture.test_case(&serializer, "pass");
        assert!(matches!(pass.status, TestCaseStatus::Success { .. }));
        assert_eq!(pass.time, Some(Duration::from_millis(250)));
        assert_eq!(pass.classname.as_ref().map(|c| c.as_str()), Some("com.example.C"));

        let fail = fixture.test_case(&serializer, "fail");
        assert!(matches!(
            fail.status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                ..
            }
        ));
        assert_eq!(message(&fail.status), Some("expected <1> but was <2>"));

        let error = fixture.test_case(&serializer, "error");
        assert!(matches!(
            error.status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Error,
                ..
            }
        ));
        assert_eq!(message(&error.status), None);

        let aborted = fixture.test_case(&serializer, "aborted");
        assert!(matches!(aborted.status, TestCaseStatus::Skipped { .. }));
        assert_eq!(message(&aborted.status), Some(""));

        let skipped = fixture.test_case(&serializer, "skipped");
        assert_eq!(message(&skipped.status), Some("not on this platform"));
        assert_eq!(skipped.time, Some(Duration::ZERO));

        let xml = fixture.report(&serializer);
        assert_eq!(xml.matches("<testsuite ").count(), 1, "xml:\n{xml}");
        assert!(xml.contains(r#"name="Engine""#), "xml:\n{xml}");
        assert_eq!(xml.matches("<testcase ").count(), 5, "xml:\n{xml}");
    }

    #[test]
    fn failed_container_fails_its_tests() {
        let fixture = Fixture::new(&["t"]);
        let store = &fixture.store;
        store.mark_finished(&test_id("t").into(), ExecutionOutcome::Successful);
        store.mark_finished(
            &CLASS.into(),
            ExecutionOutcome::Failed(Some(TestCause::assertion(AssertionFailed))),
        );

        let test_case = fixture.test_case(&LegacyJunitSerializer::new(), "t");
        assert!(matches!(
            test_case.status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                ..
            }
        ));
    }

    #[test]
    fn inherited_skip_message() {
        let fixture = Fixture::new(&["t"]);
        let store = &fixture.store;
        store.mark_skipped(&CLASS.into(), Some("env unavailable"));
        store.mark_started(&test_id("t").into());
        store.mark_finished(&test_id("t").into(), ExecutionOutcome::Successful);

        let xml = fixture.report(&LegacyJunitSerializer::new());
        assert!(
            xml.contains(r#"message="parent was skipped: env unavailable""#),
            "xml:\n{xml}"
        );
    }

    #[test]
    fn diagnostics_output() {
        let fixture = Fixture::new(&["t"]);
        let store = &fixture.store;
        let timestamp = DateTime::parse_from_rfc3339("2025-06-01T10:00:01Z").unwrap();
        store.add_diagnostic(
            &ROOT.into(),
            ReportEntry::new(timestamp, [("device", "pixel-8")]),
        );
        store.add_diagnostic(
            &test_id("t").into(),
            ReportEntry::new(timestamp, [("image", "t.png"), ("diff", "0.1%")]),
        );
        store.add_diagnostic(&test_id("t").into(), ReportEntry::text(timestamp, "done"));

        let serializer = LegacyJunitSerializer::new();
        let test_case = fixture.test_case(&serializer, "t");
        assert_eq!(
            test_case.system_out.as_ref().map(|s| s.as_str()),
            Some(concat!(
                "unique-id: [engine:e]/[class:C]/[method:t]\n",
                "display-name: t\n",
                "Report Entry #1 (timestamp: 2025-06-01T10:00:01+00:00)\n",
                "\t- image: t.png\n",
                "\t- diff: 0.1%\n",
                "Report Entry #2 (timestamp: 2025-06-01T10:00:01+00:00)\n",
                "\t- value: done\n",
            ))
        );

        let xml = fixture.report(&serializer);
        assert!(xml.contains(r#"name="device""#), "xml:\n{xml}");
        assert!(xml.contains(r#"value="pixel-8""#), "xml:\n{xml}");

        let serializer = LegacyJunitSerializer::new().with_diagnostics(false);
        let test_case = fixture.test_case(&serializer, "t");
        assert_eq!(
            test_case.system_out.as_ref().map(|s| s.as_str()),
            Some("unique-id: [engine:e]/[class:C]/[method:t]\ndisplay-name: t\n")
        );
        let xml = fixture.report(&serializer);
        assert!(!xml.contains("pixel-8"), "xml:\n{xml}");
    }
}
