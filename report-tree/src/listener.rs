// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The listener that turns lifecycle notifications into report files.

use crate::{
    config::XmlReportConfig,
    errors::{DisplayErrorChain, WriteReportError},
    events::{
        CauseFormatter, ExecutionOutcome, ReportEntry, TestExecutionListener,
        default_cause_formatter,
    },
    node::TestNode,
    plan::TestPlan,
    serializer::{LegacyJunitSerializer, ReportSerializer},
    store::{ReportView, ResultStore},
    time::{Clock, MonotonicClock},
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use parking_lot::{Mutex, RwLock};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    sync::Arc,
};
use tracing::{debug, warn};

/// Default prefix for report file names.
pub const DEFAULT_FILE_PREFIX: &str = "TEST-";

/// Writes an XML report for each root node as soon as that root is skipped or finishes.
///
/// The listener holds a [`ResultStore`] for the lifetime of one plan: it is created in
/// [`plan_started`](TestExecutionListener::plan_started) and dropped in
/// [`plan_finished`](TestExecutionListener::plan_finished). Failures to write reports are
/// written to the diagnostic output (standard output by default) and never propagate to the
/// runner.
#[derive(Debug)]
pub struct XmlReportListener {
    output_dir: Utf8PathBuf,
    file_prefix: String,
    clock: Arc<dyn Clock>,
    cause_formatter: DebugIgnore<CauseFormatter>,
    serializer: DebugIgnore<Arc<dyn ReportSerializer>>,
    diagnostic_out: DebugIgnore<Mutex<Box<dyn Write + Send>>>,
    state: RwLock<ListenerState>,
}

#[derive(Debug)]
enum ListenerState {
    Idle,
    Running {
        plan: Arc<TestPlan>,
        store: Arc<ResultStore>,
    },
}

impl XmlReportListener {
    /// Creates a listener writing reports into `output_dir`, with default settings.
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_owned(),
            clock: Arc::new(MonotonicClock::new()),
            cause_formatter: DebugIgnore(default_cause_formatter()),
            serializer: DebugIgnore(Arc::new(LegacyJunitSerializer::new())),
            diagnostic_out: DebugIgnore(Mutex::new(Box::new(io::stdout()))),
            state: RwLock::new(ListenerState::Idle),
        }
    }

    /// Creates a listener from configuration.
    pub fn from_config(config: &XmlReportConfig) -> Self {
        let cause_formatter = config.cause_format().formatter();
        let serializer = LegacyJunitSerializer::new()
            .with_diagnostics(config.include_diagnostics())
            .with_cause_formatter(cause_formatter.clone());
        Self::new(config.output_dir())
            .with_file_prefix(config.file_prefix())
            .with_cause_formatter(cause_formatter)
            .with_serializer(Arc::new(serializer))
    }

    /// Sets the prefix for report file names.
    pub fn with_file_prefix(mut self, file_prefix: impl Into<String>) -> Self {
        self.file_prefix = file_prefix.into();
        self
    }

    /// Sets the clock used to timestamp node starts and ends.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets how abort causes are turned into skip reasons.
    pub fn with_cause_formatter(mut self, cause_formatter: CauseFormatter) -> Self {
        self.cause_formatter = DebugIgnore(cause_formatter);
        self
    }

    /// Sets the serializer that renders each report.
    pub fn with_serializer(mut self, serializer: Arc<dyn ReportSerializer>) -> Self {
        self.serializer = DebugIgnore(serializer);
        self
    }

    /// Sets where failures to create or write reports are described.
    pub fn with_diagnostic_writer(mut self, out: Box<dyn Write + Send>) -> Self {
        self.diagnostic_out = DebugIgnore(Mutex::new(out));
        self
    }

    /// Returns the directory reports are written into.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Returns the path of the report file for a root node.
    ///
    /// The file is named after the first segment of the root's id. Path separators in that
    /// segment are replaced so the file always lands directly inside the output directory.
    pub fn report_path(&self, root: &TestNode) -> Utf8PathBuf {
        let root_name = root.id().root_segment_value().replace(['/', '\\'], "_");
        self.output_dir
            .join(format!("{}{}.xml", self.file_prefix, root_name))
    }

    /// Returns the store for the running plan, if any.
    fn running(&self) -> Option<(Arc<TestPlan>, Arc<ResultStore>)> {
        match &*self.state.read() {
            ListenerState::Running { plan, store } => Some((plan.clone(), store.clone())),
            ListenerState::Idle => None,
        }
    }

    fn running_for(
        &self,
        event: &str,
        node: &TestNode,
    ) -> Option<(Arc<TestPlan>, Arc<ResultStore>)> {
        let running = self.running();
        if running.is_none() {
            warn!(
                "received `{event}` for `{}` while no test plan is running, ignoring",
                node.id()
            );
        }
        running
    }

    /// Writes the report for `node` from the plan and store captured when the notification
    /// arrived, if `node` is a root.
    fn write_report_if_root(&self, node: &TestNode, plan: &TestPlan, store: &ResultStore) {
        if !node.is_root() {
            return;
        }

        match self.write_report(plan, store, node) {
            Ok(path) => debug!("wrote XML report for `{}` to {path}", node.id()),
            Err(error) => self.print_error(&error),
        }
    }

    fn write_report(
        &self,
        plan: &TestPlan,
        store: &ResultStore,
        root: &TestNode,
    ) -> Result<Utf8PathBuf, WriteReportError> {
        let path = self.report_path(root);
        let file = File::create(&path).map_err(|error| WriteReportError::Fs {
            file: path.clone(),
            error,
        })?;
        // The file is closed when the writer is dropped, on every path out of this function.
        let mut writer = BufWriter::new(file);

        let view = ReportView::new(store, plan);
        self.serializer
            .write_report(&view, root, &mut writer)
            .map_err(|error| WriteReportError::Serialize {
                file: path.clone(),
                error,
            })?;
        writer.flush().map_err(|error| WriteReportError::Fs {
            file: path.clone(),
            error,
        })?;

        Ok(path)
    }

    fn print_error(&self, error: &WriteReportError) {
        warn!("{}", DisplayErrorChain::new(error));
        let mut out = self.diagnostic_out.lock();
        // If the diagnostic output itself fails, there's nowhere left to report it.
        _ = writeln!(out, "{}", DisplayErrorChain::new(error));
        _ = out.flush();
    }
}

impl TestExecutionListener for XmlReportListener {
    fn plan_started(&self, plan: &Arc<TestPlan>) {
        let store = ResultStore::new(plan.clone(), self.clock.clone())
            .with_cause_formatter(self.cause_formatter.0.clone());
        {
            let mut state = self.state.write();
            if matches!(*state, ListenerState::Running { .. }) {
                warn!("test plan started while another plan was running, discarding its results");
            }
            *state = ListenerState::Running {
                plan: plan.clone(),
                store: Arc::new(store),
            };
        }

        if let Err(error) = std::fs::create_dir_all(&self.output_dir) {
            self.print_error(&WriteReportError::CreateDir {
                dir: self.output_dir.clone(),
                error,
            });
        }
    }

    fn plan_finished(&self, _plan: &Arc<TestPlan>) {
        *self.state.write() = ListenerState::Idle;
    }

    fn node_skipped(&self, node: &TestNode, reason: Option<&str>) {
        if let Some((plan, store)) = self.running_for("node-skipped", node) {
            store.mark_skipped(node.id(), reason);
            self.write_report_if_root(node, &plan, &store);
        }
    }

    fn node_started(&self, node: &TestNode) {
        if let Some((_, store)) = self.running_for("node-started", node) {
            store.mark_started(node.id());
        }
    }

    fn diagnostic_published(&self, node: &TestNode, entry: &ReportEntry) {
        if let Some((_, store)) = self.running_for("diagnostic-published", node) {
            store.add_diagnostic(node.id(), entry.clone());
        }
    }

    fn node_finished(&self, node: &TestNode, outcome: &ExecutionOutcome) {
        if let Some((plan, store)) = self.running_for("node-finished", node) {
            store.mark_finished(node.id(), outcome.clone());
            self.write_report_if_root(node, &plan, &store);
        }
    }
}

/// A listener that writes XML reports when enabled in configuration, and does nothing
/// otherwise.
#[derive(Debug)]
pub enum ReportListener {
    /// Reports are enabled.
    Enabled(XmlReportListener),

    /// Reports are disabled; every notification is ignored.
    Disabled,
}

impl ReportListener {
    /// Creates a listener from configuration.
    pub fn from_config(config: &XmlReportConfig) -> Self {
        if config.enabled() {
            Self::Enabled(XmlReportListener::from_config(config))
        } else {
            debug!("XML reports are disabled");
            Self::Disabled
        }
    }

    /// Sets the clock used by the inner listener, if reports are enabled.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        match self {
            Self::Enabled(listener) => Self::Enabled(listener.with_clock(clock)),
            Self::Disabled => Self::Disabled,
        }
    }

    fn inner(&self) -> Option<&XmlReportListener> {
        match self {
            Self::Enabled(listener) => Some(listener),
            Self::Disabled => None,
        }
    }
}

impl TestExecutionListener for ReportListener {
    fn plan_started(&self, plan: &Arc<TestPlan>) {
        if let Some(inner) = self.inner() {
            inner.plan_started(plan);
        }
    }

    fn plan_finished(&self, plan: &Arc<TestPlan>) {
        if let Some(inner) = self.inner() {
            inner.plan_finished(plan);
        }
    }

    fn node_skipped(&self, node: &TestNode, reason: Option<&str>) {
        if let Some(inner) = self.inner() {
            inner.node_skipped(node, reason);
        }
    }

    fn node_started(&self, node: &TestNode) {
        if let Some(inner) = self.inner() {
            inner.node_started(node);
        }
    }

    fn diagnostic_published(&self, node: &TestNode, entry: &ReportEntry) {
        if let Some(inner) = self.inner() {
            inner.diagnostic_published(node, entry);
        }
    }

    fn node_finished(&self, node: &TestNode, outcome: &ExecutionOutcome) {
        if let Some(inner) = self.inner() {
            inner.node_finished(node, outcome);
        }
    }
}
