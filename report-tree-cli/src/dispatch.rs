// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, ReportTreeExitCode, Result},
    output::{OutputContext, OutputOpts, OutputWriter, StdoutStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use report_tree::{
    config::ReportTreeConfig, listener::ReportListener, replay::replay_events, time::ManualClock,
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    sync::Arc,
};
use tracing::info;

/// Turns recorded test lifecycle events into per-root JUnit XML reports.
#[derive(Debug, Parser)]
#[command(version, name = "report-tree")]
pub struct ReportTreeApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl ReportTreeApp {
    /// Initializes logging and color support.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app with the output context returned by
    /// [`init_output`](Self::init_output), returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config = self.config_opts.make_config()?;

        match self.command {
            Command::Replay(opts) => opts.exec(config),
            Command::ShowConfig => {
                let styles = output.stdout_styles();
                let mut writer = output_writer.stdout_writer();
                write_config(&config, &styles, &mut writer)
                    .and_then(|()| writer.flush())
                    .map_err(ExpectedError::write_output_error)?;
                Ok(ReportTreeExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file layered over the built-in defaults
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "REPORT_TREE_CONFIG_FILE"
    )]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<ReportTreeConfig> {
        ReportTreeConfig::from_sources(self.config_file.as_deref())
            .map_err(ExpectedError::config_parse_error)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a recorded event log and write XML reports
    Replay(ReplayOpts),

    /// Print the resolved configuration
    ShowConfig,
}

#[derive(Debug, Args)]
struct ReplayOpts {
    /// Event log to replay, one JSON event per line ("-" for standard input)
    #[arg(long, value_name = "PATH")]
    events: Utf8PathBuf,

    /// Directory to write reports into [default: from config]
    #[arg(long, value_name = "DIR", env = "REPORT_TREE_OUTPUT_DIR")]
    output_dir: Option<Utf8PathBuf>,
}

impl ReplayOpts {
    fn exec(self, mut config: ReportTreeConfig) -> Result<i32> {
        if let Some(output_dir) = self.output_dir {
            config.xml_report_mut().set_output_dir(output_dir);
        }

        let clock = Arc::new(ManualClock::new(Utc::now().fixed_offset()));
        let listener = ReportListener::from_config(config.xml_report()).with_clock(clock.clone());

        let reader = open_events(&self.events)?;
        let summary = replay_events(reader, &listener, &clock)
            .map_err(|err| ExpectedError::replay_error(&self.events, err))?;

        info!(
            "replayed {} events from {} test plans ({} ignored), reports in {}",
            summary.dispatched,
            summary.plans,
            summary.ignored,
            config.xml_report().output_dir(),
        );
        Ok(ReportTreeExitCode::OK)
    }
}

fn open_events(path: &Utf8Path) -> Result<Box<dyn BufRead>> {
    if path.as_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).map_err(|err| ExpectedError::event_log_open_error(path, err))?;
    Ok(Box::new(BufReader::new(file)))
}

fn write_config(
    config: &ReportTreeConfig,
    styles: &StdoutStyles,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let xml_report = config.xml_report();
    writeln!(writer, "{}", "[xml-report]".style(styles.table))?;
    writeln!(writer, "{} = {}", "enabled".style(styles.key), xml_report.enabled())?;
    writeln!(
        writer,
        "{} = \"{}\"",
        "output-dir".style(styles.key),
        xml_report.output_dir()
    )?;
    writeln!(
        writer,
        "{} = \"{}\"",
        "file-prefix".style(styles.key),
        xml_report.file_prefix()
    )?;
    writeln!(
        writer,
        "{} = {}",
        "include-diagnostics".style(styles.key),
        xml_report.include_diagnostics()
    )?;
    writeln!(
        writer,
        "{} = \"{}\"",
        "cause-format".style(styles.key),
        xml_report.cause_format()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::tempdir;
    use clap::CommandFactory;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_app() {
        ReportTreeApp::command().debug_assert();
    }

    #[test]
    fn show_config() {
        let app = ReportTreeApp::parse_from(["report-tree", "--color", "never", "show-config"]);
        let context = app.init_output();
        let mut output = OutputWriter::Test { stdout: Vec::new() };
        assert_eq!(app.exec(context, &mut output).unwrap(), ReportTreeExitCode::OK);

        let OutputWriter::Test { stdout } = output else {
            unreachable!("constructed as a test writer");
        };
        assert_eq!(
            String::from_utf8(stdout).unwrap(),
            indoc! {r#"
                [xml-report]
                enabled = true
                output-dir = "target/test-reports"
                file-prefix = "TEST-"
                include-diagnostics = true
                cause-format = "chain"
            "#}
        );
    }

    #[test]
    fn replay_writes_reports() {
        let dir = tempdir().unwrap();
        let events = dir.path().join("events.jsonl");
        std::fs::write(
            &events,
            indoc! {r#"
                {"event":"plan-started","at":"2024-05-01T10:00:00Z","nodes":[{"id":"[engine:e]","display-name":"Engine","kind":"container"},{"id":"[engine:e]/[test:t]","parent":"[engine:e]","display-name":"t()","kind":"test"}]}
                {"event":"node-started","id":"[engine:e]"}
                {"event":"node-started","id":"[engine:e]/[test:t]"}
                {"event":"node-finished","at":"2024-05-01T10:00:01.5Z","id":"[engine:e]/[test:t]","outcome":{"status":"successful"}}
                {"event":"node-finished","id":"[engine:e]","outcome":{"status":"successful"}}
                {"event":"plan-finished"}
            "#},
        )
        .unwrap();
        let output_dir = dir.path().join("reports");

        let app = ReportTreeApp::parse_from([
            "report-tree",
            "--color",
            "never",
            "replay",
            "--events",
            events.as_str(),
            "--output-dir",
            output_dir.as_str(),
        ]);
        let context = app.init_output();
        let mut output = OutputWriter::Test { stdout: Vec::new() };
        assert_eq!(app.exec(context, &mut output).unwrap(), ReportTreeExitCode::OK);

        let report = std::fs::read_to_string(output_dir.join("TEST-e.xml")).unwrap();
        assert!(report.contains("t()"), "report names the test: {report}");
        assert!(report.contains("1.500"), "report has the recorded duration: {report}");
    }

    #[test]
    fn missing_event_log() {
        let dir = tempdir().unwrap();
        let events = dir.path().join("missing.jsonl");
        let app = ReportTreeApp::parse_from([
            "report-tree",
            "--color",
            "never",
            "replay",
            "--events",
            events.as_str(),
        ]);
        let context = app.init_output();
        let error = app
            .exec(context, &mut OutputWriter::Test { stdout: Vec::new() })
            .unwrap_err();
        assert_eq!(error.process_exit_code(), ReportTreeExitCode::REPLAY_FAILED);
    }

    #[test]
    fn show_config_uses_given_output_context() {
        let app = ReportTreeApp::parse_from(["report-tree", "--color", "never", "show-config"]);
        // The context passed in wins over the flags it was originally built from.
        let context = OutputContext {
            color: Color::Always,
        };
        let mut output = OutputWriter::Test { stdout: Vec::new() };
        assert_eq!(app.exec(context, &mut output).unwrap(), ReportTreeExitCode::OK);

        let OutputWriter::Test { stdout } = output else {
            unreachable!("constructed as a test writer");
        };
        let stdout = String::from_utf8(stdout).unwrap();
        assert!(stdout.contains('\x1b'), "styles come from the given context: {stdout:?}");
    }
}
