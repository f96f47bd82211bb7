// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use report_tree::errors::{ConfigParseError, ReplayError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `report-tree` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum ReportTreeExitCode {}

impl ReportTreeExitCode {
    /// No errors occurred.
    pub const OK: i32 = 0;

    /// The event log could not be opened or replayed.
    pub const REPLAY_FAILED: i32 = 97;

    /// A user issue happened while setting up, such as an invalid config file.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders: errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error that `report-tree` knows how to describe to the user.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[source]
        err: ConfigParseError,
    },
    #[error("error opening event log")]
    EventLogOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error replaying event log")]
    ReplayError {
        path: Utf8PathBuf,
        #[source]
        err: ReplayError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn config_parse_error(err: ConfigParseError) -> Self {
        Self::ConfigParseError { err }
    }

    pub(crate) fn event_log_open_error(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::EventLogOpenError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn replay_error(path: impl Into<Utf8PathBuf>, err: ReplayError) -> Self {
        Self::ReplayError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } => ReportTreeExitCode::SETUP_ERROR,
            Self::EventLogOpenError { .. } | Self::ReplayError { .. } => {
                ReportTreeExitCode::REPLAY_FAILED
            }
            Self::WriteOutputError { .. } => ReportTreeExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr, along with everything that caused it.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error: Option<&dyn Error> = match self {
            Self::ConfigParseError { err } => {
                // The config error names the file, so print it as the heading.
                error!("{err}");
                err.source()
            }
            Self::EventLogOpenError { path, err } => {
                error!("could not open event log `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ReplayError { path, err } => {
                error!("failed to replay event log `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
