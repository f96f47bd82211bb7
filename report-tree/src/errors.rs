// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by report-tree.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt, io};
use thiserror::Error;

/// An error that occurred while loading or parsing configuration.
#[derive(Debug, Error)]
#[error("failed to parse report-tree config{}", config_file_suffix(.config_file.as_ref()))]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, err: ConfigError) -> Self {
        Self { config_file, err }
    }

    /// Returns the config file that failed to parse, or `None` if the embedded defaults failed.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }
}

fn config_file_suffix(config_file: Option<&Utf8PathBuf>) -> String {
    match config_file {
        Some(file) => format!(" at `{file}`"),
        None => String::new(),
    }
}

/// An error returned by a [`ReportSerializer`](crate::serializer::ReportSerializer).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializeReportError {
    /// Building or rendering the JUnit document failed.
    #[error("error producing JUnit XML")]
    Junit(#[source] quick_junit::SerializeError),

    /// Writing to the destination failed.
    #[error("error writing report output")]
    Io(#[source] io::Error),
}

/// An error that occurred while writing the report for a root node.
///
/// These errors never propagate out of the listener: they are written to the listener's
/// diagnostic output and the report is abandoned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// The output directory could not be created.
    #[error("could not create reports directory: {dir}")]
    CreateDir {
        /// The directory being created.
        dir: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: io::Error,
    },

    /// The report file could not be opened or flushed.
    #[error("could not write XML report: {file}")]
    Fs {
        /// The report file.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: io::Error,
    },

    /// The serializer failed.
    #[error("could not write XML report: {file}")]
    Serialize {
        /// The report file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: SerializeReportError,
    },
}

/// An error that occurred while replaying a recorded event log.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplayError {
    /// Reading the event log failed.
    #[error("error reading event log")]
    Read(#[source] io::Error),

    /// A line of the event log could not be parsed.
    #[error("malformed event on line {line}")]
    Parse {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// A node event appeared before any `plan-started` event.
    #[error("event on line {line} arrived before the test plan started")]
    NoPlan {
        /// The 1-based line number.
        line: usize,
    },
}

/// Displays an error along with the chain of errors that caused it.
///
/// The format is:
///
/// ```text
/// top-level message
///   caused by:
///   - first cause
///   - second cause
/// ```
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(cause) = source {
            write!(f, "\n  - {cause}")?;
            source = cause.source();
        }

        Ok(())
    }
}

impl<E: error::Error> fmt::Debug for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_error_chain() {
        let error = WriteReportError::Fs {
            file: "reports/TEST-engine.xml".into(),
            error: io::Error::other("disk full"),
        };
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            indoc! {"
                could not write XML report: reports/TEST-engine.xml
                  caused by:
                  - disk full"
            },
        );

        let error = ReplayError::NoPlan { line: 3 };
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            "event on line 3 arrived before the test plan started",
        );
    }
}
