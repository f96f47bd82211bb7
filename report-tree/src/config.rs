// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for report-tree.
//!
//! Configuration is layered: the defaults embedded in this crate come first, and a user-supplied
//! TOML file, if any, is merged on top.

use crate::{
    errors::ConfigParseError,
    events::{CauseFormatter, format_cause_chain, format_cause_message},
    listener::DEFAULT_FILE_PREFIX,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, fmt, sync::Arc};
use tracing::warn;

/// Resolved report-tree configuration.
#[derive(Clone, Debug)]
pub struct ReportTreeConfig {
    xml_report: XmlReportConfig,
}

impl ReportTreeConfig {
    /// The default configuration, embedded at compile time.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Loads configuration from the embedded defaults plus an optional TOML file.
    ///
    /// Unknown keys are reported as warnings rather than errors.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
        }

        let config_file = config_file.map(|file| file.to_owned());
        let config = builder
            .build()
            .map_err(|err| ConfigParseError::new(config_file.clone(), err))?;

        let mut unknown = BTreeSet::new();
        let deserialized: ReportTreeConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                unknown.insert(path.to_string());
            })
            .map_err(|err| ConfigParseError::new(config_file, err))?;

        if !unknown.is_empty() {
            let unknown = unknown.into_iter().collect::<Vec<_>>().join(", ");
            warn!("ignoring unknown configuration keys: {unknown}");
        }

        Ok(Self {
            xml_report: deserialized.xml_report.into_config(),
        })
    }

    /// Returns the XML report configuration.
    pub fn xml_report(&self) -> &XmlReportConfig {
        &self.xml_report
    }

    /// Returns a mutable reference to the XML report configuration.
    pub fn xml_report_mut(&mut self) -> &mut XmlReportConfig {
        &mut self.xml_report
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

/// Configuration for XML report generation.
#[derive(Clone, Debug)]
pub struct XmlReportConfig {
    enabled: bool,
    output_dir: Utf8PathBuf,
    file_prefix: String,
    include_diagnostics: bool,
    cause_format: CauseFormat,
}

impl XmlReportConfig {
    /// Creates a configuration with reports enabled, writing into `output_dir`.
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            enabled: true,
            output_dir: output_dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_owned(),
            include_diagnostics: true,
            cause_format: CauseFormat::Chain,
        }
    }

    /// Returns true if reports should be written.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the directory reports are written into.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Overrides the output directory.
    pub fn set_output_dir(&mut self, output_dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Returns the prefix for report file names.
    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Returns true if diagnostic entries are written out.
    pub fn include_diagnostics(&self) -> bool {
        self.include_diagnostics
    }

    /// Returns how failure and abort causes are rendered.
    pub fn cause_format(&self) -> CauseFormat {
        self.cause_format
    }
}

/// How failure and abort causes are rendered into text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CauseFormat {
    /// The cause along with everything that caused it.
    Chain,

    /// The top-level message only.
    Message,
}

impl CauseFormat {
    /// Returns the formatter for this format.
    pub fn formatter(self) -> CauseFormatter {
        match self {
            CauseFormat::Chain => Arc::new(format_cause_chain),
            CauseFormat::Message => Arc::new(format_cause_message),
        }
    }
}

impl fmt::Display for CauseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CauseFormat::Chain => write!(f, "chain"),
            CauseFormat::Message => write!(f, "message"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportTreeConfigDeserialize {
    xml_report: XmlReportImpl,
}

// Every field is present in the embedded defaults, so nothing here is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct XmlReportImpl {
    enabled: bool,
    output_dir: Utf8PathBuf,
    file_prefix: String,
    include_diagnostics: bool,
    cause_format: CauseFormat,
}

impl XmlReportImpl {
    fn into_config(self) -> XmlReportConfig {
        XmlReportConfig {
            enabled: self.enabled,
            output_dir: self.output_dir,
            file_prefix: self.file_prefix,
            include_diagnostics: self.include_diagnostics,
            cause_format: self.cause_format,
        }
    }
}
