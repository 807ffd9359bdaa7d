use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default message severity (informational).
pub const DEFAULT_SEVERITY: i32 = 6;

/// Default message type.
pub const DEFAULT_MESSAGE_TYPE: &str = "snap.heka";

/// Default message logger.
pub const DEFAULT_MESSAGE_LOGGER: &str = "snap.heka.logger";

/// Errors that could occur while loading a mappings file.
#[derive(Debug, Error)]
pub enum MappingsError {
    /// The file could not be read.
    #[error("could not read mappings file {}: {source}", path.display())]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The file extension is not one of `.json`, `.yaml` or `.yml`.
    #[error("mappings file {} has unsupported extension (expected one of .json .yaml .yml)", path.display())]
    UnsupportedExtension {
        /// Path of the file.
        path: PathBuf,
    },

    /// Parsing JSON failed.
    #[error("could not parse json mappings file {}: {source}", path.display())]
    BadJson {
        /// Path of the file.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_json::Error,
    },

    /// Parsing YAML failed.
    #[error("could not parse yaml mappings file {}: {source}", path.display())]
    BadYaml {
        /// Path of the file.
        path: PathBuf,
        /// Underlying parser error.
        source: serde_yaml::Error,
    },
}

enum MappingsFormat {
    Json,
    Yaml,
}

impl MappingsFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(MappingsFormat::Json),
            Some("yaml" | "yml") => Some(MappingsFormat::Yaml),
            _ => None,
        }
    }
}

/// On-disk shape of a mappings file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MappingsFile {
    severity: Option<i32>,
    #[serde(rename = "type")]
    message_type: Option<String>,
    logger: Option<String>,
    namespace: Option<IndexMap<String, String>>,
    metrics: Option<IndexMap<String, String>>,
}

/// Message defaults and metric name rewrite rules.
///
/// Rule sets map a pattern to its replacement and keep the order in which they were declared in the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mappings {
    severity: i32,
    message_type: String,
    logger: String,
    namespace_rules: IndexMap<String, String>,
    metric_rules: IndexMap<String, String>,
}

impl Mappings {
    /// Loads mappings from an optional file, falling back to the defaults.
    ///
    /// When no path is given, the defaults are returned as-is. Any failure to read or parse the file is logged and the
    /// defaults are returned instead: a broken mappings file never prevents metrics from being forwarded.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Self {
        let Some(path) = path else {
            return Mappings::default();
        };

        let mappings = match Mappings::try_load(path.as_ref()) {
            Ok(mappings) => mappings,
            Err(e) => {
                warn!(error = %e, "Ignoring mappings file.");
                Mappings::default()
            }
        };

        info!(
            severity = mappings.severity,
            message_type = %mappings.message_type,
            logger = %mappings.logger,
            "Using message settings."
        );
        mappings
    }

    /// Loads mappings from the given file.
    ///
    /// # Errors
    ///
    /// If the file cannot be read, does not have a supported extension, or cannot be parsed, an error is returned.
    pub fn try_load(path: &Path) -> Result<Self, MappingsError> {
        debug!(path = %path.display(), "Loading mappings file.");

        let content =
            fs::read(path).map_err(|source| MappingsError::Read { path: path.to_path_buf(), source })?;

        let file = match MappingsFormat::from_path(path) {
            Some(MappingsFormat::Json) => serde_json::from_slice::<MappingsFile>(&content)
                .map_err(|source| MappingsError::BadJson { path: path.to_path_buf(), source })?,
            Some(MappingsFormat::Yaml) => serde_yaml::from_slice::<MappingsFile>(&content)
                .map_err(|source| MappingsError::BadYaml { path: path.to_path_buf(), source })?,
            None => return Err(MappingsError::UnsupportedExtension { path: path.to_path_buf() }),
        };

        let mappings = Mappings::default().merged_with(file);
        debug!(path = %path.display(), ?mappings, "Loaded mappings file.");
        Ok(mappings)
    }

    fn merged_with(mut self, file: MappingsFile) -> Self {
        if let Some(severity) = file.severity.filter(|s| *s > 0) {
            self.severity = severity;
        }
        if let Some(message_type) = file.message_type.filter(|t| !t.is_empty()) {
            self.message_type = message_type;
        }
        if let Some(logger) = file.logger.filter(|l| !l.is_empty()) {
            self.logger = logger;
        }
        self.namespace_rules = file.namespace.unwrap_or_default();
        self.metric_rules = file.metrics.unwrap_or_default();

        for pattern in self.namespace_rules.keys().chain(self.metric_rules.keys()) {
            if pattern.is_empty() {
                warn!("Mappings file declares a rule with an empty pattern, it will never apply.");
            }
        }

        self
    }

    /// Adds a namespace rule.
    #[must_use]
    pub fn with_namespace_rule<P, R>(mut self, pattern: P, replacement: R) -> Self
    where
        P: Into<String>,
        R: Into<String>,
    {
        self.namespace_rules.insert(pattern.into(), replacement.into());
        self
    }

    /// Adds a metric rule.
    #[must_use]
    pub fn with_metric_rule<P, R>(mut self, pattern: P, replacement: R) -> Self
    where
        P: Into<String>,
        R: Into<String>,
    {
        self.metric_rules.insert(pattern.into(), replacement.into());
        self
    }

    /// Returns the message severity.
    pub fn severity(&self) -> i32 {
        self.severity
    }

    /// Returns the message type.
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    /// Returns the message logger.
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// Returns the namespace rules, in declaration order.
    pub fn namespace_rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespace_rules.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Returns the metric rules, in declaration order.
    pub fn metric_rules(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metric_rules.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }
}

impl Default for Mappings {
    fn default() -> Self {
        Mappings {
            severity: DEFAULT_SEVERITY,
            message_type: DEFAULT_MESSAGE_TYPE.to_string(),
            logger: DEFAULT_MESSAGE_LOGGER.to_string(),
            namespace_rules: IndexMap::new(),
            metric_rules: IndexMap::new(),
        }
    }
}
