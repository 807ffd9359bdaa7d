use std::{collections::HashMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const HOST_KEY: &str = "host";
const PORT_KEY: &str = "port";
const MAPPINGS_FILE_KEY: &str = "mappings-file";

/// A raw configuration value, as supplied by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// String.
    Str(String),
}

impl ConfigValue {
    fn kind_name(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Int(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::Str(_) => "string",
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Expected kind of a configuration value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKind {
    /// A string value.
    String,
    /// An integer value.
    Integer,
}

impl ConfigKind {
    fn matches(self, value: &ConfigValue) -> bool {
        matches!(
            (self, value),
            (ConfigKind::String, ConfigValue::Str(_)) | (ConfigKind::Integer, ConfigValue::Int(_))
        )
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKind::String => f.write_str("string"),
            ConfigKind::Integer => f.write_str("integer"),
        }
    }
}

/// A single key accepted by the publisher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigRule {
    /// Key name.
    pub key: &'static str,
    /// Expected value kind.
    pub kind: ConfigKind,
    /// Whether the key must be present.
    pub required: bool,
    /// Human-readable description of the key.
    pub description: &'static str,
}

/// Errors that could occur while processing publisher configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key was not supplied.
    #[error("missing required configuration key '{key}'")]
    Missing {
        /// Name of the missing key.
        key: &'static str,
    },

    /// A key was supplied with a value of the wrong kind.
    #[error("configuration key '{key}' must be {expected}, got {found}")]
    TypeMismatch {
        /// Name of the key.
        key: &'static str,
        /// Expected value kind.
        expected: ConfigKind,
        /// Kind of the value that was supplied.
        found: &'static str,
    },

    /// The port is not a valid TCP port.
    #[error("port {port} is out of range")]
    InvalidPort {
        /// The supplied port.
        port: i64,
    },
}

/// Validated publisher configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PublisherConfig {
    /// Heka host name or IP address.
    pub host: String,
    /// Heka `TcpInput` port.
    pub port: u16,
    /// Optional mappings file.
    pub mappings_file: Option<PathBuf>,
}

impl PublisherConfig {
    /// Returns the remote address, in the form accepted by
    /// [`HekaBuilder::with_remote_address`](crate::HekaBuilder::with_remote_address).
    pub fn remote_address(&self) -> String {
        if self.host.contains(':') {
            format!("tcp://[{}]:{}", self.host, self.port)
        } else {
            format!("tcp://{}:{}", self.host, self.port)
        }
    }
}

/// Declares and validates the configuration accepted by the publisher.
///
/// The policy accepts a required `host` string, a required `port` integer and an optional `mappings-file` string.
/// Unknown keys are ignored.
#[derive(Clone, Debug)]
pub struct ConfigPolicy {
    rules: Vec<ConfigRule>,
}

impl ConfigPolicy {
    /// Creates the default policy.
    pub fn new() -> Self {
        ConfigPolicy {
            rules: vec![
                ConfigRule {
                    key: HOST_KEY,
                    kind: ConfigKind::String,
                    required: true,
                    description: "Heka host name or IP address",
                },
                ConfigRule {
                    key: PORT_KEY,
                    kind: ConfigKind::Integer,
                    required: true,
                    description: "Heka TcpInput port",
                },
                ConfigRule {
                    key: MAPPINGS_FILE_KEY,
                    kind: ConfigKind::String,
                    required: false,
                    description: "Path to a JSON or YAML file with message settings and name rewrite rules",
                },
            ],
        }
    }

    /// Returns the rules of this policy.
    pub fn rules(&self) -> &[ConfigRule] {
        &self.rules
    }

    /// Validates `config` against the policy.
    ///
    /// # Errors
    ///
    /// If a required key is missing, a key has a value of the wrong kind, or the port is out of range, an error is
    /// returned.
    pub fn process(&self, config: &HashMap<String, ConfigValue>) -> Result<PublisherConfig, ConfigError> {
        for rule in &self.rules {
            match config.get(rule.key) {
                None if rule.required => return Err(ConfigError::Missing { key: rule.key }),
                Some(value) if !rule.kind.matches(value) => {
                    return Err(ConfigError::TypeMismatch {
                        key: rule.key,
                        expected: rule.kind,
                        found: value.kind_name(),
                    })
                }
                _ => {}
            }
        }

        let host = match config.get(HOST_KEY) {
            Some(ConfigValue::Str(host)) => host.clone(),
            _ => return Err(ConfigError::Missing { key: HOST_KEY }),
        };
        let port = match config.get(PORT_KEY) {
            Some(ConfigValue::Int(port)) => {
                u16::try_from(*port).map_err(|_| ConfigError::InvalidPort { port: *port })?
            }
            _ => return Err(ConfigError::Missing { key: PORT_KEY }),
        };
        let mappings_file = match config.get(MAPPINGS_FILE_KEY) {
            Some(ConfigValue::Str(path)) if !path.is_empty() => Some(PathBuf::from(path)),
            _ => None,
        };

        Ok(PublisherConfig { host, port, mappings_file })
    }
}

impl Default for ConfigPolicy {
    fn default() -> Self {
        Self::new()
    }
}
