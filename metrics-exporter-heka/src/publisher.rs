use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    client::{BuildError, HekaBuilder, HekaClient, SendError, SendReport},
    config::{ConfigError, ConfigPolicy, ConfigValue, PublisherConfig},
    metric::Metric,
};

/// Content type of a JSON-encoded batch of metrics.
pub const JSON_CONTENT_TYPE: &str = "snap.json";

/// Errors that could occur while publishing a batch.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The batch was encoded in a format the publisher does not understand.
    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    /// The batch could not be decoded.
    #[error("failed to decode metrics: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client could not be built from the configuration.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The batch could not be sent.
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Publishes batches handed over by the collection host.
///
/// Clients are built on first use of a given configuration and reused afterwards, so each mappings file is loaded
/// once and its name cache lives as long as the publisher.
///
/// Clients are never evicted: every distinct configuration keeps its client, and its name cache, until the publisher
/// is dropped or [`HekaPublisher::clear_clients`] is called. Hosts that cycle through many endpoints should clear
/// the clients periodically.
pub struct HekaPublisher {
    policy: ConfigPolicy,
    clients: Mutex<HashMap<PublisherConfig, Arc<HekaClient>>>,
}

impl HekaPublisher {
    /// Creates a new `HekaPublisher` with the default configuration policy.
    pub fn new() -> Self {
        HekaPublisher { policy: ConfigPolicy::new(), clients: Mutex::new(HashMap::new()) }
    }

    /// Returns the configuration policy of this publisher.
    pub fn config_policy(&self) -> &ConfigPolicy {
        &self.policy
    }

    /// Decodes `content` and sends every metric in it to the configured Heka server.
    ///
    /// # Errors
    ///
    /// If the content type is not [`JSON_CONTENT_TYPE`], the content cannot be decoded, the configuration is invalid,
    /// or the connection to the remote server cannot be established, an error is returned. Failures of individual
    /// metrics are not errors, and are reflected in the returned [`SendReport`] instead.
    pub fn publish(
        &self,
        content_type: &str,
        content: &[u8],
        config: &HashMap<String, ConfigValue>,
    ) -> Result<SendReport, PublishError> {
        if content_type != JSON_CONTENT_TYPE {
            return Err(PublishError::UnsupportedContentType(content_type.to_owned()));
        }

        let metrics: Vec<Metric> = serde_json::from_slice(content)?;
        let config = self.policy.process(config)?;
        let client = self.client_for(config)?;

        debug!(count = metrics.len(), addr = %client.remote_addr(), "Publishing metrics.");
        Ok(client.send(&metrics)?)
    }

    /// Drops every cached client, returning how many were dropped.
    ///
    /// Batches already being sent keep their client until they finish. The next publish for a configuration builds a
    /// fresh client, reloading its mappings file.
    pub fn clear_clients(&self) -> usize {
        let mut clients = self.clients.lock();
        let dropped = clients.len();
        clients.clear();
        debug!(dropped, "Cleared Heka clients.");
        dropped
    }

    /// Returns the number of cached clients.
    pub fn cached_clients(&self) -> usize {
        self.clients.lock().len()
    }

    fn client_for(&self, config: PublisherConfig) -> Result<Arc<HekaClient>, BuildError> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&config) {
            return Ok(Arc::clone(client));
        }

        let mut builder = HekaBuilder::default().with_remote_address(config.remote_address())?;
        if let Some(path) = &config.mappings_file {
            builder = builder.with_mappings_file(path);
        }

        info!(addr = %config.remote_address(), "Creating Heka client.");
        let client = Arc::new(builder.build());
        clients.insert(config, Arc::clone(&client));
        Ok(client)
    }
}

impl Default for HekaPublisher {
    fn default() -> Self {
        Self::new()
    }
}
