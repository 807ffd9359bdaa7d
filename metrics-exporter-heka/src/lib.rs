//! A publisher that forwards batches of metric samples to a [Heka][heka] server.
//!
//! [heka]: https://hekad.readthedocs.io/
//!
//! # Usage
//!
//! ```no_run
//! # use metrics_exporter_heka::{HekaBuilder, Metric, Namespace};
//! // Create a client pointed at a Heka `TcpInput`, optionally with a mappings file that rewrites metric names.
//! let client = HekaBuilder::default()
//!     .with_remote_address("tcp://127.0.0.1:5565")
//!     .expect("invalid remote address")
//!     .with_mappings_file("/etc/heka/mappings.yaml")
//!     .build();
//!
//! let metric = Metric::new(Namespace::from_static(["intel", "psutil", "load", "load1"]), 0.42);
//! let report = client.send(&[metric]).expect("failed to connect to Heka");
//! assert_eq!(report.messages_sent(), 1);
//! ```
//!
//! # Message layout
//!
//! Each metric becomes exactly one Heka message. Static namespace elements are joined with `.` to form the metric
//! name, while dynamic namespace elements and tags become individual fields plus an entry in the `dimensions` field.
//! Fields are always emitted in the same order:
//!
//! 1. one field per dynamic namespace element, in namespace order
//! 2. one field per tag, in lexicographic key order
//! 3. `dimensions`, listing the names of the fields above (only when there is at least one)
//! 4. `name`, the joined metric name after rewriting
//! 5. `value`, the metric value (unsigned integers are reinterpreted as signed integers of the same width)
//! 6. `timestamp`, the metric timestamp in nanoseconds since the Unix epoch
//!
//! The message payload carries the metric itself, serialized as JSON.
//!
//! # Name rewriting
//!
//! A mappings file (`.json`, `.yaml` or `.yml`) can override the message type, logger and severity, and declare
//! substitution rules applied to metric names. Namespace rules run before metric rules, each in declaration order, and
//! each rule replaces only the first occurrence of its pattern. Results are cached per original name for the life of
//! the client.
//!
//! # Delivery
//!
//! Delivery is best-effort: a metric that fails to serialize, encode or transmit is logged and skipped, and the rest of
//! the batch is still sent. Only failing to reach the remote server fails the batch as a whole.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::MessageBuilder;

mod client;
pub use self::client::{BuildError, HekaBuilder, HekaClient, SendError, SendReport};

pub mod codec;

mod config;
pub use self::config::{ConfigError, ConfigKind, ConfigPolicy, ConfigRule, ConfigValue, PublisherConfig};

mod forwarder;
pub use self::forwarder::RemoteAddr;

mod mappings;
pub use self::mappings::{
    Mappings, MappingsError, DEFAULT_MESSAGE_LOGGER, DEFAULT_MESSAGE_TYPE, DEFAULT_SEVERITY,
};

mod metric;
pub use self::metric::{Metric, MetricValue, Namespace, NamespaceElement};

pub mod proto;

mod publisher;
pub use self::publisher::{HekaPublisher, PublishError, JSON_CONTENT_TYPE};

mod rewrite;
pub use self::rewrite::NameResolver;

mod telemetry;

#[cfg(test)]
mod test_util;
