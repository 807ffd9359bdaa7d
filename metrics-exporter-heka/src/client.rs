use std::{
    io,
    path::PathBuf,
    process,
    sync::Arc,
    time::Duration,
};

use bytes::BytesMut;
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    builder::MessageBuilder,
    codec::{Encoder, StreamEncoder},
    forwarder::{sync::Connection, ForwarderConfiguration, RemoteAddr},
    mappings::Mappings,
    metric::Metric,
    telemetry::{DropReason, Telemetry},
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_PORT: u16 = 5565;

/// Errors that could occur while building a Heka client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },
}

/// Errors that could occur while sending a batch.
#[derive(Debug, Error)]
pub enum SendError {
    /// The remote server could not be reached, so nothing was sent.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address of the remote server.
        addr: RemoteAddr,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Outcome of sending a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendReport {
    messages_sent: usize,
    metrics_dropped: usize,
}

impl SendReport {
    /// Returns the number of messages sent.
    pub const fn messages_sent(&self) -> usize {
        self.messages_sent
    }

    /// Returns the number of metrics that were skipped because they failed to serialize, encode or send.
    pub const fn metrics_dropped(&self) -> usize {
        self.metrics_dropped
    }

    /// Returns `true` if any metric was skipped.
    pub const fn any_failures(&self) -> bool {
        self.metrics_dropped != 0
    }
}

/// Builder for a Heka client.
pub struct HekaBuilder {
    remote_addr: RemoteAddr,
    connect_timeout: Duration,
    write_timeout: Duration,
    mappings_file: Option<PathBuf>,
    mappings: Option<Mappings>,
    encoder: Option<Box<dyn Encoder>>,
}

impl HekaBuilder {
    /// Set the remote address to forward metrics to.
    ///
    /// The address is in the format of `<scheme>://<host>:<port>`, where the scheme is either `tcp` or `udp`, or
    /// `unix://<path>` for a Unix domain socket. When the scheme is omitted, `tcp` is assumed.
    ///
    /// Defaults to `tcp://127.0.0.1:5565`.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the mappings file to load message settings and rewrite rules from.
    ///
    /// The file is loaded once, when the client is built. If it cannot be loaded, a warning is logged and the default
    /// settings are used.
    #[must_use]
    pub fn with_mappings_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.mappings_file = Some(path.into());
        self
    }

    /// Set the mappings directly, taking precedence over any mappings file.
    #[must_use]
    pub fn with_mappings(mut self, mappings: Mappings) -> Self {
        self.mappings = Some(mappings);
        self
    }

    /// Set the timeout for establishing the connection at the start of each batch.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write timeout for sending messages.
    ///
    /// When the write timeout is reached, the message being sent is dropped without retrying.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the encoder used to turn messages into bytes.
    ///
    /// Defaults to [`StreamEncoder`], the framing expected by Heka stream inputs.
    #[must_use]
    pub fn with_encoder<E>(mut self, encoder: E) -> Self
    where
        E: Encoder + 'static,
    {
        self.encoder = Some(Box::new(encoder));
        self
    }

    /// Builds the client, loading the mappings file if one was set.
    pub fn build(self) -> HekaClient {
        let mappings = self.mappings.unwrap_or_else(|| Mappings::load(self.mappings_file.as_deref()));

        HekaClient {
            config: ForwarderConfiguration {
                remote_addr: self.remote_addr,
                connect_timeout: self.connect_timeout,
                write_timeout: self.write_timeout,
            },
            builder: MessageBuilder::new(Arc::new(mappings)),
            encoder: self.encoder.unwrap_or_else(|| Box::new(StreamEncoder::default())),
        }
    }
}

impl Default for HekaBuilder {
    fn default() -> Self {
        HekaBuilder {
            remote_addr: RemoteAddr::Tcp { host: "127.0.0.1".to_string(), port: DEFAULT_PORT },
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            mappings_file: None,
            mappings: None,
            encoder: None,
        }
    }
}

/// Sends batches of metrics to a Heka server.
///
/// The client can be shared between threads: concurrent batches each use their own connection, and share the metric
/// name cache.
pub struct HekaClient {
    config: ForwarderConfiguration,
    builder: MessageBuilder,
    encoder: Box<dyn Encoder>,
}

impl HekaClient {
    /// Returns the remote address batches are sent to.
    pub fn remote_addr(&self) -> &RemoteAddr {
        &self.config.remote_addr
    }

    /// Returns the message builder.
    pub fn message_builder(&self) -> &MessageBuilder {
        &self.builder
    }

    /// Sends a batch of metrics, one message per metric, in order.
    ///
    /// A single connection is opened for the batch and closed once every metric has been handled. Metrics that fail to
    /// serialize, encode or send are logged and skipped, and the remaining metrics are still sent.
    ///
    /// # Errors
    ///
    /// If the connection to the remote server cannot be established, an error is returned and nothing is sent.
    pub fn send(&self, metrics: &[Metric]) -> Result<SendReport, SendError> {
        let telemetry = Telemetry::new(self.config.remote_addr.transport_id());
        let pid = process::id() as i32;
        let hostname = hostname::get().ok().and_then(|h| h.into_string().ok()).unwrap_or_default();

        let mut connection = Connection::open(&self.config).map_err(|source| {
            telemetry.track_connect_failure();
            error!(addr = %self.config.remote_addr, error = %source, "Failed to connect to Heka.");
            SendError::Connect { addr: self.config.remote_addr.clone(), source }
        })?;

        let mut report = SendReport::default();
        let mut buf = BytesMut::new();
        for metric in metrics {
            let drop_reason = self.send_metric(&mut connection, metric, pid, &hostname, &mut buf, &telemetry);
            if let Some(reason) = drop_reason {
                telemetry.track_metric_dropped(reason);
                report.metrics_dropped += 1;
            } else {
                report.messages_sent += 1;
            }
        }

        connection.close();

        debug!(
            messages_sent = report.messages_sent,
            metrics_dropped = report.metrics_dropped,
            "Finished sending batch."
        );
        Ok(report)
    }

    fn send_metric(
        &self,
        connection: &mut Connection,
        metric: &Metric,
        pid: i32,
        hostname: &str,
        buf: &mut BytesMut,
        telemetry: &Telemetry,
    ) -> Option<DropReason> {
        // The payload is a single-element batch, in the same JSON shape the host hands batches over in.
        let payload = match serde_json::to_string(std::slice::from_ref(metric)) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize metric.");
                return Some(DropReason::Serialize);
            }
        };

        let message = self.builder.build(metric, payload, pid, hostname);

        buf.clear();
        if let Err(e) = self.encoder.encode(&message, buf) {
            error!(error = %e, "Failed to encode message.");
            return Some(DropReason::Encode);
        }

        if let Err(e) = connection.send(&buf[..]) {
            error!(error = %e, "Failed to send message.");
            return Some(DropReason::Send);
        }

        telemetry.track_message_sent(buf.len());
        None
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::UdpSocket,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;
    use crate::{
        codec::EncodeError,
        metric::Namespace,
        proto::Message,
        test_util::{closed_address, decode_frames, FakeHeka},
    };

    /// Fails to encode the n-th message it is handed, counting from zero.
    struct FailingEncoder {
        fail_at: usize,
        seen: AtomicUsize,
    }

    impl Encoder for FailingEncoder {
        fn encode(&self, message: &Message, buf: &mut BytesMut) -> Result<(), EncodeError> {
            if self.seen.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(EncodeError::MessageTooLarge { len: usize::MAX, max: 0 });
            }
            StreamEncoder::default().encode(message, buf)
        }
    }

    fn batch(n: usize) -> Vec<Metric> {
        (0..n)
            .map(|i| Metric::new(Namespace::from_static(["intel", "psutil", "load", "load15"]), i as u64))
            .collect()
    }

    fn client_for(server: &FakeHeka) -> HekaBuilder {
        HekaBuilder::default().with_remote_address(server.remote_address()).unwrap()
    }

    fn value_of(message: &Message) -> i64 {
        message.fields_named("value").next().unwrap().value_integer[0]
    }

    #[test]
    fn sends_one_message_per_metric_in_order() {
        let server = FakeHeka::start();
        let client = client_for(&server).build();

        let report = client.send(&batch(5)).unwrap();
        assert_eq!(report.messages_sent(), 5);
        assert!(!report.any_failures());

        let messages = server.messages();
        assert_eq!(messages.iter().map(value_of).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);

        let expected_pid = process::id() as i32;
        for message in &messages {
            assert_eq!(message.pid(), expected_pid);
            assert_eq!(message.r#type(), "snap.heka");

            let payload: Vec<Metric> = serde_json::from_str(message.payload()).unwrap();
            assert_eq!(payload.len(), 1);
            assert_eq!(payload[0].namespace.len(), 4);
        }
    }

    #[test]
    fn skips_metric_that_fails_to_encode() {
        let server = FakeHeka::start();
        let encoder = FailingEncoder { fail_at: 2, seen: AtomicUsize::new(0) };
        let client = client_for(&server).with_encoder(encoder).build();

        let report = client.send(&batch(6)).unwrap();
        assert_eq!(report.messages_sent(), 5);
        assert_eq!(report.metrics_dropped(), 1);

        let messages = server.messages();
        assert_eq!(messages.iter().map(value_of).collect::<Vec<_>>(), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn skips_metric_that_fails_to_send() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        // Encodes fine, but is larger than any UDP datagram.
        let client = HekaBuilder::default()
            .with_remote_address(format!("udp://{}", server.local_addr().unwrap()))
            .unwrap()
            .with_encoder(StreamEncoder::new(1 << 20))
            .build();
        let mut samples = batch(3);
        samples.insert(1, Metric::new(Namespace::from_static(["oversized"]), "x".repeat(70 * 1024)));

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let report = metrics::with_local_recorder(&recorder, || client.send(&samples)).unwrap();
        assert_eq!(report.messages_sent(), 3);
        assert_eq!(report.metrics_dropped(), 1);

        let mut buf = vec![0u8; 64 * 1024];
        let mut values = Vec::new();
        for _ in 0..3 {
            let n = server.recv(&mut buf).unwrap();
            values.extend(decode_frames(&buf[..n]).iter().map(value_of));
        }
        assert_eq!(values, vec![0, 1, 2]);

        let dropped_on_send = snapshotter.snapshot().into_vec().into_iter().find_map(|(key, _, _, value)| {
            let reason = key.key().labels().find(|l| l.key() == "reason").map(|l| l.value().to_owned());
            match value {
                DebugValue::Counter(v) if reason.as_deref() == Some("send") => Some(v),
                _ => None,
            }
        });
        assert_eq!(dropped_on_send, Some(1));
    }

    #[test]
    fn connection_failure_fails_the_batch() {
        let addr = closed_address();
        let client = HekaBuilder::default()
            .with_remote_address(format!("tcp://{addr}"))
            .unwrap()
            .with_connect_timeout(Duration::from_millis(500))
            .build();

        let result = client.send(&batch(3));
        assert!(matches!(result, Err(SendError::Connect { .. })));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let result = HekaBuilder::default().with_remote_address("tcp://localhost:port");
        assert!(matches!(result, Err(BuildError::InvalidRemoteAddress { .. })));
    }

    #[test]
    fn empty_batch_still_connects() {
        let server = FakeHeka::start();
        let client = client_for(&server).build();

        assert_eq!(client.send(&[]).unwrap(), SendReport::default());
        assert!(server.messages().is_empty());
    }

    #[test]
    fn mappings_apply_to_sent_messages() {
        let server = FakeHeka::start();
        let mappings = Mappings::default().with_namespace_rule("intel.psutil.", "");
        let client = client_for(&server).with_mappings(mappings).build();

        client.send(&batch(2)).unwrap();

        for message in server.messages() {
            let name = message.fields_named("name").next().unwrap();
            assert_eq!(name.value_string, vec!["load.load15".to_string()]);
        }
        assert_eq!(client.message_builder().resolver().evaluations(), 1);
    }

    #[test]
    fn concurrent_batches_share_the_name_cache() {
        let server = FakeHeka::with_connections(4);
        let mappings = Mappings::default().with_namespace_rule("intel.", "");
        let client = client_for(&server).with_mappings(mappings).build();

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| assert_eq!(client.send(&batch(3)).unwrap().messages_sent(), 3));
            }
        });

        let messages = server.messages();
        assert_eq!(messages.len(), 12);
        for message in &messages {
            let name = message.fields_named("name").next().unwrap();
            assert_eq!(name.value_string, vec!["psutil.load.load15".to_string()]);
        }

        let resolver = client.message_builder().resolver();
        assert_eq!(resolver.evaluations(), 1);
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn records_telemetry() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        let server = FakeHeka::start();
        let encoder = FailingEncoder { fail_at: 0, seen: AtomicUsize::new(0) };
        let client = client_for(&server).with_encoder(encoder).build();

        metrics::with_local_recorder(&recorder, || client.send(&batch(3)).unwrap());
        assert_eq!(server.messages().len(), 2);

        let counters = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(v) => {
                    let reason = key.key().labels().find(|l| l.key() == "reason").map(|l| l.value().to_owned());
                    Some((key.key().name().to_owned(), reason, v))
                }
                _ => None,
            })
            .collect::<Vec<_>>();

        let get = |name: &str, reason: Option<&str>| {
            counters
                .iter()
                .find(|(n, r, _)| n == name && r.as_deref() == reason)
                .map(|(_, _, v)| *v)
                .unwrap_or_default()
        };
        assert_eq!(get("heka.client.messages_sent", None), 2);
        assert_eq!(get("heka.client.metrics_dropped", Some("encode")), 1);
        assert_eq!(get("heka.client.metrics_dropped", Some("send")), 0);
        assert!(get("heka.client.bytes_sent", None) > 0);
    }
}
