use metrics::{counter, Counter};

/// Why a metric was not forwarded.
#[derive(Clone, Copy, Debug)]
pub enum DropReason {
    Serialize,
    Encode,
    Send,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            DropReason::Serialize => "serialize",
            DropReason::Encode => "encode",
            DropReason::Send => "send",
        }
    }
}

/// Client telemetry.
///
/// Counters are registered against whichever recorder is current when the batch starts, under the `heka.client`
/// namespace.
pub struct Telemetry {
    messages_sent: Counter,
    bytes_sent: Counter,
    dropped_serialize: Counter,
    dropped_encode: Counter,
    dropped_send: Counter,
    connect_failures: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance.
    pub fn new(transport: &'static str) -> Self {
        let dropped = |reason: DropReason| {
            counter!("heka.client.metrics_dropped", "client_transport" => transport, "reason" => reason.as_str())
        };

        Self {
            messages_sent: counter!("heka.client.messages_sent", "client_transport" => transport),
            bytes_sent: counter!("heka.client.bytes_sent", "client_transport" => transport),
            dropped_serialize: dropped(DropReason::Serialize),
            dropped_encode: dropped(DropReason::Encode),
            dropped_send: dropped(DropReason::Send),
            connect_failures: counter!("heka.client.connect_failures", "client_transport" => transport),
        }
    }

    pub fn track_message_sent(&self, len: usize) {
        self.messages_sent.increment(1);
        self.bytes_sent.increment(len as u64);
    }

    pub fn track_metric_dropped(&self, reason: DropReason) {
        match reason {
            DropReason::Serialize => self.dropped_serialize.increment(1),
            DropReason::Encode => self.dropped_encode.increment(1),
            DropReason::Send => self.dropped_send.increment(1),
        }
    }

    pub fn track_connect_failure(&self) {
        self.connect_failures.increment(1);
    }
}
