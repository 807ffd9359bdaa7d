use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    mappings::Mappings,
    metric::{Metric, MetricValue},
    proto::{Field, FieldValue, Message},
    rewrite::NameResolver,
};

const DIMENSIONS_FIELD: &str = "dimensions";
const NAME_FIELD: &str = "name";
const VALUE_FIELD: &str = "value";
const TIMESTAMP_FIELD: &str = "timestamp";

// Heka has no unsigned integers, so unsigned values go through `MetricValue::narrowed` first.
impl From<MetricValue> for FieldValue {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::U64(_) | MetricValue::U32(_) => FieldValue::from(value.narrowed()),
            MetricValue::I64(v) => FieldValue::Integer(v),
            MetricValue::I32(v) => FieldValue::Integer(i64::from(v)),
            MetricValue::F64(v) => FieldValue::Double(v),
            MetricValue::F32(v) => FieldValue::Double(f64::from(v)),
            MetricValue::Bool(v) => FieldValue::Bool(v),
            MetricValue::String(v) => FieldValue::String(v),
        }
    }
}

/// Pushes a field onto `fields`, or drops it if it cannot be constructed.
fn push_field<V: Into<FieldValue>>(fields: &mut Vec<Field>, name: &str, value: V) {
    match Field::new(name, value) {
        Ok(field) => fields.push(field),
        Err(e) => debug!(field = name, error = %e, "Dropping field."),
    }
}

fn add_dimension(dimensions: &mut Option<Field>, name: &str) {
    match dimensions {
        Some(field) => field.push_string(name),
        None => match Field::new(DIMENSIONS_FIELD, vec![name.to_owned()]) {
            Ok(field) => *dimensions = Some(field),
            Err(e) => debug!(error = %e, "Dropping dimensions field."),
        },
    }
}

/// Translates metrics into Heka messages.
pub struct MessageBuilder {
    mappings: Arc<Mappings>,
    resolver: NameResolver,
}

impl MessageBuilder {
    /// Creates a new `MessageBuilder` with the given mappings.
    pub fn new(mappings: Arc<Mappings>) -> Self {
        MessageBuilder { resolver: NameResolver::new(Arc::clone(&mappings)), mappings }
    }

    /// Returns the mappings used by this builder.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// Returns the name resolver used by this builder.
    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Builds the message for `metric`.
    ///
    /// `payload` is carried verbatim as the message payload, and `pid`/`hostname` identify the sending process. A field
    /// that cannot be constructed is left out of the message, and never fails the message as a whole.
    pub fn build(&self, metric: &Metric, payload: String, pid: i32, hostname: &str) -> Message {
        let mut message = Message {
            uuid: Uuid::new_v4().as_bytes().to_vec(),
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            r#type: Some(self.mappings.message_type().to_owned()),
            logger: Some(self.mappings.logger().to_owned()),
            severity: Some(self.mappings.severity()),
            payload: Some(payload),
            pid: Some(pid),
            hostname: Some(hostname.to_owned()),
            ..Message::default()
        };

        self.push_metric_fields(metric, &mut message.fields);
        message
    }

    fn push_metric_fields(&self, metric: &Metric, fields: &mut Vec<Field>) {
        let mut segments = Vec::with_capacity(metric.namespace.len());
        let mut dimensions = None;

        // Dynamic elements and tags become dimensions, and only static elements are part of the name.
        for element in &metric.namespace {
            if element.is_dynamic() {
                trace!(name = element.name.as_str(), value = element.value.as_str(), "Adding dynamic element.");
                add_dimension(&mut dimensions, &element.name);
                push_field(fields, &element.name, element.value.as_str());
            } else {
                segments.push(element.value.as_str());
            }
        }

        for (key, value) in &metric.tags {
            trace!(tag = key.as_str(), value = value.as_str(), "Adding tag.");
            add_dimension(&mut dimensions, key);
            push_field(fields, key, value.as_str());
        }

        if let Some(dimensions) = dimensions {
            fields.push(dimensions);
        }

        let name = self.resolver.resolve(&segments.join("."));
        push_field(fields, NAME_FIELD, name);
        push_field(fields, VALUE_FIELD, metric.data.clone());

        match metric.timestamp.timestamp_nanos_opt() {
            Some(nanos) => push_field(fields, TIMESTAMP_FIELD, nanos),
            None => debug!(timestamp = %metric.timestamp, "Dropping field, timestamp out of range."),
        }
    }
}
