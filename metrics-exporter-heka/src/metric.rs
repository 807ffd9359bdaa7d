use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single element of a metric namespace.
///
/// Elements that carry a name are dynamic: their value is filled in at collection time, and they describe a dimension
/// of the metric rather than a segment of its name. Elements without a name are static and contribute their value to
/// the metric name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceElement {
    /// Value of the element.
    #[serde(rename = "Value")]
    pub value: String,

    /// Name of the element, empty for static elements.
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Human-readable description of the element.
    #[serde(rename = "Description", default)]
    pub description: String,
}

impl NamespaceElement {
    /// Creates a static element.
    pub fn new_static<V: Into<String>>(value: V) -> Self {
        NamespaceElement { value: value.into(), ..NamespaceElement::default() }
    }

    /// Creates a dynamic element with the given name and collected value.
    pub fn new_dynamic<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        NamespaceElement { value: value.into(), name: name.into(), ..NamespaceElement::default() }
    }

    /// Sets the description of the element.
    #[must_use]
    pub fn with_description<D: Into<String>>(mut self, description: D) -> Self {
        self.description = description.into();
        self
    }

    /// Returns `true` if the element is dynamic.
    pub fn is_dynamic(&self) -> bool {
        !self.name.is_empty()
    }
}

/// An ordered metric namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<NamespaceElement>);

impl Namespace {
    /// Creates a namespace made only of static elements.
    pub fn from_static<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Namespace(values.into_iter().map(NamespaceElement::new_static).collect())
    }

    /// Appends a static element.
    #[must_use]
    pub fn push_static<V: Into<String>>(mut self, value: V) -> Self {
        self.0.push(NamespaceElement::new_static(value));
        self
    }

    /// Appends a dynamic element.
    #[must_use]
    pub fn push_dynamic<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.0.push(NamespaceElement::new_dynamic(name, value));
        self
    }

    /// Returns an iterator over the elements, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, NamespaceElement> {
        self.0.iter()
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<NamespaceElement>> for Namespace {
    fn from(elements: Vec<NamespaceElement>) -> Self {
        Namespace(elements)
    }
}

impl<'a> IntoIterator for &'a Namespace {
    type Item = &'a NamespaceElement;
    type IntoIter = std::slice::Iter<'a, NamespaceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The value of a metric sample.
///
/// When decoding, integers are read as `U64` when non-negative and `I64` otherwise, and all other numbers as `F64`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Unsigned 64-bit integer.
    U64(u64),

    /// Signed 64-bit integer.
    I64(i64),

    /// Unsigned 32-bit integer.
    U32(u32),

    /// Signed 32-bit integer.
    I32(i32),

    /// 64-bit floating point number.
    F64(f64),

    /// 32-bit floating point number.
    F32(f32),

    /// Boolean.
    Bool(bool),

    /// String.
    String(String),
}

impl MetricValue {
    /// Narrows unsigned integers to the signed integer of the same width.
    ///
    /// Heka has no unsigned integer fields, so the bits are reinterpreted as-is: `u64::MAX` becomes `-1i64`, not a
    /// saturated or widened value. Every other kind is returned unchanged.
    #[must_use]
    pub fn narrowed(&self) -> MetricValue {
        match self {
            MetricValue::U64(v) => MetricValue::I64(*v as i64),
            MetricValue::U32(v) => MetricValue::I32(*v as i32),
            other => other.clone(),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for MetricValue {
                #[allow(clippy::useless_conversion)]
                fn from(v: $ty) -> Self {
                    MetricValue::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_value!(
    u64 => U64,
    i64 => I64,
    u32 => U32,
    i32 => I32,
    f64 => F64,
    f32 => F32,
    bool => Bool,
    String => String,
    &str => String,
);

/// Decodes `null` as the default value, as the host encodes empty maps and slices that way.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A metric sample, as handed over by the collection host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Namespace of the metric.
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: Namespace,

    /// Version of the plugin that collected the metric.
    #[serde(default)]
    pub version: i64,

    /// Tags attached to the metric.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,

    /// Unit of the value.
    #[serde(default)]
    pub unit: String,

    /// Human-readable description of the metric.
    #[serde(default)]
    pub description: String,

    /// Collected value.
    pub data: MetricValue,

    /// Collection time.
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Creates a metric collected now, with no tags.
    pub fn new<V: Into<MetricValue>>(namespace: Namespace, data: V) -> Self {
        Metric {
            namespace,
            version: 0,
            tags: BTreeMap::new(),
            unit: String::new(),
            description: String::new(),
            data: data.into(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the collection time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the unit of the value.
    #[must_use]
    pub fn with_unit<U: Into<String>>(mut self, unit: U) -> Self {
        self.unit = unit.into();
        self
    }
}
