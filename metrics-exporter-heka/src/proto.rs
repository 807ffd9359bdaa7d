//! Heka message types.
//!
//! These mirror `message.proto` from Heka. Only the parts of the schema this crate emits are declared: fields that are
//! never set, such as HMAC signing in the stream header, are left out, which keeps the encoded output identical.
#![allow(missing_docs)]

use thiserror::Error;

/// Errors that could occur while constructing a field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// Heka requires every field to be named.
    #[error("field name must not be empty")]
    EmptyName,
}

/// Type of the values held by a field.
///
/// .proto:
/// ```protobuf
/// enum ValueType {
///   STRING  = 0;
///   BYTES   = 1;
///   INTEGER = 2;
///   DOUBLE  = 3;
///   BOOL    = 4;
/// }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ValueType {
    /// UTF-8 strings.
    String = 0,
    /// Raw bytes.
    Bytes = 1,
    /// Signed 64-bit integers.
    Integer = 2,
    /// 64-bit floating point numbers.
    Double = 3,
    /// Booleans.
    Bool = 4,
}

/// A value that can be stored in a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// A single string.
    String(String),
    /// A list of strings.
    Strings(Vec<String>),
    /// An integer.
    Integer(i64),
    /// A floating point number.
    Double(f64),
    /// A boolean.
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::Strings(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Double(f64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// A named, typed field of a message.
///
/// .proto:
/// ```protobuf
/// message Field {
///   required string    name           = 1;
///   optional ValueType value_type     = 2 [default = STRING];
///   optional string    representation = 3;
///   repeated string    value_string   = 4;
///   repeated bytes     value_bytes    = 5;
///   repeated int64     value_integer  = 6 [packed=true];
///   repeated double    value_double   = 7 [packed=true];
///   repeated bool      value_bool     = 8 [packed=true];
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct Field {
    #[prost(string, required, tag = "1")]
    pub name: String,
    #[prost(enumeration = "ValueType", optional, tag = "2")]
    pub value_type: Option<i32>,
    #[prost(string, optional, tag = "3")]
    pub representation: Option<String>,
    #[prost(string, repeated, tag = "4")]
    pub value_string: Vec<String>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub value_bytes: Vec<Vec<u8>>,
    #[prost(int64, repeated, packed = "true", tag = "6")]
    pub value_integer: Vec<i64>,
    #[prost(double, repeated, packed = "true", tag = "7")]
    pub value_double: Vec<f64>,
    #[prost(bool, repeated, packed = "true", tag = "8")]
    pub value_bool: Vec<bool>,
}

impl Field {
    /// Creates a field holding the given value.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn new<N, V>(name: N, value: V) -> Result<Field, FieldError>
    where
        N: Into<String>,
        V: Into<FieldValue>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(FieldError::EmptyName);
        }

        let mut field = Field { name, ..Field::default() };
        match value.into() {
            FieldValue::String(v) => {
                field.set_value_type(ValueType::String);
                field.value_string.push(v);
            }
            FieldValue::Strings(v) => {
                field.set_value_type(ValueType::String);
                field.value_string = v;
            }
            FieldValue::Integer(v) => {
                field.set_value_type(ValueType::Integer);
                field.value_integer.push(v);
            }
            FieldValue::Double(v) => {
                field.set_value_type(ValueType::Double);
                field.value_double.push(v);
            }
            FieldValue::Bool(v) => {
                field.set_value_type(ValueType::Bool);
                field.value_bool.push(v);
            }
        }
        Ok(field)
    }

    /// Appends a string to the values of this field.
    pub fn push_string<S: Into<String>>(&mut self, value: S) {
        self.value_string.push(value.into());
    }
}

/// A Heka message.
///
/// .proto:
/// ```protobuf
/// message Message {
///   required bytes  uuid        = 1;
///   required int64  timestamp   = 2; // nanoseconds since the Unix epoch
///   optional string type        = 3;
///   optional string logger      = 4;
///   optional int32  severity    = 5 [default = 7];
///   optional string payload     = 6;
///   optional string env_version = 7;
///   optional int32  pid         = 8;
///   optional string hostname    = 9;
///   repeated Field  fields      = 10;
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct Message {
    #[prost(bytes = "vec", required, tag = "1")]
    pub uuid: Vec<u8>,
    #[prost(int64, required, tag = "2")]
    pub timestamp: i64,
    #[prost(string, optional, tag = "3")]
    pub r#type: Option<String>,
    #[prost(string, optional, tag = "4")]
    pub logger: Option<String>,
    #[prost(int32, optional, tag = "5", default = "7")]
    pub severity: Option<i32>,
    #[prost(string, optional, tag = "6")]
    pub payload: Option<String>,
    #[prost(string, optional, tag = "7")]
    pub env_version: Option<String>,
    #[prost(int32, optional, tag = "8")]
    pub pid: Option<i32>,
    #[prost(string, optional, tag = "9")]
    pub hostname: Option<String>,
    #[prost(message, repeated, tag = "10")]
    pub fields: Vec<Field>,
}

impl Message {
    /// Returns the fields with the given name, in message order.
    pub fn fields_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }
}

/// Header preceding each message in a Heka stream.
///
/// .proto:
/// ```protobuf
/// message Header {
///   required uint32 message_length = 1;
///   // HMAC fields 3-6 are not used.
/// }
/// ```
#[derive(prost::Message, Clone, PartialEq)]
pub struct Header {
    #[prost(uint32, required, tag = "1")]
    pub message_length: u32,
}
