//! Encoding of messages into the Heka stream format.
//!
//! Every message on a Heka stream is framed as follows:
//!
//! ```text
//! +------+------------+--------------------+------+--------------------+
//! | 0x1E | header len | protobuf `Header`  | 0x1F | protobuf `Message` |
//! +------+------------+--------------------+------+--------------------+
//! ```
//!
//! The header length is a single byte, and the header carries the length of the message that follows it.
use bytes::{BufMut as _, BytesMut};
use prost::Message as _;
use thiserror::Error;

use crate::proto::{Header, Message};

/// Record separator, marking the start of a frame.
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// Unit separator, marking the end of the header.
pub const UNIT_SEPARATOR: u8 = 0x1F;

/// Largest header that can be framed, as its length is written as a single byte.
pub const MAX_HEADER_SIZE: usize = 255;

/// Default largest message accepted by a Heka server.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

// The header carries the message length as a `uint32`.
const MAX_FRAMED_MESSAGE_SIZE: u32 = u32::MAX;

/// Errors that could occur while encoding a message.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoded message exceeds the maximum message size.
    #[error("message is {len} bytes, exceeding the maximum of {max} bytes")]
    MessageTooLarge {
        /// Encoded length of the message.
        len: usize,
        /// Maximum message size.
        max: usize,
    },

    /// The encoded header does not fit in a frame.
    #[error("header is {len} bytes, exceeding the maximum of {MAX_HEADER_SIZE} bytes")]
    HeaderTooLarge {
        /// Encoded length of the header.
        len: usize,
    },

    /// Protobuf encoding failed.
    #[error("protobuf encoding failed: {0}")]
    Protobuf(#[from] prost::EncodeError),
}

/// Encodes messages into bytes ready to be written to the transport.
pub trait Encoder: Send + Sync {
    /// Encodes `message` into `buf`.
    ///
    /// Anything already in `buf` is left in place, and the encoded message is appended after it.
    ///
    /// # Errors
    ///
    /// If the message cannot be encoded, an error is returned and the contents appended to `buf` are unspecified.
    fn encode(&self, message: &Message, buf: &mut BytesMut) -> Result<(), EncodeError>;
}

/// Frames messages for a Heka stream input.
#[derive(Clone, Debug)]
pub struct StreamEncoder {
    max_message_size: usize,
}

impl StreamEncoder {
    /// Creates a new `StreamEncoder` accepting messages up to `max_message_size` bytes.
    ///
    /// The limit is capped at `u32::MAX` bytes, the largest length a frame header can carry.
    pub fn new(max_message_size: usize) -> Self {
        let cap = usize::try_from(MAX_FRAMED_MESSAGE_SIZE).unwrap_or(usize::MAX);
        StreamEncoder { max_message_size: max_message_size.min(cap) }
    }

    /// Returns the largest message this encoder accepts, in bytes.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for StreamEncoder {
    fn default() -> Self {
        StreamEncoder::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl Encoder for StreamEncoder {
    fn encode(&self, message: &Message, buf: &mut BytesMut) -> Result<(), EncodeError> {
        let message_len = message.encoded_len();
        if message_len > self.max_message_size {
            return Err(EncodeError::MessageTooLarge { len: message_len, max: self.max_message_size });
        }

        let message_length = u32::try_from(message_len)
            .map_err(|_| EncodeError::MessageTooLarge { len: message_len, max: self.max_message_size })?;
        let header = Header { message_length };
        let header_len = header.encoded_len();
        if header_len > MAX_HEADER_SIZE {
            return Err(EncodeError::HeaderTooLarge { len: header_len });
        }

        buf.reserve(header_len + message_len + 3);
        buf.put_u8(RECORD_SEPARATOR);
        buf.put_u8(header_len as u8);
        header.encode(buf)?;
        buf.put_u8(UNIT_SEPARATOR);
        message.encode(buf)?;

        Ok(())
    }
}
