use std::{
    io::Read as _,
    net::{SocketAddr, TcpListener},
    thread::{self, JoinHandle},
};

use prost::Message as _;

use crate::{
    codec::{RECORD_SEPARATOR, UNIT_SEPARATOR},
    proto::{Header, Message},
};

/// Splits a Heka stream back into messages.
pub fn decode_frames(mut buf: &[u8]) -> Vec<Message> {
    let mut messages = Vec::new();
    while !buf.is_empty() {
        assert_eq!(buf[0], RECORD_SEPARATOR, "frame does not start with a record separator");
        let header_len = usize::from(buf[1]);
        let header = Header::decode(&buf[2..2 + header_len]).expect("invalid header");
        assert_eq!(buf[2 + header_len], UNIT_SEPARATOR, "header not followed by a unit separator");

        let start = 3 + header_len;
        let end = start + header.message_length as usize;
        messages.push(Message::decode(&buf[start..end]).expect("invalid message"));
        buf = &buf[end..];
    }
    messages
}

/// A Heka TCP input for tests.
///
/// Accepts a fixed number of connections, one after the other, reading each until the client closes it.
pub struct FakeHeka {
    addr: SocketAddr,
    handle: JoinHandle<Vec<u8>>,
}

impl FakeHeka {
    pub fn start() -> Self {
        Self::with_connections(1)
    }

    pub fn with_connections(connections: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut buf = Vec::new();
            for _ in 0..connections {
                let (mut conn, _) = listener.accept().unwrap();
                conn.read_to_end(&mut buf).unwrap();
            }
            buf
        });

        FakeHeka { addr, handle }
    }

    pub fn remote_address(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for every client to disconnect and returns every message it sent.
    pub fn messages(self) -> Vec<Message> {
        decode_frames(&self.handle.join().unwrap())
    }
}

/// Returns a local address that nothing is listening on.
pub fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
