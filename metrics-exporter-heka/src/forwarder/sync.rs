use std::{
    io::{self, Write as _},
    net::{Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs as _, UdpSocket},
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use tracing::{debug, trace};

use super::{ForwarderConfiguration, RemoteAddr};

fn resolve(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    let addrs = (host, port).to_socket_addrs()?.collect::<Vec<_>>();
    if addrs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("no addresses found for '{host}'")));
    }
    Ok(addrs)
}

/// A blocking connection to a Heka input, used for the duration of one batch.
pub enum Connection {
    Tcp(TcpStream),

    Udp(UdpSocket),

    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Opens a connection to the configured remote address.
    ///
    /// Every resolved address is tried in turn, each bounded by the connect timeout, and the last error is returned if
    /// none of them accepts the connection. Writes on the returned connection are bounded by the write timeout.
    pub fn open(config: &ForwarderConfiguration) -> io::Result<Self> {
        match &config.remote_addr {
            RemoteAddr::Tcp { host, port } => {
                let mut last_err = None;
                for addr in resolve(host, *port)? {
                    trace!(%addr, "Connecting to Heka.");
                    match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                        Ok(stream) => {
                            stream.set_write_timeout(Some(config.write_timeout))?;
                            stream.set_nodelay(true)?;
                            return Ok(Connection::Tcp(stream));
                        }
                        Err(e) => {
                            debug!(%addr, error = %e, "Failed to connect to address.");
                            last_err = Some(e);
                        }
                    }
                }

                Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
            }

            RemoteAddr::Udp { host, port } => {
                let addrs = resolve(host, *port)?;
                let local: SocketAddr = if addrs[0].is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };

                UdpSocket::bind(local).and_then(|socket| {
                    socket.connect(&addrs[..])?;
                    socket.set_write_timeout(Some(config.write_timeout))?;
                    Ok(Connection::Udp(socket))
                })
            }

            #[cfg(unix)]
            RemoteAddr::Unix(path) => UnixStream::connect(path).and_then(|socket| {
                socket.set_write_timeout(Some(config.write_timeout))?;
                Ok(Connection::Unix(socket))
            }),
        }
    }

    /// Sends a single encoded message.
    pub fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Connection::Tcp(stream) => stream.write_all(buf),

            Connection::Udp(socket) => match socket.send(buf) {
                Ok(n) if n == buf.len() => Ok(()),
                Ok(n) => Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("datagram truncated to {n} of {} bytes", buf.len()),
                )),
                Err(e) => Err(e),
            },

            #[cfg(unix)]
            Connection::Unix(stream) => stream.write_all(buf),
        }
    }

    /// Closes the connection, flushing anything still buffered.
    pub fn close(self) {
        let result = match self {
            Connection::Tcp(mut stream) => stream.flush().and_then(|()| stream.shutdown(Shutdown::Both)),
            Connection::Udp(_) => Ok(()),
            #[cfg(unix)]
            Connection::Unix(mut stream) => stream.flush().and_then(|()| stream.shutdown(Shutdown::Both)),
        };

        if let Err(e) = result {
            debug!(error = %e, "Error while closing connection.");
        }
    }
}
