use std::{fmt, time::Duration};

#[cfg(unix)]
use std::path::PathBuf;

pub mod sync;

/// Address of a Heka input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RemoteAddr {
    /// A `TcpInput`, reached over TCP.
    Tcp {
        /// Host name or IP address.
        host: String,
        /// Port.
        port: u16,
    },

    /// A `UdpInput`, reached over UDP.
    Udp {
        /// Host name or IP address.
        host: String,
        /// Port.
        port: u16,
    },

    /// A stream input listening on a Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl RemoteAddr {
    /// Returns the transport ID for the remote address, such as `tcp` for TCP.
    pub const fn transport_id(&self) -> &'static str {
        match self {
            RemoteAddr::Tcp { .. } => "tcp",
            RemoteAddr::Udp { .. } => "udp",
            #[cfg(unix)]
            RemoteAddr::Unix(_) => "unix",
        }
    }
}

fn parse_host_port(addr: &str) -> Result<(String, u16), String> {
    let (host, port) =
        addr.rsplit_once(':').ok_or_else(|| format!("missing port in address '{addr}'"))?;

    let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    if host.is_empty() {
        return Err(format!("missing host in address '{addr}'"));
    }

    let port = port.parse::<u16>().map_err(|e| format!("invalid port '{port}': {e}"))?;
    Ok((host.to_owned(), port))
}

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        let (scheme, rest) = addr.split_once("://").unwrap_or(("tcp", addr));
        match scheme {
            "tcp" => parse_host_port(rest).map(|(host, port)| RemoteAddr::Tcp { host, port }),
            "udp" => parse_host_port(rest).map(|(host, port)| RemoteAddr::Udp { host, port }),
            #[cfg(unix)]
            "unix" if !rest.is_empty() => Ok(RemoteAddr::Unix(PathBuf::from(rest))),
            #[cfg(unix)]
            "unix" => Err("missing socket path".to_string()),
            _ => Err(format!("invalid scheme '{scheme}' (expected 'tcp', 'udp' or 'unix')")),
        }
    }
}

impl fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAddr::Tcp { host, port } | RemoteAddr::Udp { host, port } if host.contains(':') => {
                write!(f, "{}://[{}]:{}", self.transport_id(), host, port)
            }
            RemoteAddr::Tcp { host, port } | RemoteAddr::Udp { host, port } => {
                write!(f, "{}://{}:{}", self.transport_id(), host, port)
            }
            #[cfg(unix)]
            RemoteAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Forwarder configuration.
#[derive(Clone, Debug)]
pub struct ForwarderConfiguration {
    pub remote_addr: RemoteAddr,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schemes() {
        assert_eq!(
            RemoteAddr::try_from("tcp://localhost:5565"),
            Ok(RemoteAddr::Tcp { host: "localhost".to_string(), port: 5565 })
        );
        assert_eq!(
            RemoteAddr::try_from("udp://10.0.0.1:4880"),
            Ok(RemoteAddr::Udp { host: "10.0.0.1".to_string(), port: 4880 })
        );
        assert_eq!(
            RemoteAddr::try_from("127.0.0.1:5565"),
            Ok(RemoteAddr::Tcp { host: "127.0.0.1".to_string(), port: 5565 })
        );
        assert_eq!(
            RemoteAddr::try_from("tcp://[::1]:5565"),
            Ok(RemoteAddr::Tcp { host: "::1".to_string(), port: 5565 })
        );

        #[cfg(unix)]
        assert_eq!(
            RemoteAddr::try_from("unix:///var/run/heka.sock"),
            Ok(RemoteAddr::Unix(PathBuf::from("/var/run/heka.sock")))
        );
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(RemoteAddr::try_from("tcp://localhost").is_err());
        assert!(RemoteAddr::try_from("tcp://:5565").is_err());
        assert!(RemoteAddr::try_from("tcp://localhost:port").is_err());
        assert!(RemoteAddr::try_from("tcp://localhost:70000").is_err());
        assert!(RemoteAddr::try_from("http://localhost:5565").is_err());
        assert!(RemoteAddr::try_from("unix://").is_err());
    }

    #[test]
    fn displays_as_parsed() {
        for addr in ["tcp://localhost:5565", "udp://10.0.0.1:4880", "tcp://[::1]:5565"] {
            assert_eq!(RemoteAddr::try_from(addr).unwrap().to_string(), addr);
        }
    }
}
