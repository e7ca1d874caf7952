use crate::client::error::ConnectError;
use crate::protocol::FrameSource;
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Opens one stream connection to the time server per call
pub trait Connector {
    type Stream: FrameSource;

    /// Human-readable description of the remote endpoint
    fn target(&self) -> String;

    /// Connect, giving up after `timeout`.
    fn connect(&self, timeout: Duration) -> Result<Self::Stream, ConnectError>;
}

/// TCP implementation of [`Connector`]
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves on a helper thread so a stalled lookup is bounded by
    /// `timeout`. An abandoned lookup finishes in the background.
    fn resolve(&self, timeout: Duration) -> Result<Vec<SocketAddr>, ConnectError> {
        let (tx, rx) = mpsc::channel();
        let endpoint = (self.host.clone(), self.port);
        thread::Builder::new()
            .name("timepeer-resolve".into())
            .spawn(move || {
                let resolved = endpoint
                    .to_socket_addrs()
                    .map(|addrs| addrs.collect::<Vec<SocketAddr>>());
                let _ = tx.send(resolved);
            })
            .map_err(ConnectError::LocalResources)?;

        let addrs = match rx.recv_timeout(timeout) {
            Ok(resolved) => resolved.map_err(|source| ConnectError::Resolve {
                target: self.target(),
                source,
            })?,
            Err(RecvTimeoutError::Timeout) => {
                debug!(endpoint = %self.target(), "Name resolution timed out");
                return Err(ConnectError::TimedOut {
                    target: self.target(),
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ConnectError::Resolve {
                    target: self.target(),
                    source: io::Error::new(ErrorKind::Other, "resolver thread exited"),
                })
            }
        };
        if addrs.is_empty() {
            return Err(ConnectError::Resolve {
                target: self.target(),
                source: io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
            });
        }
        Ok(addrs)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolution and every address attempt share the single `timeout`.
    fn connect(&self, timeout: Duration) -> Result<TcpStream, ConnectError> {
        let deadline = Instant::now().checked_add(timeout);
        let remaining = || match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };

        let mut last_error = None;
        for addr in self.resolve(timeout)? {
            let budget = remaining();
            if budget.is_zero() {
                last_error = Some(io::Error::from(ErrorKind::TimedOut));
                break;
            }
            debug!(addr = %addr, timeout_ms = budget.as_millis() as u64, "Connecting");
            match TcpStream::connect_timeout(&addr, budget) {
                Ok(stream) => {
                    debug!(addr = %addr, "Connected");
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(addr = %addr, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        let error = last_error.unwrap_or_else(|| io::Error::from(ErrorKind::NotFound));
        Err(classify(self.target(), error))
    }
}

/// Sorts an I/O failure from connect into the retry classes the driver uses.
pub fn classify(target: String, error: io::Error) -> ConnectError {
    if let Some(code) = error.raw_os_error() {
        if [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM].contains(&code) {
            warn!(error = %error, "Local socket resources exhausted");
            return ConnectError::LocalResources(error);
        }
    }
    match error.kind() {
        ErrorKind::ConnectionRefused => ConnectError::Refused { target },
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ConnectError::TimedOut { target },
        _ => ConnectError::Unreachable {
            target,
            source: error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connector = TcpConnector::new("127.0.0.1", port);
        assert!(connector.connect(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new("127.0.0.1", port);
        let result = connector.connect(Duration::from_secs(2));
        assert!(matches!(result, Err(ConnectError::Refused { .. })));
    }

    #[test]
    fn test_classify_fd_exhaustion_as_local() {
        let error = classify(
            "example:1".into(),
            io::Error::from_raw_os_error(libc::EMFILE),
        );
        assert!(error.is_local());
    }

    #[test]
    fn test_classify_timeout() {
        let error = classify("example:1".into(), io::Error::from(ErrorKind::TimedOut));
        assert!(matches!(error, ConnectError::TimedOut { .. }));
        assert!(!error.is_local());
    }

    #[test]
    fn test_every_address_fails_within_one_deadline() {
        // "localhost" may resolve to both ::1 and 127.0.0.1; neither listens.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let connector = TcpConnector::new("localhost", port);
        let started = Instant::now();
        let result = connector.connect(Duration::from_millis(300));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_zero_budget_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connector = TcpConnector::new("127.0.0.1", port);
        let result = connector.connect(Duration::ZERO);
        assert!(matches!(
            result,
            Err(ConnectError::TimedOut { .. }) | Err(ConnectError::Resolve { .. })
        ));
    }

    #[test]
    fn test_target_format() {
        assert_eq!(TcpConnector::new("10.0.0.1", 37).target(), "10.0.0.1:37");
    }
}
