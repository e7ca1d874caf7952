//! Serves one accepted connection: sample the clock once, send it, close.

use crate::clock::Clock;
use crate::server::error::Result;
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// `SO_LINGER` applied before close; `Some(ZERO)` makes the close abortive
    pub linger: Option<Duration>,
}

/// Writes the current time to `stream` and closes it.
///
/// The client never sends payload, so the read side is shut right away.
/// `stream` is consumed and therefore closed exactly once on every path.
pub fn handle_connection<C: Clock + ?Sized>(
    mut stream: TcpStream,
    clock: &C,
    options: &HandlerOptions,
) -> Result<usize> {
    let peer = stream.peer_addr().ok();

    if let Err(e) = stream.shutdown(Shutdown::Read) {
        debug!(error = %e, peer = ?peer, "Read-side shutdown failed");
    }

    let now = clock.current_local_time().map_err(|e| {
        error!(error = %e, peer = ?peer, "Unable to sample local clock; closing without reply");
        e
    })?;
    let message = now.encode();

    stream.write_all(&message).map_err(|e| {
        error!(error = %e, peer = ?peer, "Failed to send time");
        e
    })?;
    debug!(peer = ?peer, bytes = message.len(), time = %now, "Time sent");

    if let Err(e) = stream.shutdown(Shutdown::Write) {
        debug!(error = %e, peer = ?peer, "Write-side shutdown failed");
    }
    if let Some(linger) = options.linger {
        if let Err(e) = set_linger(&stream, linger) {
            debug!(error = %e, peer = ?peer, "Failed to set SO_LINGER");
        }
    }

    Ok(message.len())
}

#[cfg(unix)]
fn set_linger(stream: &TcpStream, linger: Duration) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let value = libc::linger {
        l_onoff: 1,
        l_linger: libc::c_int::try_from(linger.as_secs()).unwrap_or(libc::c_int::MAX),
    };
    // SAFETY: `value` outlives the call and the length matches its type.
    let rc = unsafe {
        libc::setsockopt(
            stream.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_LINGER,
            &value as *const libc::linger as *const libc::c_void,
            std::mem::size_of::<libc::linger>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_linger(_stream: &TcpStream, _linger: Duration) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "SO_LINGER requires a Unix host",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockError, MockClock};
    use crate::protocol::TimestampMessage;
    use crate::server::error::ServerError;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = thread::spawn(move || TcpStream::connect(addr).unwrap());
        let (server_side, _) = listener.accept().unwrap();
        (server_side, client.join().unwrap())
    }

    #[test]
    fn test_sends_one_line_and_closes() {
        let (server_side, mut client) = connected_pair();
        let mut clock = MockClock::new();
        clock
            .expect_current_local_time()
            .times(1)
            .returning(|| Ok(TimestampMessage::new(1_700_000_000, 250_000)));

        let sent = handle_connection(server_side, &clock, &HandlerOptions::default()).unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"1700000000,250000\r\n".to_vec());
        assert_eq!(sent, received.len());
    }

    #[test]
    fn test_clock_failure_closes_without_reply() {
        let (server_side, mut client) = connected_pair();
        let mut clock = MockClock::new();
        clock.expect_current_local_time().times(1).returning(|| {
            Err(ClockError::Read(io::Error::from(io::ErrorKind::Other)))
        });

        let result = handle_connection(server_side, &clock, &HandlerOptions::default());
        assert!(matches!(result, Err(ServerError::Clock(_))));

        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert!(received.is_empty());
    }

    #[test]
    fn test_linger_option_still_delivers() {
        let (server_side, mut client) = connected_pair();
        let mut clock = MockClock::new();
        clock
            .expect_current_local_time()
            .returning(|| Ok(TimestampMessage::new(5, 6)));
        let options = HandlerOptions {
            linger: Some(Duration::from_secs(2)),
        };

        handle_connection(server_side, &clock, &options).unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"5,6\r\n".to_vec());
    }
}
