use crate::clock::Clock;
use crate::server::error::{Result, ServerError};
use crate::server::handler::{handle_connection, HandlerOptions};
use crate::server::monitor::{ServerCounters, ServerStats};
use crate::shutdown::ShutdownToken;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long the accept loop idles when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Back-off after a failed accept
const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Accept loop handing each connection to its own worker thread.
///
/// The listener is owned here and released when the server is dropped.
/// Workers share nothing but the clock and the counters.
pub struct TimeServer<C> {
    listener: TcpListener,
    clock: Arc<C>,
    options: HandlerOptions,
    counters: ServerCounters,
}

impl<C: Clock + 'static> TimeServer<C> {
    /// Binds and listens on `addr`. Failure here is fatal to the caller.
    pub fn bind(addr: &str, clock: C, options: HandlerOptions) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        info!(address = %addr, linger = ?options.linger, "Time server listening");
        Ok(Self {
            listener,
            clock: Arc::new(clock),
            options,
            counters: ServerCounters::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn counters(&self) -> ServerCounters {
        self.counters.clone()
    }

    /// Serves connections until `shutdown` is requested, then waits for
    /// outstanding workers.
    pub fn run(&self, shutdown: &ShutdownToken) -> ServerStats {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();

        while !shutdown.is_requested() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.counters.increment_accepted();
                    debug!(peer = %peer, "Connection accepted");
                    if let Some(worker) = self.dispatch(stream, peer) {
                        workers.push(worker);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    shutdown.sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.counters.increment_accept_errors();
                    error!(error = %e, "Failed to accept connection");
                    shutdown.sleep(ACCEPT_RETRY_DELAY);
                }
            }
            workers = reap(workers);
        }

        debug!(outstanding = workers.len(), "Waiting for connection workers");
        for worker in workers {
            join(worker);
        }

        let stats = self.counters.snapshot();
        info!(
            accepted = stats.accepted,
            served = stats.served,
            failed = stats.failed,
            accept_errors = stats.accept_errors,
            "Time server stopped"
        );
        stats
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) -> Option<JoinHandle<()>> {
        if let Err(e) = stream.set_nonblocking(false) {
            self.counters.increment_failed();
            error!(error = %e, peer = %peer, "Failed to prepare connection");
            return None;
        }

        let clock = Arc::clone(&self.clock);
        let options = self.options;
        let counters = self.counters.clone();
        let spawned = thread::Builder::new()
            .name(format!("timepeer-conn-{}", peer))
            .spawn(move || match handle_connection(stream, &*clock, &options) {
                Ok(_) => counters.increment_served(),
                Err(e) => {
                    counters.increment_failed();
                    debug!(error = %e, peer = %peer, "Connection failed");
                }
            });

        match spawned {
            Ok(worker) => Some(worker),
            Err(e) => {
                self.counters.increment_failed();
                let e = ServerError::Spawn(e);
                error!(error = %e, peer = %peer, "Dropping connection");
                None
            }
        }
    }
}

fn reap(workers: Vec<JoinHandle<()>>) -> Vec<JoinHandle<()>> {
    let (finished, running): (Vec<_>, Vec<_>) =
        workers.into_iter().partition(|worker| worker.is_finished());
    for worker in finished {
        join(worker);
    }
    running
}

fn join(worker: JoinHandle<()>) {
    if worker.join().is_err() {
        warn!("Connection worker panicked");
    }
}
