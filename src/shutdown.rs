//! Cooperative shutdown shared by the client and server loops.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often blocked loops re-check the shutdown flag
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Token whose `request` is observed by every clone
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    flag: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless shutdown is requested first.
    ///
    /// Returns `true` if the sleep ended because of a shutdown request.
    /// Durations too large to represent sleep until shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_requested() {
                return true;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    remaining.min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };
            thread::sleep(slice);
        }
    }
}

static SIGNAL_TARGET: OnceLock<ShutdownToken> = OnceLock::new();

extern "C" fn on_terminate(_signal: libc::c_int) {
    if let Some(token) = SIGNAL_TARGET.get() {
        token.request();
    }
}

/// Routes SIGTERM and SIGINT to `token`.
///
/// Handlers are installed without `SA_RESTART` so a blocked read returns
/// `Interrupted` and the caller re-checks the token. Only the first token
/// registered in a process receives signals.
pub fn install_signal_handlers(token: &ShutdownToken) -> nix::Result<()> {
    if SIGNAL_TARGET.set(token.clone()).is_err() {
        warn!("Signal handlers already routed to another shutdown token");
    }
    let action = SigAction::new(
        SigHandler::Handler(on_terminate),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGTERM, Signal::SIGINT] {
        // SAFETY: the handler only performs an atomic store through a token
        // that is fully initialized before the handler is installed.
        unsafe { sigaction(signal, &action) }?;
        debug!(signal = ?signal, "Signal handler installed");
    }
    Ok(())
}
