//! Constants used throughout the client

/// Connect deadline in seconds
pub const CONNECT_TIMEOUT_SECS: u64 = 8;

/// Per-read deadline in seconds, re-armed for every read
pub const READ_TIMEOUT_SECS: u64 = 8;

/// Overall bound on receiving one message, in seconds
pub const MESSAGE_TIMEOUT_SECS: u64 = 30;

/// Pause between successful sessions in seconds
pub const SYNC_INTERVAL_SECS: u64 = 60;

/// Retry delay after the remote could not be reached
pub const CONNECT_RETRY_SECS: u64 = 5;

/// Retry delay when no local socket could be created
pub const SOCKET_RETRY_SECS: u64 = 15;

/// Retry delay after a reachable peer sent a bad or incomplete message
pub const PROTOCOL_RETRY_SECS: u64 = 1;

/// Largest offset, in whole seconds, that is applied by stepping the clock
pub const MAX_STEP_SECS: u64 = 15;

/// Smallest sub-second offset, in microseconds, worth slewing
pub const MIN_SLEW_MICROS: u64 = 5;

/// Upper bound accepted for any timeout or retry flag, in seconds
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;
