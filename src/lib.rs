//! Timepeer - minimal peer time synchronization
//!
//! A server answers every TCP connection with its wall-clock time as
//! `"<seconds>,<microseconds>\r\n"`. A client polls it, corrects the reading
//! for half the measured round trip, and steps or slews the local clock.

pub mod client;
pub mod clock;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod shutdown;
