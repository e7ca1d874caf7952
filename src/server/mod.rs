//! Server module: hands the current time to every connecting client

pub mod config;
pub mod driver;
pub mod error;
pub mod handler;
pub mod monitor;

pub use config::ServerConfig;
pub use driver::TimeServer;
pub use error::{Result, ServerError};
pub use handler::{handle_connection, HandlerOptions};
pub use monitor::{ServerCounters, ServerStats};
