//! Client module: connects to a time server and disciplines the local clock

pub mod config;
pub mod connector;
pub mod constants;
pub mod driver;
pub mod error;
pub mod policy;
pub mod session;

pub use config::Config;
pub use connector::{Connector, TcpConnector};
pub use driver::{Backoff, ClientDriver, DriverSummary};
pub use error::{ClientError, ConnectError, Result, SessionError};
pub use policy::{Adjustment, AdjustmentPolicy, DelayEstimate};
pub use session::{ClientSession, SessionOutcome, SessionState};
