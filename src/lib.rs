pub mod connection;
pub use connection::{Connection, ConnectionStream};

pub mod error;
pub use error::Error;

pub mod frame;
pub use frame::Frame;

pub(crate) mod shutdown;
pub(crate) use shutdown::Shutdown;

pub mod clients;
pub use clients::Client;

pub mod cmd;
pub use cmd::{Command, CommandKind};

pub mod config;
pub use config::Config;

pub mod bench;
pub mod conformance;

pub mod harness;
pub use harness::Harness;

pub mod report;
pub use report::Report;

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_HOST: &str = "127.0.0.1";

pub type LResult<T> = std::result::Result<T, crate::error::Error>;
