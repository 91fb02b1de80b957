mod config;
mod connect;
mod init;
mod probe;
mod queue;
mod report;

pub use config::ConfigValidationError;
pub use connect::ConnectError;
pub use init::InitializationError;
pub use probe::ProbeError;
pub use queue::QueueError;
pub use report::ReportError;
