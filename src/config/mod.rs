mod collector;
mod connector;
mod http;
mod identity;
mod logging;
mod probe;
mod queue;
mod tester;

pub use collector::Config as CollectorConfig;
pub use connector::Config as ConnectorConfig;
pub use http::Config as HttpConfig;
pub use identity::Config as IdentityConfig;
pub use logging::Config as LoggingConfig;
pub use probe::parse_bool_flag;
pub use probe::Config as ProbeConfig;
pub use queue::Config as QueueConfig;
pub use tester::Config as TesterConfig;
