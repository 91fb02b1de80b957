pub mod config;
pub mod connector;
pub mod errors;
pub mod http_api;
pub mod job;
pub mod logging;
pub mod queue;
pub mod reporter;
pub mod result;
pub mod stats;
pub mod tester;
pub mod utils;
pub mod worker;

pub use config::ProbeConfig;
pub use connector::{Connection, Connector, Protocol};
pub use errors::ProbeError;
pub use http_api::start_http_server;
pub use job::{Job, ServerConfig, Tier};
pub use logging::setup_logging;
pub use queue::{JobSource, RedisJobQueue};
pub use reporter::{ResultSink, WebhookReporter};
pub use result::{StreamingResult, TestResult};
pub use stats::ProbeStats;
pub use tester::{Measurements, TesterSuite};
pub use worker::{PollBackoff, ProbeWorker};
