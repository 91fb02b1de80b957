use std::time::Duration;

use crate::config::QueueConfig;

/// How a single poll of the queue went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job was run and reported
    Processed,
    /// The queue was empty
    Idle,
    /// The queue failed or returned a malformed job
    Failed,
}

/// Fixed waits between polls that did not produce work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBackoff {
    idle: Duration,
    error: Duration,
}

impl PollBackoff {
    pub fn new(idle: Duration, error: Duration) -> Self {
        Self { idle, error }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.idle_backoff, config.error_backoff)
    }

    /// Wait before the next poll; `None` polls again immediately
    pub fn next_backoff(&self, outcome: PollOutcome) -> Option<Duration> {
        match outcome {
            PollOutcome::Processed => None,
            PollOutcome::Idle => Some(self.idle),
            PollOutcome::Failed => Some(self.error),
        }
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let backoff = PollBackoff::default();
        assert_eq!(backoff.next_backoff(PollOutcome::Processed), None);
        assert_eq!(
            backoff.next_backoff(PollOutcome::Idle),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            backoff.next_backoff(PollOutcome::Failed),
            Some(Duration::from_secs(5))
        );
    }
}
