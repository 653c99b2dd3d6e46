//! Protocol configuration.

use std::time::Duration;

/// Cap on simultaneously outstanding blink submissions.
pub const MAX_ACTIVE_PROMISES: usize = 1000;

/// Configuration for the blink protocol handler and submitter.
///
/// # Example
///
/// ```
/// use blink_core::BlinkConfig;
/// use std::time::Duration;
///
/// let config = BlinkConfig::default()
///     .with_submit_timeout(Duration::from_secs(10))
///     .with_submit_fanout(2);
/// ```
#[derive(Debug, Clone)]
pub struct BlinkConfig {
    /// How long a submission waits for a quorum verdict before resolving
    /// with a timeout.
    ///
    /// Default: 30 seconds
    pub submit_timeout: Duration,

    /// How many entry-point service nodes a submission is sent to.
    ///
    /// Default: 4
    pub submit_fanout: usize,

    /// Accepted distance between a blink authorization height and the local
    /// chain height, in either direction.
    ///
    /// Default: 2 blocks
    pub height_tolerance: u64,

    /// Cap on simultaneously outstanding submissions.
    ///
    /// Default: [`MAX_ACTIVE_PROMISES`]
    pub max_active_submissions: usize,

    /// How far below the current height cached blink state survives. Must
    /// cover the height tolerance plus quorum relay delay so signatures for
    /// recently-authorized txs are not dropped during small reorgs.
    ///
    /// Default: 5 blocks
    pub cache_retention_blocks: u64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(30),
            submit_fanout: 4,
            height_tolerance: 2,
            max_active_submissions: MAX_ACTIVE_PROMISES,
            cache_retention_blocks: 5,
        }
    }
}

impl BlinkConfig {
    /// Set the submission timeout.
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Set the entry-point fan-out.
    pub fn with_submit_fanout(mut self, fanout: usize) -> Self {
        self.submit_fanout = fanout;
        self
    }

    /// Set the authorization height tolerance.
    pub fn with_height_tolerance(mut self, tolerance: u64) -> Self {
        self.height_tolerance = tolerance;
        self
    }

    /// Set the pending submission cap.
    pub fn with_max_active_submissions(mut self, max: usize) -> Self {
        self.max_active_submissions = max;
        self
    }

    /// Set the cache retention window.
    pub fn with_cache_retention_blocks(mut self, blocks: u64) -> Self {
        self.cache_retention_blocks = blocks;
        self
    }

    /// Create a config with timeouts shrunk for tests.
    pub fn for_testing() -> Self {
        Self {
            submit_timeout: Duration::from_millis(50),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BlinkConfig::default();
        assert_eq!(config.submit_timeout, Duration::from_secs(30));
        assert_eq!(config.submit_fanout, 4);
        assert_eq!(config.height_tolerance, 2);
        assert_eq!(config.max_active_submissions, MAX_ACTIVE_PROMISES);
        assert!(config.cache_retention_blocks >= config.height_tolerance);
    }

    #[test]
    fn test_builder_methods() {
        let config = BlinkConfig::default()
            .with_submit_timeout(Duration::from_secs(5))
            .with_submit_fanout(2)
            .with_max_active_submissions(10);
        assert_eq!(config.submit_timeout, Duration::from_secs(5));
        assert_eq!(config.submit_fanout, 2);
        assert_eq!(config.max_active_submissions, 10);
    }
}
