use crate::error::{Error, Result};
use crate::{
    BROADCAST_ADDRESS, DEFAULT_BUFFER_SIZE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT_MS,
};

/// Number of full frames the read buffer holds when no explicit capacity is set.
const DEFAULT_READ_FRAMES: usize = 4;

/// How the retransmission timeout is applied across attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlinePolicy {
    /// Every attempt gets the full timeout.
    #[default]
    PerAttempt,

    /// The whole write shares one timeout, split evenly between attempts.
    Total,
}

/// Session configuration. Immutable once a session is built.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum payload bytes carried by one DATA frame.
    pub buffer_size: usize,

    /// Retransmission deadline in milliseconds.
    pub timeout_ms: u32,

    /// Total transmission attempts per write before it fails.
    pub retries: u8,

    /// Station address placed in every outgoing frame.
    pub address: u8,

    /// Whether `timeout_ms` applies to each attempt or to the whole write.
    pub deadline_policy: DeadlinePolicy,

    /// How often a blocked write polls the transport for an ACK.
    pub poll_interval_ms: u32,

    /// Reply with NACK when a frame fails integrity verification.
    pub nack_on_corruption: bool,

    /// Bound on undelivered bytes held for `read`.
    pub read_capacity: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            address: BROADCAST_ADDRESS,
            deadline_policy: DeadlinePolicy::PerAttempt,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            nack_on_corruption: false,
            read_capacity: DEFAULT_BUFFER_SIZE * DEFAULT_READ_FRAMES,
        }
    }

    /// Sets the buffer size. The read capacity follows unless it was
    /// already set larger.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self.read_capacity = self
            .read_capacity
            .max(size.saturating_mul(DEFAULT_READ_FRAMES));
        self
    }

    pub fn with_timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_deadline_policy(mut self, policy: DeadlinePolicy) -> Self {
        self.deadline_policy = policy;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_nack_on_corruption(mut self, enable: bool) -> Self {
        self.nack_on_corruption = enable;
        self
    }

    pub fn with_read_capacity(mut self, bytes: usize) -> Self {
        self.read_capacity = bytes;
        self
    }

    /// Per-attempt deadline in milliseconds after applying the deadline policy.
    pub fn attempt_timeout_ms(&self) -> u64 {
        match self.deadline_policy {
            DeadlinePolicy::PerAttempt => u64::from(self.timeout_ms),
            DeadlinePolicy::Total => {
                (u64::from(self.timeout_ms) / u64::from(self.retries.max(1))).max(1)
            }
        }
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::InvalidConfig("buffer_size must be non-zero"));
        }
        if self.retries == 0 {
            return Err(Error::InvalidConfig("retries must allow at least one attempt"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout_ms must be non-zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be non-zero"));
        }
        if self.read_capacity < self.buffer_size {
            return Err(Error::InvalidConfig("read_capacity must hold one full frame"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.buffer_size, 256);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.retries, 1);
        assert_eq!(config.address, 0xFF);
        assert_eq!(config.read_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_buffer_size_grows_read_capacity() {
        let config = Config::new().with_buffer_size(1024);
        assert_eq!(config.read_capacity, 4096);

        let config = Config::new().with_read_capacity(10_000).with_buffer_size(8);
        assert_eq!(config.read_capacity, 10_000);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(Config::new().with_buffer_size(0).validate().is_err());
        assert!(Config::new().with_retries(0).validate().is_err());
        assert!(Config::new().with_timeout_ms(0).validate().is_err());
        assert!(Config::new().with_poll_interval_ms(0).validate().is_err());
        assert!(
            Config::new()
                .with_buffer_size(64)
                .with_read_capacity(32)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_attempt_timeout() {
        let config = Config::new().with_timeout_ms(300).with_retries(3);
        assert_eq!(config.attempt_timeout_ms(), 300);

        let config = config.with_deadline_policy(DeadlinePolicy::Total);
        assert_eq!(config.attempt_timeout_ms(), 100);
    }
}
