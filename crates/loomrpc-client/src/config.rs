use std::time::Duration;

/// Client transport configuration.
///
/// # Default Configuration
///
/// - `connect_timeout_ms`: 3000
/// - `call_timeout_ms`: 3000 (used when a call does not carry its own bound)
/// - `async_permits`: 1000 (concurrently outstanding async calls, FIFO-fair)
/// - `lock_timeout_ms`: 3000 (bounded wait on the connection-table lock)
/// - `sweep_interval_ms`: 1000
/// - `sweep_initial_delay_ms`: 3000
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum time to establish a TCP connection
    pub connect_timeout_ms: u64,
    /// Default per-call timeout when the invocation has none
    pub call_timeout_ms: u64,
    /// Capacity of the async admission semaphore
    pub async_permits: usize,
    /// Maximum time to wait for the connection-table creation lock
    pub lock_timeout_ms: u64,
    /// Period of the housekeeping sweep over in-flight requests
    pub sweep_interval_ms: u64,
    /// Delay before the first housekeeping sweep
    pub sweep_initial_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3000,
            call_timeout_ms: 3000,
            async_permits: 1000,
            lock_timeout_ms: 3000,
            sweep_interval_ms: 1000,
            sweep_initial_delay_ms: 3000,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.connect_timeout_ms, 3000);
        assert_eq!(config.call_timeout_ms, 3000);
        assert_eq!(config.async_permits, 1000);
        assert_eq!(config.lock_timeout_ms, 3000);
        assert_eq!(config.sweep_interval_ms, 1000);
        assert_eq!(config.sweep_initial_delay_ms, 3000);
    }

    #[test]
    fn test_duration_accessors() {
        let config = ClientConfig {
            connect_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.call_timeout(), Duration::from_millis(3000));
    }
}
