//! Process-wide configuration
//!
//! Every tunable named by the external-interfaces section lives here as a
//! plain field with the same default as the original firmware, in the style
//! of a single gateway configuration struct overridden at startup.

/// Top-level configuration for the bridge
#[derive(Debug, Clone)]
pub struct Config {
    /// SNMP community string accepted on GET/GETNEXT
    pub community: String,
    /// Wi-Fi connect timeout (firmware target only; unused on host)
    pub connect_timeout_ms: u32,
    /// Wi-Fi SSID (firmware target only)
    pub wifi_ssid: String,
    /// Wi-Fi password (firmware target only)
    pub wifi_password: String,
    /// Period between dynamic-table refresh cycles, once bootstrap is done
    pub dynamic_update_period_s: u32,
    /// Backoff period after a failed bootstrap heartbeat or sanity check
    pub init_retry_period_s: u32,
    /// Max descriptors pumped into the engine per scheduler tick
    pub enqueue_burst_per_tick: u8,
    /// Bounded job queue capacity
    pub queue_size: usize,
    /// Cap on a fixed-length expected response
    pub max_expected_len: u16,
    /// Cap on a framed response's ending-byte sequence length
    pub max_ending_len: u8,
    /// Fixed timeout waiting for `tx_done()`
    pub tx_timeout_ms: u32,
    /// Cooldown applied before a retried job may start again
    pub retry_cooldown_ms: u32,
    /// Upper bound on state-machine steps taken within one `tick()`
    pub max_steps_per_tick: u8,
    /// Optional cooldown applied between unrelated jobs
    pub interjob_cooldown_ms: u32,
    /// Consecutive heartbeat failures before the degraded-state side effect fires
    pub heartbeat_failure_threshold: u8,
    /// Heartbeat polling interval
    pub heartbeat_interval_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            community: "public".to_string(),
            connect_timeout_ms: 10_000,
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            dynamic_update_period_s: 10,
            init_retry_period_s: 5,
            enqueue_burst_per_tick: 8,
            queue_size: 32,
            max_expected_len: 256,
            max_ending_len: 8,
            tx_timeout_ms: 250,
            retry_cooldown_ms: 25,
            max_steps_per_tick: 8,
            interjob_cooldown_ms: 0,
            heartbeat_failure_threshold: 5,
            heartbeat_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Build a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds between dynamic refresh cycles
    pub fn dynamic_update_period_ms(&self) -> u32 {
        self.dynamic_update_period_s * 1000
    }

    /// Milliseconds to wait before re-attempting a failed bootstrap
    pub fn init_retry_period_ms(&self) -> u32 {
        self.init_retry_period_s * 1000
    }

    /// Read `self.community` and the Wi-Fi credentials from the process
    /// environment, leaving any unset variable at its current value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("UPS_SNMP_COMMUNITY") {
            self.community = v;
        }
        if let Ok(v) = std::env::var("UPS_WIFI_SSID") {
            self.wifi_ssid = v;
        }
        if let Ok(v) = std::env::var("UPS_WIFI_PASSWORD") {
            self.wifi_password = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.community, "public");
        assert_eq!(config.queue_size, 32);
        assert_eq!(config.heartbeat_failure_threshold, 5);
    }

    #[test]
    fn test_derived_periods() {
        let config = Config::default();
        assert_eq!(config.dynamic_update_period_ms(), 10_000);
        assert_eq!(config.init_retry_period_ms(), 5_000);
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("UPS_SNMP_COMMUNITY", "private");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.community, "private");
        std::env::remove_var("UPS_SNMP_COMMUNITY");
    }
}
