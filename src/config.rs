//! Tunable knobs for an [`crate::engine::Engine`] run. Defaults match the
//! original tool's hard-coded constants.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub probe_initial_interval: Duration,
    pub probe_max_interval: Duration,
    pub probe_backoff_factor: f64,
    pub recently_seen_window: Duration,
    pub ingress_channel_capacity: usize,
    pub receive_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_initial_interval: Duration::from_secs(4),
            probe_max_interval: Duration::from_secs(15),
            probe_backoff_factor: 1.02,
            recently_seen_window: Duration::from_secs(60),
            ingress_channel_capacity: 32,
            receive_buffer_size: 1500,
        }
    }
}

impl EngineConfig {
    /// Clamps nonsensical values instead of letting a misconfigured caller
    /// panic or deadlock the engine.
    pub fn normalized(mut self) -> Self {
        if self.probe_max_interval < self.probe_initial_interval {
            self.probe_max_interval = self.probe_initial_interval;
        }
        if self.probe_backoff_factor < 1.0 {
            self.probe_backoff_factor = 1.0;
        }
        self.ingress_channel_capacity = self.ingress_channel_capacity.max(1);
        self.receive_buffer_size = self.receive_buffer_size.max(64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_inverted_interval_bounds() {
        let config = EngineConfig {
            probe_initial_interval: Duration::from_secs(20),
            probe_max_interval: Duration::from_secs(5),
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.probe_max_interval, Duration::from_secs(20));
    }

    #[test]
    fn normalized_floors_backoff_factor_and_buffer_sizes() {
        let config = EngineConfig {
            probe_backoff_factor: 0.5,
            ingress_channel_capacity: 0,
            receive_buffer_size: 0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(config.probe_backoff_factor, 1.0);
        assert_eq!(config.ingress_channel_capacity, 1);
        assert_eq!(config.receive_buffer_size, 64);
    }
}
