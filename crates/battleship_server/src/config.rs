//! Server configuration: bind address, wire passphrase, and the timing
//! knobs the matchmaker/match driver use. A small trait plus a default
//! implementation, with no CLI flags since the server takes none.

use std::time::Duration;

pub trait ConfigProvider: Send + Sync {
    fn bind_addr(&self) -> String;
    fn passphrase(&self) -> String;
    fn turn_timeout(&self) -> Duration;
    fn reconnect_window(&self) -> Duration;
    fn post_match_pause(&self) -> Duration;
    fn max_pin_attempts(&self) -> u32;
    fn pin_length(&self) -> std::ops::RangeInclusive<usize>;
}

#[derive(Debug, Clone)]
pub struct DefaultConfig {
    pub bind_addr: String,
    pub passphrase: String,
    pub turn_timeout: Duration,
    pub reconnect_window: Duration,
    pub post_match_pause: Duration,
    pub max_pin_attempts: u32,
    pub pin_length: (usize, usize),
}

impl Default for DefaultConfig {
    fn default() -> Self {
        DefaultConfig {
            bind_addr: "127.0.0.1:5000".to_string(),
            passphrase: "battleship".to_string(),
            turn_timeout: Duration::from_secs(30),
            reconnect_window: Duration::from_secs(15),
            post_match_pause: Duration::from_secs(3),
            max_pin_attempts: 3,
            pin_length: (4, 6),
        }
    }
}

impl ConfigProvider for DefaultConfig {
    fn bind_addr(&self) -> String {
        self.bind_addr.clone()
    }

    fn passphrase(&self) -> String {
        self.passphrase.clone()
    }

    fn turn_timeout(&self) -> Duration {
        self.turn_timeout
    }

    fn reconnect_window(&self) -> Duration {
        self.reconnect_window
    }

    fn post_match_pause(&self) -> Duration {
        self.post_match_pause
    }

    fn max_pin_attempts(&self) -> u32 {
        self.max_pin_attempts
    }

    fn pin_length(&self) -> std::ops::RangeInclusive<usize> {
        self.pin_length.0..=self.pin_length.1
    }
}

pub fn default_config_provider() -> DefaultConfig {
    DefaultConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = default_config_provider();
        assert_eq!(cfg.turn_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.reconnect_window(), Duration::from_secs(15));
        assert_eq!(cfg.post_match_pause(), Duration::from_secs(3));
        assert_eq!(cfg.max_pin_attempts(), 3);
        assert_eq!(cfg.pin_length(), 4..=6);
    }
}
