//! Server and match configuration, validated before the server binds.

use shared::{
    PlayField, DEFAULT_MATCH_DURATION, DEFAULT_MAX_ASTEROIDS, DEFAULT_PORT, DEFAULT_TICK_RATE,
};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick rate must be at least 1Hz")]
    ZeroTickRate,

    #[error("match duration must be at least one second")]
    ZeroMatchDuration,

    #[error("play field must have positive dimensions, got {width}x{height}")]
    InvalidField { width: f32, height: f32 },

    #[error("write timeout must be non-zero")]
    ZeroWriteTimeout,

    #[error("max line length must be non-zero")]
    ZeroLineLength,
}

/// Rules for a single match.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub field: PlayField,
    pub duration: Duration,
    pub max_asteroids: usize,
    /// Enables the ship-versus-ship damage rule.
    pub ship_collisions: bool,
    /// Fixed RNG seed for asteroid spawns; random when `None`.
    pub seed: Option<u64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            field: PlayField::default(),
            duration: Duration::from_secs(DEFAULT_MATCH_DURATION as u64),
            max_asteroids: DEFAULT_MAX_ASTEROIDS,
            ship_collisions: false,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    /// Ticks the loop may fall behind before it stops catching up.
    pub max_tick_lag: u32,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
    /// Frames buffered per connection before broadcasts start dropping.
    pub outgoing_buffer: usize,
    /// Longest inbound line in bytes; longer lines end the session.
    pub max_line_len: usize,
    /// Append-only match results file. Disabled when `None`.
    pub results_path: Option<PathBuf>,
    pub match_config: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            tick_rate: DEFAULT_TICK_RATE,
            max_tick_lag: 5,
            handshake_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(2),
            outgoing_buffer: 32,
            max_line_len: 4096,
            results_path: Some(PathBuf::from("winners.txt")),
            match_config: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.match_config.duration < Duration::from_secs(1) {
            return Err(ConfigError::ZeroMatchDuration);
        }
        let field = self.match_config.field;
        if !(field.width > 0.0 && field.height > 0.0) {
            return Err(ConfigError::InvalidField {
                width: field.width,
                height: field.height,
            });
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::ZeroWriteTimeout);
        }
        if self.max_line_len == 0 {
            return Err(ConfigError::ZeroLineLength);
        }
        Ok(())
    }
}
