//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every key is optional. Anything left out falls back to
//! the built-in value, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{JoydriveError, Result};

/// Highest BCM pin number exposed on the Raspberry Pi header.
pub const MAX_BCM_PIN: u8 = 27;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub motor: MotorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Capacity of the per-session queue of client-facing log lines
    #[serde(default = "default_log_queue_capacity")]
    pub log_queue_capacity: usize,
}

/// GPIO pin assignment (BCM numbering)
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    #[serde(default = "default_pwm_left")]
    pub pwm_left: u8,

    #[serde(default = "default_dir_left")]
    pub dir_left: u8,

    #[serde(default = "default_pwm_right")]
    pub pwm_right: u8,

    #[serde(default = "default_dir_right")]
    pub dir_right: u8,

    #[serde(default = "default_pwm_lift")]
    pub pwm_lift: u8,

    #[serde(default = "default_dir_lift")]
    pub dir_lift: u8,
}

/// Motor mixing and PWM configuration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct MotorConfig {
    /// Speed magnitude that maps to a 100% duty cycle
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: f64,

    #[serde(default = "default_turn_gain")]
    pub turn_gain: f64,

    #[serde(default = "default_deadzone")]
    pub deadzone: f64,

    /// `|x|` above this engages the lift instead of driving
    #[serde(default = "default_lift_threshold")]
    pub lift_threshold: f64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily rolling log file. Console only when unset.
    #[serde(default)]
    pub file_dir: Option<String>,
}

// Default value functions
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_static_dir() -> String { "static".to_string() }
fn default_log_queue_capacity() -> usize { 32 }

fn default_pwm_left() -> u8 { 17 }
fn default_dir_left() -> u8 { 27 }
fn default_pwm_right() -> u8 { 18 }
fn default_dir_right() -> u8 { 22 }
fn default_pwm_lift() -> u8 { 23 }
fn default_dir_lift() -> u8 { 24 }

fn default_max_speed() -> f64 { 2000.0 }
fn default_pwm_frequency_hz() -> f64 { 1000.0 }
fn default_turn_gain() -> f64 { 0.7 }
fn default_deadzone() -> f64 { 0.05 }
fn default_lift_threshold() -> f64 { 0.8 }

fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            static_dir: default_static_dir(),
            log_queue_capacity: default_log_queue_capacity(),
        }
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            pwm_left: default_pwm_left(),
            dir_left: default_dir_left(),
            pwm_right: default_pwm_right(),
            dir_right: default_dir_right(),
            pwm_lift: default_pwm_lift(),
            dir_lift: default_dir_lift(),
        }
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
            turn_gain: default_turn_gain(),
            deadzone: default_deadzone(),
            lift_threshold: default_lift_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

impl PinConfig {
    /// All six pins as `(name, number)` pairs.
    pub fn named(&self) -> [(&'static str, u8); 6] {
        [
            ("pwm_left", self.pwm_left),
            ("dir_left", self.dir_left),
            ("pwm_right", self.pwm_right),
            ("dir_right", self.dir_right),
            ("pwm_lift", self.pwm_lift),
            ("dir_lift", self.dir_lift),
        ]
    }
}

fn invalid(msg: impl std::fmt::Display) -> JoydriveError {
    JoydriveError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joydrive::config::Config;
    ///
    /// let config = Config::load("joydrive.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Server
        if self.server.bind_address.is_empty() {
            return Err(invalid("bind_address cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("port must be between 1 and 65535"));
        }

        if self.server.log_queue_capacity == 0 {
            return Err(invalid("log_queue_capacity must be greater than 0"));
        }

        // Pins must be distinct and on the header
        let mut seen = HashSet::new();
        for (name, pin) in self.pins.named() {
            if pin > MAX_BCM_PIN {
                return Err(invalid(format!(
                    "{} pin {} is out of bounds (must be 0-{})",
                    name, pin, MAX_BCM_PIN
                )));
            }
            if !seen.insert(pin) {
                return Err(invalid(format!("{} pin {} is assigned twice", name, pin)));
            }
        }

        // Motor
        if !self.motor.max_speed.is_finite() || self.motor.max_speed <= 0.0 {
            return Err(invalid("max_speed must be a finite number greater than 0"));
        }

        if !(1.0..=20_000.0).contains(&self.motor.pwm_frequency_hz) {
            return Err(invalid("pwm_frequency_hz must be between 1 and 20000"));
        }

        if !(0.0..=1.0).contains(&self.motor.turn_gain) {
            return Err(invalid("turn_gain must be between 0.0 and 1.0"));
        }

        if !(0.0..=0.25).contains(&self.motor.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 0.25"));
        }

        let lift = self.motor.lift_threshold;
        if lift.is_nan() || lift <= self.motor.deadzone || lift >= 1.0 {
            return Err(invalid(
                "lift_threshold must be greater than deadzone and less than 1.0",
            ));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if matches!(self.logging.file_dir.as_deref(), Some("")) {
            return Err(invalid("logging file_dir cannot be empty when set"));
        }

        Ok(())
    }
}
