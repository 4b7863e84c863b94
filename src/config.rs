//! Venue configuration.
//!
//! Configuration is loaded from environment variables, each with a
//! default matching the classic venue setup (one server of capacity 10
//! with two rooms, twenty users, an admin doing fifteen actions).

use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::admin::DEFAULT_ACTION_COUNT;
use crate::error::ChatError;
use crate::server::ServerConfig;

/// Default server capacity.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default number of rooms, main room included.
pub const DEFAULT_ROOM_COUNT: usize = 2;

/// Default number of user actors.
pub const DEFAULT_USER_COUNT: usize = 20;

/// Default admin name.
pub const DEFAULT_ADMIN_NAME: &str = "admin";

/// Default pacing scale in milliseconds.
pub const DEFAULT_PACING_MS: u64 = 1000;

/// Default highest user ID (IDs are drawn from 1..=max).
pub const DEFAULT_MAX_USER_ID: u32 = 100;

/// Default desire bounds (inclusive).
pub const DEFAULT_DESIRE_MIN: u32 = 10;
pub const DEFAULT_DESIRE_MAX: u32 = 15;

/// How events are written by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFormat {
    /// Human-readable lines through `tracing`
    #[default]
    Text,
    /// One JSON object per line on stdout
    Json,
}

impl FromStr for EventFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidEventFormat(other.to_string())),
        }
    }
}

/// Venue configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server capacity, also used for every room.
    pub capacity: usize,

    /// Rooms per server, at least 2.
    pub room_count: usize,

    /// Number of user actors to start.
    pub user_count: usize,

    /// Label for the admin actor.
    pub admin_name: String,

    /// Admin toggle actions before shutdown.
    pub admin_actions: usize,

    /// Base pause for both admin and users.
    pub pacing_scale: Duration,

    /// Highest user ID handed out.
    pub max_user_id: u32,

    /// Inclusive range initial desire is drawn from.
    pub desire_range: RangeInclusive<u32>,

    /// Event output format.
    pub event_format: EventFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            room_count: DEFAULT_ROOM_COUNT,
            user_count: DEFAULT_USER_COUNT,
            admin_name: DEFAULT_ADMIN_NAME.to_string(),
            admin_actions: DEFAULT_ACTION_COUNT,
            pacing_scale: Duration::from_millis(DEFAULT_PACING_MS),
            max_user_id: DEFAULT_MAX_USER_ID,
            desire_range: DEFAULT_DESIRE_MIN..=DEFAULT_DESIRE_MAX,
            event_format: EventFormat::Text,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a valid number, got '{value}': {reason}")]
    InvalidNumber {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("CHAT_EVENT_FORMAT must be 'text' or 'json', got '{0}'")]
    InvalidEventFormat(String),

    #[error("Invalid server configuration: {0}")]
    InvalidServer(#[from] ChatError),
}

impl From<ConfigError> for ChatError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidServer(e) => e,
            other => ChatError::InvalidConfig(other.to_string()),
        }
    }
}

/// Parse an optional variable, falling back to `default`.
fn parse_var<T>(vars: &HashMap<String, String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match vars.get(var) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let capacity = parse_var(vars, "CHAT_CAPACITY", DEFAULT_CAPACITY)?;
        let room_count = parse_var(vars, "CHAT_ROOM_COUNT", DEFAULT_ROOM_COUNT)?;
        let user_count = parse_var(vars, "CHAT_USER_COUNT", DEFAULT_USER_COUNT)?;

        let admin_name = vars
            .get("CHAT_ADMIN_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADMIN_NAME.to_string());

        let admin_actions = parse_var(vars, "CHAT_ADMIN_ACTIONS", DEFAULT_ACTION_COUNT)?;

        let pacing_ms = parse_var(vars, "CHAT_PACING_MS", DEFAULT_PACING_MS)?;

        let max_user_id = parse_var(vars, "CHAT_MAX_USER_ID", DEFAULT_MAX_USER_ID)?;
        let desire_min = parse_var(vars, "CHAT_DESIRE_MIN", DEFAULT_DESIRE_MIN)?;
        let desire_max = parse_var(vars, "CHAT_DESIRE_MAX", DEFAULT_DESIRE_MAX)?;

        let event_format = match vars.get("CHAT_EVENT_FORMAT") {
            Some(value) => value.parse()?,
            None => EventFormat::default(),
        };

        let config = Self {
            capacity,
            room_count,
            user_count,
            admin_name,
            admin_actions,
            pacing_scale: Duration::from_millis(pacing_ms),
            max_user_id,
            desire_range: desire_min..=desire_max,
            event_format,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the server shape, the user ID range and the desire range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server_config().validate()?;

        if self.max_user_id == 0 {
            return Err(ConfigError::InvalidRange(
                "CHAT_MAX_USER_ID must be greater than 0".to_string(),
            ));
        }

        if self.desire_range.is_empty() {
            return Err(ConfigError::InvalidRange(format!(
                "CHAT_DESIRE_MIN ({}) must not exceed CHAT_DESIRE_MAX ({})",
                self.desire_range.start(),
                self.desire_range.end()
            )));
        }

        Ok(())
    }

    /// Server construction parameters.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            capacity: self.capacity,
            room_count: self.room_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.capacity, 10);
        assert_eq!(config.room_count, 2);
        assert_eq!(config.user_count, 20);
        assert_eq!(config.admin_actions, 15);
        assert_eq!(config.pacing_scale, Duration::from_secs(1));
        assert_eq!(config.desire_range, 10..=15);
        assert_eq!(config.event_format, EventFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("CHAT_CAPACITY", "4"),
            ("CHAT_ROOM_COUNT", "5"),
            ("CHAT_USER_COUNT", "3"),
            ("CHAT_ADMIN_NAME", "Liam"),
            ("CHAT_ADMIN_ACTIONS", "7"),
            ("CHAT_PACING_MS", "25"),
            ("CHAT_MAX_USER_ID", "50"),
            ("CHAT_DESIRE_MIN", "1"),
            ("CHAT_DESIRE_MAX", "2"),
            ("CHAT_EVENT_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.capacity, 4);
        assert_eq!(config.room_count, 5);
        assert_eq!(config.user_count, 3);
        assert_eq!(config.admin_name, "Liam");
        assert_eq!(config.admin_actions, 7);
        assert_eq!(config.pacing_scale, Duration::from_millis(25));
        assert_eq!(config.max_user_id, 50);
        assert_eq!(config.desire_range, 1..=2);
        assert_eq!(config.event_format, EventFormat::Json);
        assert_eq!(
            config.server_config(),
            ServerConfig {
                capacity: 4,
                room_count: 5
            }
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_vars(&vars(&[("CHAT_CAPACITY", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { ref var, .. } if var == "CHAT_CAPACITY"));
    }

    #[test]
    fn test_negative_rejected() {
        let err = Config::from_vars(&vars(&[("CHAT_USER_COUNT", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn test_server_shape_validated() {
        let err = Config::from_vars(&vars(&[("CHAT_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidServer(ChatError::InvalidCapacity)
        ));

        let err = Config::from_vars(&vars(&[("CHAT_ROOM_COUNT", "1")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidServer(ChatError::TooFewRooms(1))
        ));
    }

    #[test]
    fn test_desire_range_order() {
        let err = Config::from_vars(&vars(&[("CHAT_DESIRE_MIN", "9"), ("CHAT_DESIRE_MAX", "3")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRange(_)));
    }

    #[test]
    fn test_validate_struct_literal() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            max_user_id: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(_))));

        #[allow(clippy::reversed_empty_ranges)]
        let config = Config {
            desire_range: 5..=4,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRange(_))));

        let config = Config {
            capacity: 0,
            ..Config::default()
        };
        assert_eq!(ChatError::from(config.validate().unwrap_err()), ChatError::InvalidCapacity);
    }

    #[test]
    fn test_invalid_event_format() {
        let err = Config::from_vars(&vars(&[("CHAT_EVENT_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEventFormat(ref f) if f == "xml"));
    }
}
