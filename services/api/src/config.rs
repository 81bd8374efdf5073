use mint_core::bridge::BridgeConfig;
use mint_core::coordinator::{DEFAULT_QUEUE_CAPACITY, DropPolicy, QueueConfig};
use mint_core::serial::DEFAULT_BAUD_RATE;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Serial port of the expression controller; discovered when unset.
    pub serial_port: Option<String>,
    pub serial_baudrate: u32,
    pub api_auth_enabled: bool,
    /// Fixed API key. A random key is generated at startup when unset.
    pub api_key: Option<String>,
    pub queue_capacity: usize,
    pub queue_drop_policy: DropPolicy,
    pub log_level: Level,
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8003".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let serial_port = non_empty_var("SERIAL_PORT");
        let serial_baudrate = parse_var("SERIAL_BAUDRATE", DEFAULT_BAUD_RATE)?;

        let api_auth_enabled = parse_var("HARDWARE_API_AUTH", true)?;
        let api_key = non_empty_var("HARDWARE_API_KEY");

        let queue_capacity = parse_var("ACTION_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY)?;
        let queue_drop_policy = parse_var("ACTION_QUEUE_DROP_POLICY", DropPolicy::default())?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        if api_auth_enabled && api_key.as_deref().is_some_and(|k| k.len() < 16) {
            return Err(ConfigError::InvalidValue(
                "HARDWARE_API_KEY".to_string(),
                "must be at least 16 characters".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            serial_port,
            serial_baudrate,
            api_auth_enabled,
            api_key,
            queue_capacity,
            queue_drop_policy,
            log_level,
        })
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            serial_port: self.serial_port.clone(),
            baud_rate: self.serial_baudrate,
            ..BridgeConfig::default()
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            capacity: self.queue_capacity,
            drop_policy: self.queue_drop_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("SERIAL_PORT");
            env::remove_var("SERIAL_BAUDRATE");
            env::remove_var("HARDWARE_API_AUTH");
            env::remove_var("HARDWARE_API_KEY");
            env::remove_var("ACTION_QUEUE_CAPACITY");
            env::remove_var("ACTION_QUEUE_DROP_POLICY");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8003");
        assert_eq!(config.serial_port, None);
        assert_eq!(config.serial_baudrate, 115_200);
        assert!(config.api_auth_enabled);
        assert_eq!(config.api_key, None);
        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.queue_drop_policy, DropPolicy::Oldest);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:9000");
            env::set_var("SERIAL_PORT", "/dev/ttyUSB1");
            env::set_var("SERIAL_BAUDRATE", "921600");
            env::set_var("HARDWARE_API_AUTH", "false");
            env::set_var("HARDWARE_API_KEY", "short");
            env::set_var("ACTION_QUEUE_CAPACITY", "4");
            env::set_var("ACTION_QUEUE_DROP_POLICY", "newest");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.serial_baudrate, 921_600);
        assert!(!config.api_auth_enabled);
        assert_eq!(config.api_key.as_deref(), Some("short"));
        assert_eq!(config.log_level, Level::DEBUG);

        let bridge = config.bridge_config();
        assert_eq!(bridge.serial_port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(bridge.baud_rate, 921_600);
        assert!(bridge.auto_detect);

        let queue = config.queue_config();
        assert_eq!(queue.capacity, 4);
        assert_eq!(queue.drop_policy, DropPolicy::Newest);
    }

    #[test]
    #[serial]
    fn test_blank_serial_port_means_auto_detect() {
        clear_env_vars();
        unsafe {
            env::set_var("SERIAL_PORT", "   ");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.serial_port, None);
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_numbers_and_policy() {
        for (var, value) in [
            ("SERIAL_BAUDRATE", "fast"),
            ("ACTION_QUEUE_CAPACITY", "-1"),
            ("ACTION_QUEUE_DROP_POLICY", "random"),
            ("HARDWARE_API_AUTH", "maybe"),
        ] {
            clear_env_vars();
            unsafe {
                env::set_var(var, value);
            }
            match Config::from_env().unwrap_err() {
                ConfigError::InvalidValue(name, _) => assert_eq!(name, var),
                other => panic!("Expected InvalidValue for {var}, got {other:?}"),
            }
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_short_api_key_rejected_when_auth_enabled() {
        clear_env_vars();
        unsafe {
            env::set_var("HARDWARE_API_KEY", "tooshort");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "HARDWARE_API_KEY"),
            _ => panic!("Expected InvalidValue for HARDWARE_API_KEY"),
        }
    }
}
