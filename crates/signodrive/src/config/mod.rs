use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub registration: RegistrationConfig,
    pub frappe: FrappeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let backend = env::var("APP_STORAGE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<StorageBackend>()?;
        let database_path = env::var("APP_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/signodrive.db"));

        let otp_code = env::var("APP_OTP_CODE").unwrap_or_else(|_| "123456".to_string());
        let ttl_minutes = parse_number("APP_REGISTRATION_TTL_MINUTES", 15)?;

        let base_url = env::var("FRAPPE_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let api_key = env::var("FRAPPE_API_KEY").ok().filter(|v| !v.is_empty());
        let api_secret = env::var("FRAPPE_API_SECRET").ok().filter(|v| !v.is_empty());
        let timeout_secs = parse_number("FRAPPE_TIMEOUT_SECS", 10)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                backend,
                database_path,
            },
            registration: RegistrationConfig {
                otp_code,
                session_ttl: Duration::minutes(ttl_minutes as i64),
            },
            frappe: FrappeConfig {
                base_url,
                api_key,
                api_secret,
                timeout_secs,
            },
        })
    }
}

fn parse_number(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Which storage implementation backs the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" | "database" | "db" => Ok(Self::Sqlite),
            other => Err(ConfigError::InvalidStorage(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_path: PathBuf,
}

/// Registration wizard knobs. The OTP is a fixed code until an SMS gateway is wired in.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    pub otp_code: String,
    pub session_ttl: Duration,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            otp_code: "123456".to_string(),
            session_ttl: Duration::minutes(15),
        }
    }
}

/// Connection details for the hosted Frappe backend.
#[derive(Debug, Clone, Default)]
pub struct FrappeConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub timeout_secs: u64,
}

impl FrappeConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidStorage(String),
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidStorage(value) => {
                write!(f, "APP_STORAGE must be 'memory' or 'sqlite' (found '{value}')")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidStorage(_)
            | ConfigError::InvalidNumber { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_STORAGE",
            "APP_DATABASE_PATH",
            "APP_OTP_CODE",
            "APP_REGISTRATION_TTL_MINUTES",
            "FRAPPE_BASE_URL",
            "FRAPPE_API_KEY",
            "FRAPPE_API_SECRET",
            "FRAPPE_TIMEOUT_SECS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.registration.otp_code, "123456");
        assert_eq!(config.registration.session_ttl, Duration::minutes(15));
        assert!(!config.frappe.is_configured());
        assert_eq!(config.frappe.timeout_secs, 10);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn frappe_base_url_is_trimmed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FRAPPE_BASE_URL", "https://signodrive.com/");
        env::set_var("APP_STORAGE", "sqlite");
        let config = AppConfig::load().expect("config loads");
        reset_env();
        assert_eq!(
            config.frappe.base_url.as_deref(),
            Some("https://signodrive.com")
        );
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn rejects_unknown_storage_backend() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_STORAGE", "postgres");
        let result = AppConfig::load();
        reset_env();
        assert!(matches!(result, Err(ConfigError::InvalidStorage(value)) if value == "postgres"));
    }

    #[test]
    fn rejects_non_numeric_ttl() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_REGISTRATION_TTL_MINUTES", "soon");
        let result = AppConfig::load();
        reset_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber {
                key: "APP_REGISTRATION_TTL_MINUTES"
            })
        ));
    }
}
