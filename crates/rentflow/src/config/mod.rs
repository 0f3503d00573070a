use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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
    pub payments: PaymentsConfig,
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

        let platform_fee_bps = env::var("APP_PLATFORM_FEE_BPS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidFeeBps)?;
        if platform_fee_bps > 10_000 {
            return Err(ConfigError::InvalidFeeBps);
        }

        let gateway_timeout_secs = env::var("APP_GATEWAY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidGatewayTimeout)?;

        let webhook_secret =
            env::var("APP_WEBHOOK_SECRET").unwrap_or_else(|_| "sandbox-webhook-secret".to_string());

        let oversight_recipient =
            env::var("APP_OVERSIGHT_RECIPIENT").unwrap_or_else(|_| "ops-oversight".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            payments: PaymentsConfig {
                platform_fee_bps,
                webhook_secret,
                gateway_timeout: Duration::from_secs(gateway_timeout_secs),
                oversight_recipient,
            },
        })
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

/// Settings for the payment gateway integration and revenue split.
///
/// The oversight recipient is an explicit configuration value so platform
/// notifications and refund authority never depend on querying for whoever
/// currently holds an admin role.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    /// Platform share of every successful payment, in basis points.
    pub platform_fee_bps: u32,
    /// Shared secret for authenticating inbound gateway callbacks.
    pub webhook_secret: String,
    /// Upper bound applied to gateway initialize/verify calls.
    pub gateway_timeout: Duration,
    /// Recipient id for platform oversight notifications and refunds.
    pub oversight_recipient: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFeeBps,
    InvalidGatewayTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFeeBps => {
                write!(f, "APP_PLATFORM_FEE_BPS must be an integer between 0 and 10000")
            }
            ConfigError::InvalidGatewayTimeout => {
                write!(f, "APP_GATEWAY_TIMEOUT_SECS must be a valid u64")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidFeeBps
            | ConfigError::InvalidGatewayTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
