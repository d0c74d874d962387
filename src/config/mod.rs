//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub supabase_service_role_key: String,
    /// Supabase JWT secret for token verification
    pub supabase_jwt_secret: String,
    /// Key for hashing pickup OTPs, defaults to the JWT secret
    pub otp_hash_secret: String,

    /// Allowed client origins for CORS (comma separated)
    pub client_origin: String,

    /// How long a merchant has to accept a new order
    pub order_accept_window: Duration,
    /// Interval of the auto-reject sweeper, `None` when disabled
    pub auto_reject_sweep: Option<Duration>,
    /// How long after completion a customer may request a return
    pub return_window: Duration,
    /// OTP verification attempts allowed per order in a burst
    pub otp_max_attempts: u32,
    /// One extra OTP attempt is granted per this period
    pub otp_attempt_refill: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let supabase_jwt_secret = required("SUPABASE_JWT_SECRET")?;
        let otp_hash_secret =
            env::var("OTP_HASH_SECRET").unwrap_or_else(|_| supabase_jwt_secret.clone());

        let sweep_secs: u64 = optional("AUTO_REJECT_SWEEP_SECS", 15)?;
        let otp_max_attempts: u32 = optional("OTP_MAX_ATTEMPTS", 5)?;
        if otp_max_attempts == 0 {
            return Err(ConfigError::Invalid("OTP_MAX_ATTEMPTS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            supabase_url: required("SUPABASE_URL")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret,
            otp_hash_secret,

            client_origin: required("CLIENT_ORIGIN")?,

            order_accept_window: window(
                "ORDER_ACCEPT_WINDOW_SECS",
                optional("ORDER_ACCEPT_WINDOW_SECS", 180)?,
                1,
            )?,
            auto_reject_sweep: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            return_window: window(
                "RETURN_WINDOW_HOURS",
                optional("RETURN_WINDOW_HOURS", 168)?,
                3600,
            )?,
            otp_max_attempts,
            otp_attempt_refill: Duration::from_secs(optional("OTP_ATTEMPT_REFILL_SECS", 60)?),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Longest accepted order/return window: ten years
const MAX_WINDOW_SECS: u64 = 10 * 365 * 24 * 3600;

/// `value` in units of `unit_secs`, rejected when zero or longer than
/// `MAX_WINDOW_SECS`
fn window(key: &'static str, value: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
    match value.checked_mul(unit_secs) {
        Some(secs) if secs > 0 && secs <= MAX_WINDOW_SECS => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid(key)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
impl Config {
    /// Configuration for tests, never touches the environment
    pub fn for_tests() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".to_string(),
            supabase_url: "http://127.0.0.1:9".to_string(),
            supabase_service_role_key: "service-role".to_string(),
            supabase_jwt_secret: "test-jwt-secret".to_string(),
            otp_hash_secret: "test-otp-secret".to_string(),
            client_origin: "http://localhost:3000".to_string(),
            order_accept_window: Duration::from_secs(180),
            auto_reject_sweep: None,
            return_window: Duration::from_secs(168 * 3600),
            otp_max_attempts: 3,
            otp_attempt_refill: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_scale_by_unit() {
        assert_eq!(
            window("RETURN_WINDOW_HOURS", 168, 3600).unwrap(),
            Duration::from_secs(168 * 3600)
        );
        assert_eq!(
            window("ORDER_ACCEPT_WINDOW_SECS", 180, 1).unwrap(),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn out_of_range_windows_are_invalid() {
        assert!(matches!(
            window("RETURN_WINDOW_HOURS", u64::MAX / 1000, 3600),
            Err(ConfigError::Invalid("RETURN_WINDOW_HOURS"))
        ));
        assert!(matches!(
            window("RETURN_WINDOW_HOURS", 100_000_000_000, 3600),
            Err(ConfigError::Invalid("RETURN_WINDOW_HOURS"))
        ));
        assert!(matches!(
            window("ORDER_ACCEPT_WINDOW_SECS", 0, 1),
            Err(ConfigError::Invalid("ORDER_ACCEPT_WINDOW_SECS"))
        ));
    }
}
