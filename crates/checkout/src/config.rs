//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VERDANT_PLATFORM_URL` - Base URL of the commerce platform API
//! - `VERDANT_PLATFORM_TOKEN` - Platform API access token
//! - `VERDANT_CARRIER_URL` - Base URL of the carrier rating API
//! - `VERDANT_CARRIER_KEY` - Carrier API key
//! - `STRIPE_SECRET_KEY` - Stripe secret key (required unless payments disabled)
//!
//! ## Optional
//! - `VERDANT_PAYMENTS_ENABLED` - Take payment at checkout (default: true)
//! - `VERDANT_TAX_ENABLED` - Collect sales tax (default: true)
//! - `VERDANT_TAX_RATE` - Nexus tax rate as a decimal (default: 0.07)
//! - `VERDANT_TAX_STATES` - Comma-separated nexus state codes (default: GA)
//! - `VERDANT_TAX_LABEL` - Tax line label (default: Sales Tax)
//! - `VERDANT_SEEDLINGS_PER_BOX` - Shipping box capacity in seedling units (default: 72)
//! - `VERDANT_MEMBERSHIP_RATE` - Lifetime membership discount rate (default: 0.10)

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::tax::TaxConfig;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Checkout pipeline configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Commerce platform API configuration
    pub platform: PlatformConfig,
    /// Carrier rating API configuration
    pub carrier: CarrierConfig,
    /// Stripe secret key, absent when payments are disabled
    pub stripe_secret_key: Option<SecretString>,
    /// Whether to take payment at checkout
    pub payments_enabled: bool,
    /// Sales tax configuration
    pub tax: TaxConfig,
    /// Shipping box capacity in seedling units
    pub seedlings_per_box: u32,
    /// Lifetime membership discount rate
    pub membership_rate: Decimal,
}

/// Commerce platform API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct PlatformConfig {
    /// Base URL of the platform API
    pub base_url: String,
    /// API access token (server-side only)
    pub token: SecretString,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Carrier rating API configuration.
#[derive(Clone)]
pub struct CarrierConfig {
    /// Base URL of the carrier API
    pub base_url: String,
    /// API key
    pub api_key: SecretString,
}

impl std::fmt::Debug for CarrierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let platform = PlatformConfig {
            base_url: get_required_url("VERDANT_PLATFORM_URL")?,
            token: get_required_secret("VERDANT_PLATFORM_TOKEN")?,
        };
        let carrier = CarrierConfig {
            base_url: get_required_url("VERDANT_CARRIER_URL")?,
            api_key: get_required_secret("VERDANT_CARRIER_KEY")?,
        };

        let payments_enabled = get_bool("VERDANT_PAYMENTS_ENABLED", true)?;
        let stripe_secret_key = if payments_enabled {
            Some(get_required_secret("STRIPE_SECRET_KEY")?)
        } else {
            get_optional_env("STRIPE_SECRET_KEY").map(SecretString::from)
        };

        let tax = TaxConfig {
            enabled: get_bool("VERDANT_TAX_ENABLED", true)?,
            default_rate: get_decimal("VERDANT_TAX_RATE", "0.07")?,
            nexus_states: get_env_or_default("VERDANT_TAX_STATES", "GA")
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            label: get_env_or_default("VERDANT_TAX_LABEL", "Sales Tax"),
        };

        let seedlings_per_box = get_env_or_default("VERDANT_SEEDLINGS_PER_BOX", "72")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("VERDANT_SEEDLINGS_PER_BOX".to_string(), e.to_string())
            })?;
        let membership_rate = get_decimal("VERDANT_MEMBERSHIP_RATE", "0.10")?;

        Ok(Self {
            platform,
            carrier,
            stripe_secret_key,
            payments_enabled,
            tax,
            seedlings_per_box,
            membership_rate,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable that must parse as a URL.
///
/// Returned without a trailing slash so path joins are uniform.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    let parsed = Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a boolean environment variable ("true"/"false", "1"/"0").
fn get_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                format!("expected boolean, got '{other}'"),
            )),
        },
    }
}

/// Parse a decimal environment variable with a default.
fn get_decimal(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    get_env_or_default(key, default)
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
