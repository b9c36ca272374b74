//! Client Configuration
//!
//! Credentials and endpoint-selection enums. Credential loading from
//! `.env` files or CLI flags is the caller's concern; this module only
//! validates what it is given (plus a plain-environment-variable helper).

use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// Configuration errors, reported synchronously at construction.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required credential part is empty.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A required environment variable is missing.
    #[error("environment variable {0} not set")]
    MissingEnvVar(&'static str),
}

// =============================================================================
// Credentials
// =============================================================================

/// Alpaca API credentials.
///
/// The `Debug` implementation redacts the secret for safe logging.
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCredentials`] if either part is
    /// empty.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Result<Self, ConfigError> {
        let key = key.into();
        let secret = secret.into();

        if key.is_empty() {
            return Err(ConfigError::InvalidCredentials(
                "API key cannot be empty".to_string(),
            ));
        }
        if secret.is_empty() {
            return Err(ConfigError::InvalidCredentials(
                "API secret cannot be empty".to_string(),
            ));
        }

        Ok(Self { key, secret })
    }

    /// Read credentials from `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] if either variable is
    /// unset, or [`ConfigError::InvalidCredentials`] if one is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key = std::env::var("APCA_API_KEY_ID")
            .map_err(|_| ConfigError::MissingEnvVar("APCA_API_KEY_ID"))?;
        let secret = std::env::var("APCA_API_SECRET_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("APCA_API_SECRET_KEY"))?;
        Self::new(key, secret)
    }

    /// Get the API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the API secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Feeds and Environment
// =============================================================================

/// Equity market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    /// IEX (Investors Exchange) - free tier.
    #[default]
    Iex,
    /// SIP (Securities Information Processor) - full market data.
    Sip,
}

impl Feed {
    /// Feed name as it appears in websocket URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Iex => "iex",
            Self::Sip => "sip",
        }
    }
}

/// Options market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptionsFeed {
    /// Indicative prices - free tier.
    #[default]
    Indicative,
    /// OPRA (Options Price Reporting Authority) - full market data.
    Opra,
}

impl OptionsFeed {
    /// Feed name as it appears in websocket URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Indicative => "indicative",
            Self::Opra => "opra",
        }
    }
}

/// Trading environment (paper vs live).
///
/// Only the trade-updates stream distinguishes the two; market data
/// streams serve the same data either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Paper trading environment (simulated).
    #[default]
    Paper,
    /// Live trading environment (real money).
    Live,
}

impl Environment {
    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Environment name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}
