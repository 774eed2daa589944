//! Server configuration.
//!
//! One explicit value constructed at startup and handed to every
//! component; no component reads the environment or a global secret on
//! its own.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use tracing::{debug, info, instrument};

use crate::stamp::SigningSecret;

/// Environment variable holding the signing secret.
const SECRET_KEY: &str = "SECRET_KEY";

/// Complete server configuration.
#[derive(Debug, Clone, Getters, new)]
pub struct ServerConfig {
    /// Signing secret for stamps and tokens.
    secret: SigningSecret,
    /// Sqlite database path for the persisted mode.
    database_url: String,
    /// Public base URL minted links point at.
    base_url: String,
    /// Bind address.
    host: String,
    /// Bind port.
    port: u16,
}

impl ServerConfig {
    /// Loads configuration from the environment.
    ///
    /// `SECRET_KEY` is required; `DATABASE_URL`, `BASE_URL`, `HOST`, and
    /// `PORT` fall back to local-development defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `SECRET_KEY` is absent or too short,
    /// or `PORT` does not parse.
    #[instrument]
    pub fn from_env() -> Result<Self, ConfigError> {
        debug!("Loading config from environment");
        let secret = std::env::var(SECRET_KEY)
            .map_err(|_| ConfigError::new(format!("{SECRET_KEY} environment variable not set")))?;
        let secret = SigningSecret::new(secret.into_bytes())
            .map_err(|e| ConfigError::new(format!("Unusable {SECRET_KEY}: {e}")))?;

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "/tmp/chess.db".to_string());
        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::new(format!("PORT is not a port number: '{raw}'")))?,
            Err(_) => 3000,
        };

        let config = Self::new(secret, database_url, base_url, host, port);
        info!(
            database_url = %config.database_url,
            base_url = %config.base_url,
            host = %config.host,
            port = config.port,
            "Config loaded"
        );
        Ok(config)
    }

    /// The socket address to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error with caller location tracking.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
