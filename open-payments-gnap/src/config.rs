//! Client configuration.
//!
//! This module defines the TOML-deserializable settings an Open Payments
//! client needs to sign requests: its key id, where its private key lives,
//! and its own wallet address.
//!
//! ```toml
//! key_id = "5f2c6d1e-8a4b-4c3d-9e2f-1a2b3c4d5e6f"
//! private_key_path = "keys/private.pem"
//! client_wallet_address = "https://wallet.example/alice"
//! user_agent = "open-payments-sdk/rust"
//! http_timeout_secs = 10
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    error::{GnapError, Result},
    gnap::{keys::load_private_key_from_pem, request::RequestSigner},
};

/// Default `User-Agent` for API calls.
pub const DEFAULT_USER_AGENT: &str = "open-payments-sdk/rust";

/// Default HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

/// Root client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Key id published in the client's JWKS.
    pub key_id: String,

    /// Path to the PKCS#8 PEM private key.
    ///
    /// Relative paths are resolved against the config file's directory when
    /// loaded with [`ClientConfig::from_file`].
    pub private_key_path: String,

    /// The client's own wallet address (HTTPS).
    pub client_wallet_address: String,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (1 to 300).
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl ClientConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidConfig`] if the TOML does not parse or
    /// fails [`validate`](Self::validate).
    ///
    /// # Examples
    ///
    /// ```
    /// use open_payments_gnap::config::ClientConfig;
    ///
    /// let config = ClientConfig::from_toml(
    ///     r#"
    ///     key_id = "my-key"
    ///     private_key_path = "private.pem"
    ///     client_wallet_address = "https://wallet.example/alice"
    /// "#,
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(config.user_agent(), "open-payments-sdk/rust");
    /// assert_eq!(config.http_timeout().as_secs(), 10);
    /// ```
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| GnapError::InvalidConfig(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidConfig`] if the file cannot be read, or
    /// the errors of [`from_toml`](Self::from_toml).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            GnapError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        let mut config = Self::from_toml(&text)?;
        let key_path = Path::new(&config.private_key_path);
        if key_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.private_key_path = dir.join(key_path).to_string_lossy().into_owned();
            }
        }

        debug!(key_id = %config.key_id, "loaded client configuration");
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// This method checks that:
    /// - `key_id` is non-empty
    /// - `private_key_path` is non-empty
    /// - `client_wallet_address` is an HTTPS URL with a host
    /// - `http_timeout_secs` is between 1 and 300
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidConfig`] describing the first failed check.
    pub fn validate(&self) -> Result<()> {
        if self.key_id.trim().is_empty() {
            return Err(GnapError::InvalidConfig("key_id must not be empty".to_owned()));
        }
        if self.private_key_path.trim().is_empty() {
            return Err(GnapError::InvalidConfig("private_key_path must not be empty".to_owned()));
        }
        self.validate_wallet_address()?;

        if !(1..=MAX_HTTP_TIMEOUT_SECS).contains(&self.http_timeout_secs) {
            return Err(GnapError::InvalidConfig(format!(
                "http_timeout_secs must be between 1 and {MAX_HTTP_TIMEOUT_SECS}, got {}",
                self.http_timeout_secs
            )));
        }
        Ok(())
    }

    fn validate_wallet_address(&self) -> Result<()> {
        let url = Url::parse(&self.client_wallet_address).map_err(|e| {
            GnapError::InvalidConfig(format!(
                "invalid client_wallet_address '{}': {e}",
                self.client_wallet_address
            ))
        })?;

        if url.scheme() != "https" {
            return Err(GnapError::InvalidConfig(format!(
                "client_wallet_address must use HTTPS, got: {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(GnapError::InvalidConfig("client_wallet_address has no host".to_owned()));
        }
        Ok(())
    }

    /// Reads the private key and returns a signer for it.
    ///
    /// # Errors
    ///
    /// Returns [`GnapError::InvalidConfig`] if the key file cannot be read,
    /// and the key errors of [`load_private_key_from_pem`].
    pub fn load_signer(&self) -> Result<RequestSigner> {
        let pem = fs::read_to_string(&self.private_key_path).map_err(|e| {
            GnapError::InvalidConfig(format!("cannot read {}: {e}", self.private_key_path))
        })?;
        let signing_key = load_private_key_from_pem(&pem)?;
        Ok(RequestSigner::new(signing_key, &self.key_id))
    }

    /// `User-Agent` header value.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
