//! Hosted project configuration.
//!
//! Loaded from a TOML file or from environment variables:
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `FIREBASE_API_KEY` | Yes | Web API key (used by the auth endpoints) |
//! | `FIREBASE_DATABASE_URL` | Yes | Real-time database root URL |
//! | `FIREBASE_STORAGE_BUCKET` | Yes | Storage bucket name |
//! | `FIREBASE_AUTH_URL` | No | Identity toolkit base URL override |
//! | `FIREBASE_STORAGE_URL` | No | Storage API base URL override |
//! | `FIREBASE_TOKEN_URL` | No | Secure token (refresh) base URL override |

use std::path::Path;

use serde::Deserialize;

const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com";
const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com";
const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or is missing fields.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Connection settings for the hosted project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FirebaseConfig {
    /// Web API key.
    pub api_key: String,
    /// Database root, e.g. `"https://project-default-rtdb.firebaseio.com"`.
    pub database_url: String,
    /// Storage bucket, e.g. `"project.firebasestorage.app"`.
    pub storage_bucket: String,
    /// Identity toolkit base URL.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Storage API base URL.
    #[serde(default = "default_storage_url")]
    pub storage_url: String,
    /// Secure token base URL, used to refresh ID tokens.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_storage_url() -> String {
    DEFAULT_STORAGE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

impl FirebaseConfig {
    /// Reads the configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if a required variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: required_env("FIREBASE_API_KEY")?,
            database_url: required_env("FIREBASE_DATABASE_URL")?,
            storage_bucket: required_env("FIREBASE_STORAGE_BUCKET")?,
            auth_url: std::env::var("FIREBASE_AUTH_URL").unwrap_or_else(|_| default_auth_url()),
            storage_url: std::env::var("FIREBASE_STORAGE_URL")
                .unwrap_or_else(|_| default_storage_url()),
            token_url: std::env::var("FIREBASE_TOKEN_URL").unwrap_or_else(|_| default_token_url()),
        })
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::de::from_str(source)?)
    }

    /// Loads from `path` when given, otherwise from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// required environment variable is missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                log::debug!("Loading config from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(path)?)
            }
            None => Self::from_env(),
        }
    }

    /// Database root without a trailing slash.
    #[must_use]
    pub fn database_root(&self) -> &str {
        self.database_url.trim_end_matches('/')
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnv {
            name: name.to_string(),
        })
}
