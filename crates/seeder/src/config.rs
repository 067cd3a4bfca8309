//! Configuration types for seeding runs.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docstore::{ConnectOptions, ModelSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::seed_data::SeedData;

/// Store URL used when neither the environment nor a seed file names one.
pub const DEFAULT_DATABASE_URL: &str = "mongodb://localhost:27017/test";

/// Environment variable holding the store URL.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Environment variable holding a JSON object of connection options.
pub const SEED_OPTIONS_VAR: &str = "SEED_OPTIONS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid seed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where to connect and with which options.
///
/// `options` holds caller overrides only; the seeder merges them over
/// [`ConnectOptions::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeederConfig {
    pub url: String,
    #[serde(default = "ConnectOptions::new")]
    pub options: ConnectOptions,
}

impl Default for SeederConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

impl SeederConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: ConnectOptions::new(),
        }
    }

    pub fn with_options(mut self, overrides: &ConnectOptions) -> Self {
        self.options = self.options.merged(overrides);
        self
    }

    /// Reads `DATABASE_URL` and `SEED_OPTIONS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var(DATABASE_URL_VAR).unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        Ok(Self::new(url).with_options(&env_options()?))
    }

    /// Config for a seed file run: the environment URL wins over the file's,
    /// and the file's options win over the environment's.
    pub fn for_seed_file(file: &SeedFile) -> Result<Self, ConfigError> {
        Ok(Self::resolve(
            env::var(DATABASE_URL_VAR).ok(),
            &env_options()?,
            file,
        ))
    }

    fn resolve(env_url: Option<String>, env_options: &ConnectOptions, file: &SeedFile) -> Self {
        let url = env_url
            .or_else(|| file.url.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        Self::new(url)
            .with_options(env_options)
            .with_options(&file.options)
    }
}

fn env_options() -> Result<ConnectOptions, ConfigError> {
    match env::var(SEED_OPTIONS_VAR) {
        Ok(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
        _ => Ok(ConnectOptions::new()),
    }
}

/// A seeding run described as JSON.
///
/// ```json
/// {
///   "url": "mongodb://localhost:27017/dev",
///   "options": { "app_name": "fixtures" },
///   "models": [
///     { "name": "User", "fields": [{ "name": "email", "kind": "string", "unique": true }] }
///   ],
///   "clear": ["User"],
///   "data": { "User": [{ "email": "a@example.com" }] }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "ConnectOptions::new")]
    pub options: ConnectOptions,
    /// Schemas to register before seeding.
    #[serde(default)]
    pub models: Vec<ModelSchema>,
    /// Models to clear before populating.
    #[serde(default)]
    pub clear: Vec<String>,
    #[serde(default)]
    pub data: SeedData,
}

impl SeedFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }
}
