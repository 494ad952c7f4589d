//! Identity platform settings, read from the environment.
use crate::credentials::{CredentialSource, ServiceAccountKey};
use std::{env, fs, io, path::PathBuf};
use thiserror::Error;

/// Identity Toolkit REST endpoint.
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

pub const PROJECT_VARS: [&str; 2] = ["GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];
pub const CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const EMULATOR_HOST_VAR: &str = "FIREBASE_AUTH_EMULATOR_HOST";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no project id: set GOOGLE_CLOUD_PROJECT or provide a service account key")]
    MissingProjectId,
    #[error("unable to read service account key {path:?}: {source}")]
    ReadKey { path: PathBuf, source: io::Error },
    #[error("unable to parse service account key {path:?}: {source}")]
    ParseKey { path: PathBuf, source: serde_json::Error },
    #[error("unable to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub project_id: String,
    /// `host:port` of a local Auth emulator, when one is used
    pub emulator_host: Option<String>,
    pub credentials: CredentialSource,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let key = match lookup(CREDENTIALS_VAR) {
            Some(path) => Some(read_key(PathBuf::from(path))?),
            None => None,
        };
        let project_id = PROJECT_VARS
            .iter()
            .find_map(|var| lookup(*var))
            .or_else(|| key.as_ref().and_then(|k| k.project_id.clone()))
            .ok_or(ConfigError::MissingProjectId)?;
        let emulator_host = lookup(EMULATOR_HOST_VAR);

        let credentials = match (&emulator_host, key) {
            (Some(_), _) => CredentialSource::Emulator,
            (None, Some(key)) => CredentialSource::ServiceAccount(key),
            (None, None) => CredentialSource::Metadata,
        };

        Ok(IdentityConfig {
            project_id,
            emulator_host,
            credentials,
        })
    }

    /// Base URL of the Identity Toolkit API, honoring the emulator.
    pub fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/identitytoolkit.googleapis.com/v1", host),
            None => IDENTITY_TOOLKIT_URL.to_owned(),
        }
    }
}

fn read_key(path: PathBuf) -> Result<ServiceAccountKey, ConfigError> {
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(source) => return Err(ConfigError::ReadKey { path, source }),
    };
    serde_json::from_str(&raw).map_err(|source| ConfigError::ParseKey { path, source })
}
