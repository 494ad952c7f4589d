//! OAuth2 access tokens for calling the identity platform.
//!
//! Tokens come from one of three places: a fixed token accepted by the
//! local Auth emulator, a service-account key exchanged through the JWT
//! bearer grant, or the compute metadata server.
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Token the Auth emulator accepts in place of real credentials.
pub const EMULATOR_TOKEN: &str = "owner";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SCOPES: &str = "https://www.googleapis.com/auth/cloud-platform \
                      https://www.googleapis.com/auth/identitytoolkit \
                      https://www.googleapis.com/auth/userinfo.email";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("invalid service account private key: {0}")]
    Key(#[from] jsonwebtoken::errors::Error),
    #[error("token endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("system clock is before the unix epoch")]
    Clock,
}

/// The fields of a service-account key file this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum CredentialSource {
    Emulator,
    ServiceAccount(ServiceAccountKey),
    Metadata,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// A credential source plus the last token it produced.
#[derive(Debug)]
pub struct Credentials {
    source: CredentialSource,
    cache: Mutex<Option<AccessToken>>,
}

impl Credentials {
    pub fn new(source: CredentialSource) -> Self {
        Credentials {
            source,
            cache: Mutex::new(None),
        }
    }

    /// Returns a bearer token, fetching a new one when the cached token is
    /// missing or close to expiry.
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String, CredentialsError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let fetched = match &self.source {
            CredentialSource::Emulator => return Ok(EMULATOR_TOKEN.to_owned()),
            CredentialSource::ServiceAccount(key) => service_account_token(http, key).await?,
            CredentialSource::Metadata => metadata_token(http).await?,
        };
        debug!(expires_in = fetched.expires_in, "fetched access token");
        let token = AccessToken {
            value: fetched.access_token,
            expires_at: Instant::now() + Duration::from_secs(fetched.expires_in),
        };
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }
}

fn unix_now() -> Result<u64, CredentialsError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| CredentialsError::Clock)
}

fn grant_assertion(key: &ServiceAccountKey, iat: u64) -> Result<String, CredentialsError> {
    let claims = GrantClaims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME.as_secs(),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();
    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(&header, &claims, &signing_key)?)
}

async fn service_account_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<TokenResponse, CredentialsError> {
    let assertion = grant_assertion(key, unix_now()?)?;
    let token = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await?
        .error_for_status()?
        .json::<TokenResponse>()
        .await?;
    Ok(token)
}

async fn metadata_token(http: &reqwest::Client) -> Result<TokenResponse, CredentialsError> {
    let token = http
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?
        .error_for_status()?
        .json::<TokenResponse>()
        .await?;
    Ok(token)
}
