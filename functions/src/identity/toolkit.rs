use super::{IdentityError, IdentityFuture, IdentityPlatform};
use crate::{
    config::{ConfigError, IdentityConfig},
    credentials::Credentials,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

const USER_AGENT: &str = concat!("userfn-functions/", env!("CARGO_PKG_VERSION"));

/// [`IdentityPlatform`] backed by the Identity Toolkit REST API.
#[derive(Debug)]
pub struct IdentityToolkit {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    credentials: Credentials,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl IdentityToolkit {
    pub fn new(config: IdentityConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(IdentityToolkit {
            http,
            base_url: config.base_url(),
            project_id: config.project_id,
            credentials: Credentials::new(config.credentials),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/projects/{}/accounts:{}", self.base_url, self.project_id, action)
    }

    async fn post(&self, action: &str, body: Value) -> Result<(), IdentityError> {
        let token = self.credentials.access_token(&self.http).await?;
        let res = self
            .http
            .post(self.endpoint(action))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        debug!(action, status = status.as_u16(), "identity toolkit responded");
        if status.is_success() {
            return Ok(());
        }
        let text = res.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), &text))
    }
}

impl IdentityPlatform for IdentityToolkit {
    fn revoke_sessions<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        Box::pin(async move {
            let valid_since = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            self.post("update", revoke_body(uid, valid_since)).await
        })
    }

    fn delete_identity<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        Box::pin(async move { self.post("delete", json!({ "localId": uid })).await })
    }
}

// sessions issued before `validSince` stop being accepted
fn revoke_body(uid: &str, valid_since: u64) -> Value {
    json!({ "localId": uid, "validSince": valid_since.to_string() })
}

/// Decodes an error response. Messages look like `USER_NOT_FOUND` or
/// `INVALID_ID_TOKEN : detail`.
fn api_error(status: u16, body: &str) -> IdentityError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_owned());
    match message.split(':').next().map(str::trim) {
        Some("USER_NOT_FOUND") => IdentityError::UserNotFound,
        _ => IdentityError::Api { status, message },
    }
}
