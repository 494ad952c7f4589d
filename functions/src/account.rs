//! Account deletion.
//!
//! Revokes every session of an account, then deletes it. The two calls run
//! in that order, once each; a failed deletion after a successful revocation
//! leaves the account with its sessions revoked.
use crate::{
    callable::{self, FunctionsErrorCode, HttpsError},
    identity::{IdentityError, IdentityPlatform},
};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use userfn_http::{runtime::Error, Body, Context, Handler, Request, Response};

/// The `data` of a deletion call.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    pub uid: Option<Value>,
}

impl DeleteAccountRequest {
    pub fn new(uid: impl Into<String>) -> Self {
        DeleteAccountRequest {
            uid: Some(Value::String(uid.into())),
        }
    }

    /// The identity reference, when it is a non-empty string.
    pub fn identity(&self) -> Option<&str> {
        match &self.uid {
            Some(Value::String(uid)) if !uid.is_empty() => Some(uid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("missing or empty uid")]
    MissingUid,
    #[error("identity platform call failed: {0}")]
    Identity(#[from] IdentityError),
}

impl AccountError {
    /// What the caller is told. Upstream failure details stay in the logs.
    pub fn public(&self) -> (FunctionsErrorCode, &'static str) {
        match self {
            AccountError::MissingUid => (FunctionsErrorCode::InvalidArgument, "Missing 'uid' in request data."),
            AccountError::Identity(_) => (FunctionsErrorCode::Internal, "Failed to delete user."),
        }
    }
}

impl From<AccountError> for HttpsError {
    fn from(err: AccountError) -> Self {
        let (code, message) = err.public();
        HttpsError::new(code, message)
    }
}

/// Revokes the sessions of the requested account and deletes it.
pub async fn delete_account<P>(
    platform: &P,
    request: &DeleteAccountRequest,
) -> Result<DeleteAccountResponse, AccountError>
where
    P: IdentityPlatform + ?Sized,
{
    let uid = request.identity().ok_or(AccountError::MissingUid)?;

    let outcome = match platform.revoke_sessions(uid).await {
        Ok(()) => platform.delete_identity(uid).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => {
            info!(uid, "Successfully deleted user with UID: {}", uid);
            Ok(DeleteAccountResponse { success: true })
        }
        Err(err) => {
            error!(uid, error = ?err, "Error deleting user with UID: {}: {}", uid, err);
            Err(AccountError::Identity(err))
        }
    }
}

/// The callable HTTP function deleting accounts on `P`.
pub struct DeleteAccount<P: ?Sized> {
    platform: Arc<P>,
}

impl<P: ?Sized> Clone for DeleteAccount<P> {
    fn clone(&self) -> Self {
        DeleteAccount {
            platform: Arc::clone(&self.platform),
        }
    }
}

impl<P> DeleteAccount<P>
where
    P: IdentityPlatform + ?Sized,
{
    pub fn new(platform: Arc<P>) -> Self {
        DeleteAccount { platform }
    }

    /// Serves one callable request.
    pub async fn handle(&self, req: &Request) -> Response<Body> {
        let outcome = match callable::decode(req) {
            Ok(data) => {
                // anything but an object carrying a string uid counts as a missing uid
                let request: DeleteAccountRequest = serde_json::from_value(data).unwrap_or_default();
                delete_account(self.platform.as_ref(), &request)
                    .await
                    .map_err(HttpsError::from)
            }
            Err(err) => Err(err),
        };
        callable::encode(outcome)
    }
}

impl<P> Handler for DeleteAccount<P>
where
    P: IdentityPlatform + ?Sized + 'static,
{
    type Error = Error;
    type Response = Response<Body>;
    type Fut = BoxFuture<'static, Result<Response<Body>, Error>>;

    fn call(&mut self, req: Request, _: Context) -> Self::Fut {
        let function = self.clone();
        Box::pin(async move { Ok(function.handle(&req).await) })
    }
}
