//! The identity platform the account functions act upon.
use crate::credentials::CredentialsError;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod toolkit;

pub use memory::InMemoryIdentityPlatform;
pub use toolkit::IdentityToolkit;

/// Future returned by [`IdentityPlatform`] operations.
pub type IdentityFuture<'a> = BoxFuture<'a, Result<(), IdentityError>>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("there is no user record corresponding to the provided identifier")]
    UserNotFound,
    #[error("identity platform answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("identity platform request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

/// Account operations of the identity platform.
///
/// Implementations are shared across concurrent invocations and must not
/// depend on call ordering between different identities.
pub trait IdentityPlatform: Send + Sync {
    /// Makes every credential previously issued for `uid` unusable.
    fn revoke_sessions<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a>;

    /// Permanently removes the account record of `uid`.
    fn delete_identity<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a>;
}

impl<P> IdentityPlatform for Arc<P>
where
    P: IdentityPlatform + ?Sized,
{
    fn revoke_sessions<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        (**self).revoke_sessions(uid)
    }

    fn delete_identity<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        (**self).delete_identity(uid)
    }
}
