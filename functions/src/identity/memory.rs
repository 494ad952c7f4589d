use super::{IdentityError, IdentityFuture, IdentityPlatform};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Account {
    sessions_revoked: bool,
}

/// An [`IdentityPlatform`] keeping accounts in process memory.
///
/// Every operation is recorded as `"<operation>:<uid>"`, in call order.
#[derive(Debug, Default)]
pub struct InMemoryIdentityPlatform {
    accounts: Mutex<HashMap<String, Account>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryIdentityPlatform {
    pub fn with_accounts<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accounts = uids.into_iter().map(|uid| (uid.into(), Account::default())).collect();
        InMemoryIdentityPlatform {
            accounts: Mutex::new(accounts),
            calls: Mutex::default(),
        }
    }

    pub fn contains(&self, uid: &str) -> bool {
        lock(&self.accounts).contains_key(uid)
    }

    pub fn sessions_revoked(&self, uid: &str) -> bool {
        lock(&self.accounts).get(uid).map_or(false, |a| a.sessions_revoked)
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, operation: &str, uid: &str) {
        lock(&self.calls).push(format!("{}:{}", operation, uid));
    }
}

// a panic while holding the lock leaves the maps consistent, so poisoning is ignored
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IdentityPlatform for InMemoryIdentityPlatform {
    fn revoke_sessions<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        Box::pin(async move {
            self.record("revoke", uid);
            match lock(&self.accounts).get_mut(uid) {
                Some(account) => {
                    account.sessions_revoked = true;
                    Ok(())
                }
                None => Err(IdentityError::UserNotFound),
            }
        })
    }

    fn delete_identity<'a>(&'a self, uid: &'a str) -> IdentityFuture<'a> {
        Box::pin(async move {
            self.record("delete", uid);
            lock(&self.accounts)
                .remove(uid)
                .map(|_| ())
                .ok_or(IdentityError::UserNotFound)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn revoke_then_delete() {
        let platform = InMemoryIdentityPlatform::with_accounts(vec!["a", "b"]);
        platform.revoke_sessions("a").await.expect("known account");
        assert!(platform.sessions_revoked("a"));
        assert!(!platform.sessions_revoked("b"));

        platform.delete_identity("a").await.expect("known account");
        assert!(!platform.contains("a"));
        assert!(platform.contains("b"));
        assert_eq!(platform.calls(), vec!["revoke:a", "delete:a"]);
    }

    #[tokio::test]
    async fn unknown_accounts_are_not_found() {
        let platform = InMemoryIdentityPlatform::default();
        let err = platform.delete_identity("ghost").await.expect_err("nothing to delete");
        assert!(matches!(err, IdentityError::UserNotFound));
    }
}
