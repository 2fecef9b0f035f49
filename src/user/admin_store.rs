use super::auth::{AdminAccount, CredentialHasher, SessionToken, TokenValue};
use anyhow::Result;
use std::time::Duration;

/// Storage seam for admin accounts and their session tokens.
pub trait AdminStore: Send + Sync {
    /// Returns the account with the given handle.
    /// Returns Ok(None) if the account does not exist.
    /// Returns Err if there is a database error.
    fn get_account(&self, handle: &str) -> Result<Option<AdminAccount>>;

    /// Returns the account with the given id.
    /// Returns Ok(None) if the account does not exist.
    fn get_account_by_id(&self, id: i64) -> Result<Option<AdminAccount>>;

    /// Creates a new account and returns its id.
    /// Returns Err if the handle is already taken.
    fn create_account(
        &self,
        handle: &str,
        store_spot: &str,
        salt: &str,
        hash: &str,
        hasher: CredentialHasher,
    ) -> Result<i64>;

    /// Replaces the password credential of an existing account.
    fn update_password(
        &self,
        handle: &str,
        salt: &str,
        hash: &str,
        hasher: CredentialHasher,
    ) -> Result<()>;

    /// All account handles, for the provisioning CLI.
    fn all_handles(&self) -> Result<Vec<String>>;

    /// Stores a freshly issued token.
    fn add_token(&self, token: &SessionToken) -> Result<()>;

    /// Returns the stored token with the given value.
    /// Returns Ok(None) if the token does not exist.
    fn get_token(&self, value: &TokenValue) -> Result<Option<SessionToken>>;

    /// Deletes a token, returning it if it existed.
    fn delete_token(&self, value: &TokenValue) -> Result<Option<SessionToken>>;

    /// Deletes every token older than `ttl`. Returns how many were removed.
    fn prune_expired_tokens(&self, ttl: Duration) -> Result<usize>;
}
