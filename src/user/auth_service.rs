//! Credential verification and session token lifecycle.

use super::admin_store::AdminStore;
use super::auth::{CredentialHasher, Session, SessionToken, TokenValue};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Any login mismatch: unknown handle, wrong password, or wrong
    /// claimed store spot. Deliberately one variant, callers must not be
    /// able to tell which part failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid session token")]
    InvalidToken,

    #[error("expired session token")]
    ExpiredToken,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A successfully issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub store_spot: String,
}

pub struct AuthService {
    store: Arc<dyn AdminStore>,
    hasher: CredentialHasher,
    token_ttl: Duration,
    /// Hash of a throwaway password, verified against when the handle is
    /// unknown so a login probe takes the same time either way.
    dummy_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn AdminStore>, token_ttl: Duration) -> Result<Self> {
        let hasher = CredentialHasher::default();
        let salt = hasher.generate_b64_salt();
        let dummy_hash = hasher.hash(b"bookspot-dummy-password", &salt)?;
        Ok(Self {
            store,
            hasher,
            token_ttl,
            dummy_hash,
        })
    }

    /// Verifies handle, password and claimed store spot, and issues a
    /// token bound to the account's spot. Every mismatch maps to
    /// [`AuthError::InvalidCredentials`].
    pub fn login(
        &self,
        handle: &str,
        password: &str,
        claimed_spot: &str,
    ) -> Result<IssuedToken, AuthError> {
        let account = match self.store.get_account(handle)? {
            Some(account) => account,
            None => {
                // Burn the same hashing work as the found-account path.
                let _ = self.hasher.verify(password, &self.dummy_hash);
                return Err(AuthError::InvalidCredentials);
            }
        };

        let password_ok = account
            .hasher
            .verify(password, &account.hash)
            .unwrap_or(false);
        if !password_ok || account.store_spot != claimed_spot {
            debug!("Rejected login for handle '{}'", handle);
            return Err(AuthError::InvalidCredentials);
        }

        let token = SessionToken {
            account_id: account.id,
            store_spot: account.store_spot.clone(),
            value: TokenValue::generate(),
            created: SystemTime::now(),
        };
        self.store.add_token(&token)?;
        Ok(IssuedToken {
            value: token.value.0,
            store_spot: token.store_spot,
        })
    }

    /// Resolves a bearer token value into a session. Expired tokens are
    /// deleted on detection and reported distinctly from unknown ones.
    pub fn validate(&self, token_value: &str) -> Result<Session, AuthError> {
        let value = TokenValue(token_value.to_owned());
        let token = self.store.get_token(&value)?.ok_or(AuthError::InvalidToken)?;

        let age = SystemTime::now()
            .duration_since(token.created)
            .unwrap_or_default();
        if age > self.token_ttl {
            debug!("Session token expired after {:?}", age);
            self.store.delete_token(&value)?;
            return Err(AuthError::ExpiredToken);
        }

        let account = self
            .store
            .get_account_by_id(token.account_id)?
            .ok_or(AuthError::InvalidToken)?;

        Ok(Session {
            account_id: account.id,
            handle: account.handle,
            store_spot: token.store_spot,
            token: token.value.0,
        })
    }

    pub fn logout(&self, token_value: &str) -> Result<(), AuthError> {
        let deleted = self.store.delete_token(&TokenValue(token_value.to_owned()))?;
        if deleted.is_none() {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }

    pub fn prune_expired_tokens(&self) -> Result<usize> {
        self.store.prune_expired_tokens(self.token_ttl)
    }

    // Provisioning operations, used by the cli-auth binary.

    pub fn create_account(&self, handle: &str, password: &str, store_spot: &str) -> Result<i64> {
        if handle.trim().is_empty() {
            bail!("The account handle cannot be empty.");
        }
        if self.store.get_account(handle)?.is_some() {
            bail!("An account with handle '{}' already exists.", handle);
        }
        let salt = self.hasher.generate_b64_salt();
        let hash = self.hasher.hash(password.as_bytes(), &salt)?;
        self.store
            .create_account(handle, store_spot, &salt, &hash, self.hasher)
            .with_context(|| format!("Failed to provision account '{}'", handle))
    }

    pub fn update_password(&self, handle: &str, password: &str) -> Result<()> {
        let salt = self.hasher.generate_b64_salt();
        let hash = self.hasher.hash(password.as_bytes(), &salt)?;
        self.store.update_password(handle, &salt, &hash, self.hasher)
    }

    /// Compares a password against the stored hash without issuing a
    /// token or recording anything.
    pub fn check_password(&self, handle: &str, password: &str) -> Result<bool> {
        match self.store.get_account(handle)? {
            Some(account) => account.hasher.verify(password, &account.hash),
            None => Ok(false),
        }
    }

    pub fn all_handles(&self) -> Result<Vec<String>> {
        self.store.all_handles()
    }
}
