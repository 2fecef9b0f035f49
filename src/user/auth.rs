//! Authentication primitives: password hashing, token values, sessions.

use anyhow::{bail, Result};
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::SystemTime;

/// Opaque bearer token value handed to clients.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct TokenValue(pub String);

impl TokenValue {
    pub fn generate() -> TokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        TokenValue(random_string)
    }
}

/// A stored session token, bound to one admin account's store spot.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct SessionToken {
    pub account_id: i64,
    pub store_spot: String,
    pub value: TokenValue,
    pub created: SystemTime,
}

/// A provisioned admin account. Read-only at runtime, created through
/// the cli-auth binary.
#[derive(Clone, Debug)]
pub struct AdminAccount {
    pub id: i64,
    pub handle: String,
    pub store_spot: String,
    pub salt: String,
    pub hash: String,
    pub hasher: CredentialHasher,
    pub created: SystemTime,
}

/// A validated session, passed explicitly into every authorized
/// operation. Never ambient state.
#[derive(Clone, Debug)]
pub struct Session {
    pub account_id: i64,
    pub handle: String,
    pub store_spot: String,
    pub token: String,
}

mod bookspot_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = argon2
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let argon2 = Argon2::default();
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2.verify_password(plain_pw, &password_hash).is_ok())
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug)]
pub enum CredentialHasher {
    Argon2,
    /// Fast test-only hasher - DO NOT use in production!
    /// Simply stores the password hex-encoded with a marker prefix.
    #[cfg(feature = "test-fast-hasher")]
    TestFast,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        #[cfg(feature = "test-fast-hasher")]
        return CredentialHasher::TestFast;
        #[cfg(not(feature = "test-fast-hasher"))]
        CredentialHasher::Argon2
    }
}

impl FromStr for CredentialHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(CredentialHasher::Argon2),
            #[cfg(feature = "test-fast-hasher")]
            "test_fast" => Ok(CredentialHasher::TestFast),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for CredentialHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialHasher::Argon2 => write!(f, "argon2"),
            #[cfg(feature = "test-fast-hasher")]
            CredentialHasher::TestFast => write!(f, "test_fast"),
        }
    }
}

impl CredentialHasher {
    pub fn generate_b64_salt(&self) -> String {
        match self {
            CredentialHasher::Argon2 => bookspot_argon2::generate_b64_salt(),
            #[cfg(feature = "test-fast-hasher")]
            CredentialHasher::TestFast => "test_salt".to_string(),
        }
    }

    pub fn hash<T: AsRef<str>>(&self, plain: &[u8], b64_salt: T) -> Result<String> {
        match self {
            CredentialHasher::Argon2 => bookspot_argon2::hash(plain, b64_salt),
            #[cfg(feature = "test-fast-hasher")]
            CredentialHasher::TestFast => {
                let hex: String = plain.iter().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("$testfast${}${}", b64_salt.as_ref(), hex))
            }
        }
    }

    pub fn verify<P: AsRef<str>, H: AsRef<str>>(&self, plain_pw: P, target_hash: H) -> Result<bool> {
        match self {
            CredentialHasher::Argon2 => {
                bookspot_argon2::verify(plain_pw.as_ref().as_bytes(), target_hash)
            }
            #[cfg(feature = "test-fast-hasher")]
            CredentialHasher::TestFast => {
                let hash = target_hash.as_ref();
                if let Some(hex) = hash
                    .strip_prefix("$testfast$")
                    .and_then(|s| s.split('$').nth(1))
                {
                    let decoded: Vec<u8> = (0..hex.len())
                        .step_by(2)
                        .filter_map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
                        .collect();
                    Ok(decoded == plain_pw.as_ref().as_bytes())
                } else {
                    Ok(false)
                }
            }
        }
    }
}
