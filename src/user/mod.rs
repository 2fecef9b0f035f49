mod admin_store;
pub mod auth;
mod auth_service;
mod sqlite_admin_store;

pub use admin_store::AdminStore;
pub use auth::{AdminAccount, CredentialHasher, Session, SessionToken, TokenValue};
pub use auth_service::{AuthError, AuthService, IssuedToken};
pub use sqlite_admin_store::SqliteAdminStore;
