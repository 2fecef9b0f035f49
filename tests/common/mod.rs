//! Shared end-to-end test infrastructure.
#![allow(dead_code)] // Each test binary uses a different subset.

pub mod client;
pub mod constants;
pub mod fixtures;
pub mod server;

pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
