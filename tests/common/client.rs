//! HTTP client for end-to-end tests.
//!
//! Wraps reqwest with one method per server endpoint. When routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client with cookie-based session management.
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests).
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in as the `sch` store admin.
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates a test infrastructure
    /// problem).
    pub async fn authenticated_sch(base_url: String) -> Self {
        let client = Self::new(base_url);
        let response = client.login(SCH_ADMIN, SCH_PASS, SCH_SPOT).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test admin authentication failed"
        );
        client
    }

    pub async fn login(&self, handle: &str, password: &str, store_spot: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "handle": handle,
                "password": password,
                "store_spot": store_spot,
            }))
            .send()
            .await
            .expect("login request failed")
    }

    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("logout request failed")
    }

    pub async fn list_spots(&self) -> Response {
        self.client
            .get(format!("{}/v1/spots", self.base_url))
            .send()
            .await
            .expect("spots request failed")
    }

    pub async fn search(&self, spot: &str, query: &str) -> Response {
        self.client
            .get(format!("{}/v1/catalog/{}/search", self.base_url, spot))
            .query(&[("q", query)])
            .send()
            .await
            .expect("search request failed")
    }

    pub async fn upload(&self, spot: &str, file_bytes: Vec<u8>) -> Response {
        let form = Form::new().part(
            "file",
            Part::bytes(file_bytes).file_name("books.csv"),
        );
        self.client
            .post(format!("{}/v1/catalog/{}/upload", self.base_url, spot))
            .multipart(form)
            .send()
            .await
            .expect("upload request failed")
    }

    pub async fn add_book(&self, spot: &str, body: serde_json::Value) -> Response {
        self.client
            .post(format!("{}/v1/catalog/{}/books", self.base_url, spot))
            .json(&body)
            .send()
            .await
            .expect("add book request failed")
    }

    pub async fn delete_book(&self, spot: &str, book_id: i64) -> Response {
        self.client
            .delete(format!("{}/v1/catalog/{}/books/{}", self.base_url, spot, book_id))
            .send()
            .await
            .expect("delete book request failed")
    }

    /// Upload with an explicit bearer token instead of the cookie jar.
    pub async fn upload_with_token(
        &self,
        spot: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> Response {
        let form = Form::new().part(
            "file",
            Part::bytes(file_bytes).file_name("books.csv"),
        );
        self.client
            .post(format!("{}/v1/catalog/{}/upload", self.base_url, spot))
            .header("Authorization", format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await
            .expect("upload request failed")
    }
}
