//! Mock JWKS endpoint backed by wiremock.

use crate::crypto_fixtures::{jwks_json, TestSigningKey};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock serves the key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A running mock identity provider publishing a JWKS document.
///
/// Every `set_*`/`fail_*`/`respond_*` call replaces the current behavior and
/// clears the recorded request history.
pub struct MockJwksServer {
    server: MockServer,
}

impl MockJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(keys: &[&TestSigningKey]) -> Self {
        let server = MockServer::start().await;
        let this = Self { server };
        this.set_keys(keys).await;
        this
    }

    /// Base URI of the mock server, usable as an issuer origin.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Publish a new key set.
    pub async fn set_keys(&self, keys: &[&TestSigningKey]) {
        self.mount(ResponseTemplate::new(200).set_body_json(jwks_json(keys)))
            .await;
    }

    /// Answer every fetch with `status` and an empty body.
    pub async fn fail_with(&self, status: u16) {
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Answer with a raw body, for malformed documents.
    pub async fn respond_with_body(&self, body: &str) {
        self.mount(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(body),
        )
        .await;
    }

    /// Publish `keys`, delaying every response by `delay`.
    pub async fn respond_slowly(&self, keys: &[&TestSigningKey], delay: Duration) {
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(jwks_json(keys))
                .set_delay(delay),
        )
        .await;
    }

    /// Number of JWKS fetches since the behavior was last set.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn mount(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
