use schemagate_frame::{Outcome, Reason};
use schemagate_schema::{exceeds_size, ValidationEngine};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{Result, ServiceError};

/// Posts validated assets to the configured backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ServiceError::Backend(err.to_string()))?;
        Ok(Self {
            client,
            url: config.assets_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Validate (optionally) and upload one asset.
    pub fn populate(&self, asset: &Value, validate_first: bool, engine: &ValidationEngine) -> Outcome {
        if exceeds_size(asset, engine.config().max_payload_size) {
            return Outcome::payload_too_large();
        }
        if validate_first {
            let validation = engine.validate_asset(asset);
            if !validation.ok {
                return validation;
            }
        }
        self.post(asset)
    }

    fn post(&self, asset: &Value) -> Outcome {
        debug!(url = %self.url, "posting asset to backend");
        let response = match self.client.post(&self.url).json(asset).send() {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %self.url, error = %err, "backend request failed");
                return Outcome::failure(Reason::BackendError)
                    .with("status", Value::Null)
                    .with_detail(err.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .unwrap_or_else(|err| format!("unreadable response body: {err}"));
            warn!(url = %self.url, status = status.as_u16(), "backend rejected asset");
            return Outcome::failure(Reason::BackendError)
                .with("status", status.as_u16())
                .with_detail(detail);
        }

        let asset_id = response
            .json::<Value>()
            .ok()
            .and_then(|body| body.get("id").cloned())
            .unwrap_or(Value::Null);
        Outcome::success()
            .with("asset_id", asset_id)
            .with("backend_url", self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use schemagate_schema::{OfflineFetcher, ResolverConfig, SchemaResolver};
    use serde_json::json;

    use super::*;

    const PREFIX: &str = "https://delk73.github.io/synesthetic-schemas/schema/0.7.3/";

    fn engine(dir: &std::path::Path) -> ValidationEngine {
        std::fs::write(
            dir.join("asset.schema.json"),
            r#"{"type":"object","required":["name"]}"#,
        )
        .unwrap();
        ValidationEngine::with_resolver(SchemaResolver::with_fetcher(
            ResolverConfig::new(dir),
            Arc::new(OfflineFetcher),
        ))
    }

    fn client(server: &mockito::Server) -> BackendClient {
        let mut config = BackendConfig::new(server.url());
        config.assets_path = "/assets".to_string();
        BackendClient::new(&config).unwrap()
    }

    #[test]
    fn successful_post_returns_asset_id() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/assets")
            .match_header("content-type", "application/json")
            .with_status(201)
            .with_body(r#"{"id":"a-1"}"#)
            .create();

        let asset = json!({"$schema": format!("{PREFIX}asset.schema.json"), "name": "x"});
        let outcome = client(&server).populate(&asset, true, &engine);
        assert!(outcome.ok, "{outcome:?}");
        assert_eq!(outcome.field("asset_id"), Some(&json!("a-1")));
        assert_eq!(
            outcome.field("backend_url"),
            Some(&json!(format!("{}/assets", server.url())))
        );
        mock.assert();
    }

    #[test]
    fn invalid_asset_never_reaches_backend() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut server = mockito::Server::new();
        let mock = server.mock("POST", "/assets").expect(0).create();

        let asset = json!({"$schema": format!("{PREFIX}asset.schema.json")});
        let outcome = client(&server).populate(&asset, true, &engine);
        assert_eq!(outcome.reason, Some(Reason::ValidationFailed));
        mock.assert();
    }

    #[test]
    fn skipping_validation_posts_anyway() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/assets")
            .with_status(200)
            .with_body("{}")
            .create();

        let outcome = client(&server).populate(&json!({"anything": true}), false, &engine);
        assert!(outcome.ok);
        assert_eq!(outcome.field("asset_id"), Some(&Value::Null));
        mock.assert();
    }

    #[test]
    fn backend_error_carries_status_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/assets")
            .with_status(422)
            .with_body("duplicate asset")
            .create();

        let outcome = client(&server).populate(&json!({}), false, &engine);
        assert_eq!(outcome.reason, Some(Reason::BackendError));
        assert_eq!(outcome.field("status"), Some(&json!(422)));
        assert_eq!(outcome.detail.as_deref(), Some("duplicate asset"));
    }

    #[test]
    fn unreachable_backend_has_null_status() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = BackendClient::new(&BackendConfig::new(format!("http://127.0.0.1:{port}")))
            .unwrap();
        let outcome = backend.populate(&json!({}), false, &engine);
        assert_eq!(outcome.reason, Some(Reason::BackendError));
        assert_eq!(outcome.field("status"), Some(&Value::Null));
    }
}
