//! reqwest-backed [`SchemaApi`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use transit_core::ApiEndpoint;

use crate::diff::{DiffOutcome, SchemaDiff};
use crate::error::SchemaError;
use crate::http::{check_apply_response, check_response, classify};
use crate::snapshot::SchemaSnapshot;
use crate::SchemaApi;

const HEALTH_PATH: &str = "server/health";
const SNAPSHOT_PATH: &str = "schema/snapshot";
const DIFF_PATH: &str = "schema/diff";
const APPLY_PATH: &str = "schema/apply";

/// Connect and overall timeouts for every request.
#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

/// Structural API client for one environment. Every call is a single,
/// bounded attempt; retries are the caller's decision.
pub struct HttpSchemaApi {
    environment: String,
    endpoint: ApiEndpoint,
    timeouts: ClientTimeouts,
    http: reqwest::Client,
}

impl HttpSchemaApi {
    /// Build a client for `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Http`] if the underlying `reqwest::Client`
    /// fails to build (e.g. TLS backend initialization).
    pub fn new(
        environment: impl Into<String>,
        endpoint: ApiEndpoint,
        timeouts: ClientTimeouts,
    ) -> Result<Self, SchemaError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("transit/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()?;
        Ok(Self {
            environment: environment.into(),
            endpoint,
            timeouts,
            http,
        })
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SchemaError> {
        request
            .send()
            .await
            .map_err(|e| classify(e, url, self.timeouts.request))
    }

    async fn read_body(&self, url: &str, resp: reqwest::Response) -> Result<String, SchemaError> {
        resp.text()
            .await
            .map_err(|e| classify(e, url, self.timeouts.request))
    }
}

#[async_trait]
impl SchemaApi for HttpSchemaApi {
    fn environment(&self) -> &str {
        &self.environment
    }

    async fn health(&self) -> Result<(), SchemaError> {
        let url = self.endpoint.url(HEALTH_PATH);
        let resp = self.send(&url, self.http.get(&url)).await?;
        let status = resp.status();
        if status.is_success() {
            tracing::debug!(environment = %self.environment, %url, "health probe ok");
            Ok(())
        } else {
            Err(SchemaError::Unhealthy {
                url,
                status: status.as_u16(),
            })
        }
    }

    async fn probe_structural_access(&self) -> Result<(), SchemaError> {
        let url = self.endpoint.url(SNAPSHOT_PATH);
        let resp = self
            .send(&url, self.http.get(&url).bearer_auth(&self.endpoint.token))
            .await?;
        check_response(resp, &url).await?;
        tracing::debug!(environment = %self.environment, "structural access confirmed");
        Ok(())
    }

    async fn snapshot(&self) -> Result<SchemaSnapshot, SchemaError> {
        let url = self.endpoint.url(SNAPSHOT_PATH);
        let resp = self
            .send(&url, self.http.get(&url).bearer_auth(&self.endpoint.token))
            .await?;
        let resp = check_response(resp, &url).await?;
        let body = self.read_body(&url, resp).await?;
        let snapshot = SchemaSnapshot::from_body(&body)?;
        tracing::info!(
            environment = %self.environment,
            collections = snapshot.collection_count(),
            fields = snapshot.field_count(),
            relations = snapshot.relation_count(),
            "captured schema snapshot"
        );
        Ok(snapshot)
    }

    async fn diff(&self, snapshot: &SchemaSnapshot, force: bool) -> Result<DiffOutcome, SchemaError> {
        if snapshot.is_enveloped() {
            return Err(SchemaError::WrappedSnapshot);
        }
        let mut url = self.endpoint.url(DIFF_PATH);
        if force {
            url.push_str("?force=true");
        }
        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.endpoint.token)
            .json(snapshot.document());
        let resp = check_response(self.send(&url, request).await?, &url).await?;
        let status = resp.status().as_u16();
        let body = self.read_body(&url, resp).await?;
        let outcome = DiffOutcome::from_response(status, &body)?;
        match &outcome {
            DiffOutcome::Identical => {
                tracing::info!(environment = %self.environment, "schemas identical");
            }
            DiffOutcome::Changes(diff) => {
                tracing::info!(
                    environment = %self.environment,
                    changes = diff.operations().len(),
                    "schema diff computed"
                );
            }
        }
        Ok(outcome)
    }

    async fn apply(&self, diff: &SchemaDiff) -> Result<(), SchemaError> {
        let url = self.endpoint.url(APPLY_PATH);
        let request = self
            .http
            .post(&url)
            .bearer_auth(&self.endpoint.token)
            .json(diff.payload());
        let resp = check_apply_response(self.send(&url, request).await?, &url).await?;
        tracing::info!(environment = %self.environment, status = resp.status().as_u16(), "schema diff applied");
        Ok(())
    }
}
