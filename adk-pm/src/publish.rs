//! Publisher adapters.
//!
//! Stages that publish (PRD to the document store, sprint plans to the issue
//! tracker, boards to the whiteboard) talk to the outside world only through
//! the [`Publisher`] trait. Publishing is never fatal to a stage:
//! [`publish_with_retry`] always returns a [`PublishReport`], with
//! `published == false` and an error message when every attempt failed.

use crate::error::{PmError, Result};
use crate::models::{PublishConfig, PublishReport, Stage};
use crate::retry::{RetryPolicy, execute_with_retry, is_retryable_publish_error};
use crate::telemetry::{log_publish, publish_span, start_timing};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Instrument;

pub const DOCUMENT_STORE: &str = "document_store";
pub const ISSUE_TRACKER: &str = "issue_tracker";
pub const WHITEBOARD: &str = "whiteboard";

/// Envelope sent to every publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub session_id: String,
    pub stage: Stage,
    pub title: String,
    /// MIME type of `body`
    pub content_type: String,
    pub body: String,
    /// Structured copy of the artifact
    #[serde(default)]
    pub payload: Value,
}

/// Uniform publisher answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PublishResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl PublishResult {
    pub fn published(external_id: impl Into<String>, external_url: Option<String>) -> Self {
        Self {
            success: true,
            external_url,
            external_id: Some(external_id.into()),
            error_message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Pushes an artifact to an external system.
///
/// Transport failures are returned as `Err` and may be retried; a definitive
/// refusal is `Ok` with `success == false` and is not retried.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Target name used in reports and logs.
    fn name(&self) -> &str;

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult>;
}

/// Publish with the retry budget, folding every failure into the report.
pub async fn publish_with_retry(
    publisher: &dyn Publisher,
    request: &PublishRequest,
    policy: &RetryPolicy,
) -> PublishReport {
    let target = publisher.name().to_string();
    let span = publish_span(&target, request.stage.as_str());

    async {
        let timer = start_timing(format!("publish.{}", target));
        let outcome = execute_with_retry(policy, &target, is_retryable_publish_error, || {
            publisher.publish(request)
        })
        .await;

        let report = match outcome.result {
            Ok(result) if result.success => PublishReport {
                target: target.clone(),
                artifact_generated: true,
                published: true,
                attempts: outcome.attempts,
                external_url: result.external_url,
                external_id: result.external_id,
                error_message: None,
            },
            Ok(result) => PublishReport::failed(
                &target,
                outcome.attempts,
                result
                    .error_message
                    .unwrap_or_else(|| "publisher refused the artifact".to_string()),
            ),
            Err(error) => PublishReport::failed(&target, outcome.attempts, error.to_string()),
        };

        log_publish(&target, report.published, report.attempts, timer.elapsed_secs());
        report
    }
    .instrument(span)
    .await
}

/// POSTs the request as JSON to a fixed endpoint.
///
/// The response body may carry `id` and `url` fields, which are copied to
/// the result.
pub struct HttpPublisher {
    name: String,
    url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize, Default)]
struct HttpPublishResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl HttpPublisher {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            token: None,
            http_client: reqwest::Client::new(),
        }
    }

    /// Send `Authorization: Bearer <token>` on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult> {
        let mut builder = self.http_client.post(&self.url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PmError::publish(&self.name, format!("connection failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {}", status);
            // 4xx other than 408/429 will not get better on retry
            if status.is_client_error()
                && !crate::retry::is_retryable_status_code(status.as_u16())
            {
                return Ok(PublishResult::rejected(message));
            }
            return Err(PmError::publish(&self.name, message));
        }

        let body = match response.bytes().await {
            Ok(bytes) => decode_publish_response(&self.name, &bytes),
            Err(e) => {
                tracing::warn!(target_name = %self.name, error = %e, "failed to read publish response body");
                HttpPublishResponse::default()
            }
        };
        let id = body.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(PublishResult::published(id, body.url))
    }
}

/// Decode a success body. An empty body is fine; an unreadable one is logged
/// and treated as carrying no id or url.
fn decode_publish_response(target: &str, bytes: &[u8]) -> HttpPublishResponse {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return HttpPublishResponse::default();
    }
    match serde_json::from_slice(bytes) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(target_name = %target, error = %e, "failed to decode publish response");
            HttpPublishResponse::default()
        }
    }
}

/// Stands in for a target with no endpoint configured.
pub struct UnconfiguredPublisher {
    name: String,
}

impl UnconfiguredPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Publisher for UnconfiguredPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, _request: &PublishRequest) -> Result<PublishResult> {
        Ok(PublishResult::rejected(format!("{} is not configured", self.name)))
    }
}

/// In-memory publisher that records every request.
///
/// Can be told to fail a number of times before succeeding, or to fail
/// forever.
pub struct RecordingPublisher {
    name: String,
    requests: Mutex<Vec<PublishRequest>>,
    failures_remaining: AtomicU32,
    failure_message: String,
}

impl RecordingPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requests: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
            failure_message: "HTTP 503 Service Unavailable".to_string(),
        }
    }

    /// Fail the first `failures` calls with a retryable error.
    pub fn flaky(name: impl Into<String>, failures: u32) -> Self {
        let publisher = Self::new(name);
        publisher.failures_remaining.store(failures, Ordering::SeqCst);
        publisher
    }

    /// Fail every call.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut publisher = Self::flaky(name, u32::MAX);
        publisher.failure_message = message.into();
        publisher
    }

    /// Requests received so far, including failed attempts.
    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult> {
        let count = {
            let mut requests = self
                .requests
                .lock()
                .map_err(|e| PmError::Internal(format!("publisher lock poisoned: {}", e)))?;
            requests.push(request.clone());
            requests.len()
        };

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                u32::MAX => Some(u32::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            return Err(PmError::publish(&self.name, self.failure_message.clone()));
        }

        Ok(PublishResult::published(
            format!("{}-{}", self.name, count),
            Some(format!("memory://{}/{}", self.name, count)),
        ))
    }
}

/// The three publishing targets.
#[derive(Clone)]
pub struct Publishers {
    pub document_store: Arc<dyn Publisher>,
    pub issue_tracker: Arc<dyn Publisher>,
    pub whiteboard: Arc<dyn Publisher>,
}

impl Publishers {
    /// HTTP publishers for every configured URL, unconfigured stand-ins for
    /// the rest.
    pub fn from_config(config: &PublishConfig) -> Self {
        let build = |name: &str, url: &Option<String>| -> Arc<dyn Publisher> {
            match url {
                Some(url) => {
                    let mut publisher = HttpPublisher::new(name, url.clone());
                    if let Some(token) = &config.api_token {
                        publisher = publisher.with_token(token.clone());
                    }
                    Arc::new(publisher)
                }
                None => Arc::new(UnconfiguredPublisher::new(name)),
            }
        };

        Self {
            document_store: build(DOCUMENT_STORE, &config.document_store_url),
            issue_tracker: build(ISSUE_TRACKER, &config.issue_tracker_url),
            whiteboard: build(WHITEBOARD, &config.whiteboard_url),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            document_store: Arc::new(UnconfiguredPublisher::new(DOCUMENT_STORE)),
            issue_tracker: Arc::new(UnconfiguredPublisher::new(ISSUE_TRACKER)),
            whiteboard: Arc::new(UnconfiguredPublisher::new(WHITEBOARD)),
        }
    }

    /// Names of targets backed by a real endpoint.
    pub fn configured_targets(config: &PublishConfig) -> Vec<&'static str> {
        [
            (DOCUMENT_STORE, &config.document_store_url),
            (ISSUE_TRACKER, &config.issue_tracker_url),
            (WHITEBOARD, &config.whiteboard_url),
        ]
        .into_iter()
        .filter(|(_, url)| url.is_some())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for Publishers {
    fn default() -> Self {
        Self::unconfigured()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> PublishRequest {
        PublishRequest {
            session_id: "s-1".to_string(),
            stage: Stage::Prd,
            title: "Habit tracker PRD".to_string(),
            content_type: "text/markdown".to_string(),
            body: "# Habit tracker".to_string(),
            payload: Value::Null,
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(2)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    #[test]
    fn test_decode_publish_response() {
        let body = decode_publish_response(DOCUMENT_STORE, br#"{"id":"doc-7","url":"https://docs.example/7"}"#);
        assert_eq!(body.id.as_deref(), Some("doc-7"));
        assert_eq!(body.url.as_deref(), Some("https://docs.example/7"));

        let empty = decode_publish_response(DOCUMENT_STORE, b"  ");
        assert!(empty.id.is_none());

        let garbled = decode_publish_response(DOCUMENT_STORE, b"<html>ok</html>");
        assert!(garbled.id.is_none());
        assert!(garbled.url.is_none());
    }

    #[tokio::test]
    async fn test_recording_publisher_succeeds() {
        let publisher = RecordingPublisher::new(DOCUMENT_STORE);
        let report = publish_with_retry(&publisher, &request(), &fast_policy()).await;
        assert!(report.published);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.external_id.as_deref(), Some("document_store-1"));
        assert_eq!(publisher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_flaky_publisher_recovers_within_budget() {
        let publisher = RecordingPublisher::flaky(ISSUE_TRACKER, 2);
        let report = publish_with_retry(&publisher, &request(), &fast_policy()).await;
        assert!(report.published);
        assert_eq!(report.attempts, 3);
    }

    #[tokio::test]
    async fn test_failing_publisher_reports_without_error() {
        let publisher = RecordingPublisher::failing(WHITEBOARD, "HTTP 503 down for maintenance");
        let report = publish_with_retry(&publisher, &request(), &fast_policy()).await;
        assert!(report.artifact_generated);
        assert!(!report.published);
        assert_eq!(report.attempts, 3);
        assert!(report.error_message.unwrap().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_unconfigured_publisher_is_not_retried() {
        let publisher = UnconfiguredPublisher::new(DOCUMENT_STORE);
        let report = publish_with_retry(&publisher, &request(), &fast_policy()).await;
        assert!(!report.published);
        assert_eq!(report.attempts, 1);
        assert!(report.error_message.unwrap().contains("not configured"));
    }

    #[test]
    fn test_publishers_from_config() {
        let config = PublishConfig {
            issue_tracker_url: Some("https://tracker.example.com/import".to_string()),
            ..Default::default()
        };
        let publishers = Publishers::from_config(&config);
        assert_eq!(publishers.issue_tracker.name(), ISSUE_TRACKER);
        assert_eq!(Publishers::configured_targets(&config), vec![ISSUE_TRACKER]);
    }
}
