//! Replay verification
//!
//! Sends every catalog entry's mock request to a running server's replay
//! endpoint and checks that the answer matches the catalog.

use crate::catalog::{Catalog, HttpMethod, StatusCodeEntry};
use crate::replay::{carries_body, MOCK_STATUS_HEADER, REPLAY_PREFIX};
use anyhow::Result;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Headers that describe the connection rather than the request
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "upgrade",
    "expect",
    "host",
    "te",
    "transfer-encoding",
    "keep-alive",
];

/// Outcome of replaying one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub code: u16,
    pub method: String,
    pub url: String,
    pub expected_status: u16,
    /// Status reported by the server (if a response arrived)
    pub actual_status: Option<u16>,
    pub body_matches: bool,
    pub passed: bool,
    pub error: Option<String>,
    pub latency_ms: f64,
}

/// Aggregated verification run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerifyReport {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub total_duration_ms: f64,
    pub results: Vec<VerifyResult>,
}

impl VerifyReport {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Replays catalog mocks against a server
pub struct ReplayVerifier {
    client: Client,
    running: Arc<AtomicBool>,
}

impl ReplayVerifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Check if a run is in progress
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the current run after the in-flight request
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Replay every entry of `catalog` against `base_url`
    pub async fn run(&self, catalog: &Catalog, base_url: &str) -> Result<VerifyReport> {
        if self.running.swap(true, Ordering::Relaxed) {
            anyhow::bail!("Verification is already running");
        }

        let start = Instant::now();
        let base = base_url.trim_end_matches('/');
        let mut results = Vec::with_capacity(catalog.len());

        tracing::info!(target = %base, entries = catalog.len(), "Starting replay verification");

        for entry in catalog.entries() {
            if !self.running.load(Ordering::Relaxed) {
                tracing::info!("Verification stopped");
                break;
            }

            let result = self.verify_entry(entry, base).await;
            if !result.passed {
                tracing::warn!(
                    code = result.code,
                    actual = ?result.actual_status,
                    error = ?result.error,
                    "Replay mismatch"
                );
            }
            results.push(result);
        }

        self.running.store(false, Ordering::Relaxed);

        let total = results.len() as u32;
        let passed = results.iter().filter(|r| r.passed).count() as u32;
        let report = VerifyReport {
            total,
            passed,
            failed: total - passed,
            total_duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            results,
        };

        tracing::info!(
            total = %report.total,
            passed = %report.passed,
            failed = %report.failed,
            "Verification completed"
        );

        Ok(report)
    }

    async fn verify_entry(&self, entry: &StatusCodeEntry, base: &str) -> VerifyResult {
        let mock = &entry.mock;
        let url = format!("{}{}{}", base, REPLAY_PREFIX, mock.url);
        let start = Instant::now();

        let mut result = VerifyResult {
            code: entry.code,
            method: mock.method.to_string(),
            url: url.clone(),
            expected_status: mock.status,
            actual_status: None,
            body_matches: false,
            passed: false,
            error: None,
            latency_ms: 0.0,
        };

        match self.send(entry, &url).await {
            Ok((status, body)) => {
                result.actual_status = Some(status);
                result.body_matches = body_matches(mock.status, &mock.response, &body);
                result.passed = status == mock.status && result.body_matches;
            }
            Err(e) => result.error = Some(e.to_string()),
        }
        result.latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }

    /// Send one mock request, returning the reported status and raw body
    async fn send(&self, entry: &StatusCodeEntry, url: &str) -> Result<(u16, Vec<u8>)> {
        let mut builder = self.client.request(method_for(entry.mock.method), url);

        for (name, value) in entry.mock.header_pairs() {
            if HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            builder = builder.header(name, value);
        }

        if let Some(body) = &entry.mock.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response
            .headers()
            .get(MOCK_STATUS_HEADER.as_str())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or_else(|| response.status().as_u16());
        let body = response.bytes().await?;

        Ok((status, body.to_vec()))
    }
}

fn method_for(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Compare a replayed body with the catalog's mock response
pub fn body_matches(code: u16, expected: &Value, body: &[u8]) -> bool {
    if !carries_body(code) {
        return body.is_empty();
    }
    serde_json::from_slice::<Value>(body)
        .map(|actual| &actual == expected)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verifier_creation() {
        let verifier = ReplayVerifier::new(Duration::from_secs(5)).unwrap();
        assert!(!verifier.is_running());
    }

    #[test]
    fn test_body_matches() {
        let expected = json!({ "id": 1, "name": "Ada Lovelace" });
        assert!(body_matches(200, &expected, br#"{"name":"Ada Lovelace","id":1}"#));
        assert!(!body_matches(200, &expected, br#"{"id":2}"#));
        assert!(!body_matches(200, &expected, b"not json"));

        assert!(body_matches(204, &json!({}), b""));
        assert!(!body_matches(204, &json!({}), b"{}"));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(method_for(HttpMethod::Delete), Method::DELETE);
        assert_eq!(method_for(HttpMethod::Get), Method::GET);
    }

    #[test]
    fn test_report_serialization() {
        let report = VerifyReport {
            total: 1,
            passed: 1,
            failed: 0,
            total_duration_ms: 3.5,
            results: vec![VerifyResult {
                code: 200,
                method: "GET".to_string(),
                url: "http://127.0.0.1:3000/mock/api/users/1".to_string(),
                expected_status: 200,
                actual_status: Some(200),
                body_matches: true,
                passed: true,
                error: None,
                latency_ms: 3.1,
            }],
        };

        assert!(report.all_passed());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"passed\":true"));
    }
}
