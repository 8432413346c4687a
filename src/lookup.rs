use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Fixed timeout of the outbound lookup call.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("certificate not found")]
    NotFound,
    #[error("lookup service unavailable: {0}")]
    Unavailable(String),
}

/// CaLookup Contract
///
/// Resolves the validity date of a Certificate of Approval (CA) by its number. The
/// handler always passes a digits-only code.
#[async_trait]
pub trait CaLookup: Send + Sync {
    async fn validity(&self, code: &str) -> Result<String, LookupError>;
}

pub type LookupState = Arc<dyn CaLookup>;

/// Keeps only the ASCII digits of a CA code (`"123-45"` becomes `"12345"`).
pub fn normalize_ca_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Picks `validade` out of the first record of the upstream array.
pub fn extract_validity(payload: &Value) -> Result<String, LookupError> {
    let records = payload
        .as_array()
        .ok_or_else(|| LookupError::Unavailable("expected a JSON array".to_string()))?;

    match records.first().and_then(|record| record.get("validade")) {
        None | Some(Value::Null) => Err(LookupError::NotFound),
        Some(Value::String(s)) if s.trim().is_empty() => Err(LookupError::NotFound),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
    }
}

/// HttpCaLookup
///
/// The real client. Requests `GET {base_url}/{code}`; no retries.
#[derive(Clone)]
pub struct HttpCaLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCaLookup {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, LOOKUP_TIMEOUT)
    }

    /// Same client with a different request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CaLookup for HttpCaLookup {
    async fn validity(&self, code: &str) -> Result<String, LookupError> {
        let url = format!("{}/{}", self.base_url, code);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound);
        }
        if !status.is_success() {
            return Err(LookupError::Unavailable(format!("upstream answered {}", status)));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| LookupError::Unavailable(format!("malformed payload: {}", e)))?;

        extract_validity(&payload)
    }
}

/// MockCaLookup
///
/// In-memory lookup for tests. Records every code it is asked for.
#[derive(Default)]
pub struct MockCaLookup {
    pub validities: HashMap<String, String>,
    pub should_fail: bool,
    requested: Mutex<Vec<String>>,
}

impl MockCaLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(code: &str, validade: &str) -> Self {
        let mut mock = Self::new();
        mock.validities.insert(code.to_string(), validade.to_string());
        mock
    }

    /// Every call fails as if the upstream were down.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CaLookup for MockCaLookup {
    async fn validity(&self, code: &str) -> Result<String, LookupError> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(code.to_string());
        }
        if self.should_fail {
            return Err(LookupError::Unavailable("mock upstream down".to_string()));
        }
        self.validities
            .get(code)
            .cloned()
            .ok_or(LookupError::NotFound)
    }
}
