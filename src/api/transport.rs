//! HTTP transport seam for the Virsaa API.
//!
//! Requests are described as plain data (`ApiRequest`) so that an attempt
//! can be rebuilt and replayed after a token refresh, and so the session
//! machine and request wrapper can be exercised against a scripted
//! in-memory transport in tests.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Request body variants. Multipart parts are owned bytes so a request
/// can be cloned for the single post-refresh replay.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// One part of a multipart form.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

/// A single outbound request, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }
}

/// A response with its raw body. Bodies are parsed lazily because error
/// paths want the text while success paths want typed JSON.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parse the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", self.status, e)))
    }

    /// Parse the body as loose JSON, if it is JSON at all.
    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Executes one request against the backend. The only seam that touches
/// the network; everything above it is deterministic.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    fn build_multipart(parts: &[FormPart]) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match &part.value {
                PartValue::Text(text) => form.text(part.name.clone(), text.clone()),
                PartValue::File {
                    file_name,
                    mime,
                    bytes,
                } => {
                    let file_part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)
                        .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
                    form.part(part.name.clone(), file_part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if let Some(ref token) = request.bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(Self::build_multipart(parts)?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(method = %request.method, path = %request.path, status = %status, "Request completed");

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory transport for protocol tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    struct ScriptedResponse {
        status: u16,
        body: String,
        delay: Option<Duration>,
    }

    /// Transport fake keyed by request path. Responses are consumed in
    /// FIFO order; an unscripted request fails as a network error so a
    /// test that issues one extra call fails loudly.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        scripts: Mutex<HashMap<String, Vec<ScriptedResponse>>>,
        calls: Mutex<Vec<ApiRequest>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, path: &str, status: u16, body: &str) {
            self.scripts
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push(ScriptedResponse {
                    status,
                    body: body.to_string(),
                    delay: None,
                });
        }

        /// Script a response that stalls before completing, to hold an
        /// exchange in flight while the test mutates session state.
        pub fn script_with_delay(&self, path: &str, status: u16, body: &str, delay_ms: u64) {
            self.scripts
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default()
                .push(ScriptedResponse {
                    status,
                    body: body.to_string(),
                    delay: Some(Duration::from_millis(delay_ms)),
                });
        }

        /// Number of calls that reached the given path.
        pub fn call_count(&self, path: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.path == path)
                .count()
        }

        /// All recorded calls to the given path, in order.
        pub fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.path == path)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
            let path = request.path.clone();
            self.calls.lock().unwrap().push(request);

            let scripted = {
                let mut scripts = self.scripts.lock().unwrap();
                let queue = scripts
                    .get_mut(&path)
                    .ok_or_else(|| ApiError::Network(format!("no scripted response for {}", path)))?;
                if queue.is_empty() {
                    return Err(ApiError::Network(format!("script exhausted for {}", path)));
                }
                queue.remove(0)
            };

            if let Some(delay) = scripted.delay {
                tokio::time::sleep(delay).await;
            }

            Ok(ApiResponse {
                status: StatusCode::from_u16(scripted.status)
                    .expect("Invalid scripted status code"),
                body: scripted.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::new(Method::GET, "/api/auth/users/all/")
            .bearer("tok-123");
        assert_eq!(request.path, "/api/auth/users/all/");
        assert_eq!(request.bearer.as_deref(), Some("tok-123"));
        assert!(matches!(request.body, RequestBody::Empty));
    }

    #[test]
    fn test_response_json_parse_failure_is_local() {
        let response = ApiResponse {
            status: StatusCode::OK,
            body: "not json".to_string(),
        };
        let parsed: Result<Vec<i64>, _> = response.json();
        assert!(matches!(parsed, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let transport = HttpTransport::new("http://localhost:8000///").unwrap();
        assert_eq!(transport.base_url, "http://localhost:8000");
    }
}
