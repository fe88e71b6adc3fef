use std::env;
use std::time::{Duration, Instant};

use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;

use crate::backend::{ChatBackend, ChunkStream};
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, STREAM_BYTES,
};
use crate::sse::process_sse;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest};

/// Base URL used when the configuration does not name one.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
/// Environment variable holding the bearer credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for an OpenAI-compatible chat completions API.
///
/// Only connection establishment has a deadline; once a response starts streaming the client
/// waits for every chunk for as long as it takes.
#[derive(Debug, Clone)]
pub struct ChatClient {
    api_key: Option<String>,
    client: ReqwestClient,
    base_url: String,
    connect_timeout: Duration,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// The API key can be provided directly or read from the `OPENAI_API_KEY` environment
    /// variable.  A missing key is not an error here; requests fail with an authentication
    /// error instead.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.or_else(|| env::var(API_KEY_VAR).ok());
        let connect_timeout = connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            api_key,
            client,
            base_url,
            connect_timeout,
        })
    }

    /// The endpoint all completions are posted to.
    pub fn completions_url(&self) -> String {
        format!("{}chat/completions", self.base_url)
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::authentication(format!(
                "API key not provided and {API_KEY_VAR} environment variable not set"
            ))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        error_from_status(status_code, &error_body, request_id, retry_after)
    }

    /// Send a chat completion request and stream the response text.
    pub async fn stream(&self, mut request: ChatCompletionRequest) -> Result<ChunkStream> {
        request.stream = true;
        let url = self.completions_url();
        let headers = self.default_headers()?;

        CLIENT_REQUESTS.click();
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "starting chat completion stream"
        );
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(format!(
                        "Connection not established within {}s: {e}",
                        self.connect_timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        let bytes = response.bytes_stream().inspect(|chunk| {
            if let Ok(chunk) = chunk {
                STREAM_BYTES.count(chunk.len() as u64);
            }
        });
        let chunks = process_sse(bytes).filter_map(|payload| async move {
            match payload {
                Ok(payload) => chunk_text(&payload).transpose(),
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(chunks))
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn stream_chat(&self, request: ChatCompletionRequest) -> Result<ChunkStream> {
        self.stream(request).await
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
    param: Option<String>,
    code: Option<String>,
}

/// Map an HTTP status and error body onto an [`Error`].
fn error_from_status(
    status_code: u16,
    error_body: &str,
    request_id: Option<String>,
    retry_after: Option<u64>,
) -> Error {
    let parsed_error = serde_json::from_str::<ErrorResponse>(error_body)
        .ok()
        .and_then(|e| e.error);
    let error_type = parsed_error
        .as_ref()
        .and_then(|e| e.error_type.clone().or_else(|| e.code.clone()));
    let error_message = parsed_error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| error_body.trim().to_string());
    let error_param = parsed_error.as_ref().and_then(|e| e.param.clone());

    match status_code {
        400 => Error::bad_request(error_message, error_param),
        401 => Error::authentication(error_message),
        403 => Error::permission(error_message),
        404 => Error::not_found(error_message),
        408 => Error::timeout(error_message),
        429 => Error::rate_limit(error_message, retry_after),
        500 => Error::internal_server(error_message, request_id),
        502..=504 => Error::service_unavailable(error_message, retry_after),
        _ => Error::api(status_code, error_type, error_message, request_id),
    }
}

/// Interpret one SSE payload as response text.
///
/// Returns `Ok(None)` for chunks that carry no text (role announcements, finish markers).  An
/// error object sent in place of a chunk becomes an error.
fn chunk_text(payload: &str) -> Result<Option<String>> {
    if payload.trim().is_empty() {
        return Ok(None);
    }
    if let Ok(ErrorResponse {
        error: Some(detail),
    }) = serde_json::from_str::<ErrorResponse>(payload)
    {
        return Err(Error::api(
            500,
            detail.error_type.or(detail.code),
            detail.message.unwrap_or_else(|| payload.to_string()),
            None,
        ));
    }
    let chunk = serde_json::from_str::<ChatCompletionChunk>(payload).map_err(|e| {
        Error::serialization(
            format!("Failed to parse stream chunk: {e}"),
            Some(Box::new(e)),
        )
    })?;
    Ok(chunk
        .text()
        .filter(|text| !text.is_empty())
        .map(String::from))
}
