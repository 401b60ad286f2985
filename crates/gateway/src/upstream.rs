// Thin collaborator that makes the single outbound call to the OpenAI-shape
// upstream. Mirrors `OpenAiCompatibleBackend`'s header-building and
// non-2xx handling, minus the provider trait machinery this gateway has no
// use for.

use crate::error::GatewayError;
use bytes::Bytes;
use futures_util::Stream;
use reqwest::{Client, Response};

/// The caller-supplied credential, forwarded to the upstream as a bearer
/// token. Falls back to the gateway's own `OPENAI_API_KEY` when the client
/// didn't send one.
pub fn build_headers(api_key: &str) -> Result<reqwest::header::HeaderMap, GatewayError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert("Content-Type", reqwest::header::HeaderValue::from_static("application/json"));
    let auth_value = format!("Bearer {api_key}");
    let value = reqwest::header::HeaderValue::from_str(&auth_value)
        .map_err(|e| GatewayError::MalformedRequest(format!("invalid credential: {e}")))?;
    headers.insert("Authorization", value);
    Ok(headers)
}

/// Forwards the few passthrough headers the spec names, when the client
/// sent them. Never fails: an invalid header value is dropped, not fatal.
pub fn forward_optional_headers(
    headers: &mut reqwest::header::HeaderMap,
    incoming: &axum::http::HeaderMap,
) {
    for name in ["x-real-ip", "user-agent", "referer"] {
        if let Some(value) = incoming.get(name) {
            if let Ok(value) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
                headers.insert(name, value);
            }
        }
    }
}

/// POSTs the translated OpenAI-shape request to `<base_url>/chat/completions`
/// and returns the raw response for the caller to branch on (stream vs not).
/// Never interprets the body; that's the ResponseConverter/StreamTransformer's
/// job.
pub async fn send(
    client: &Client,
    base_url: &str,
    headers: reqwest::header::HeaderMap,
    body: &gateway_core::OpenAIRequest,
) -> Result<Response, GatewayError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    client
        .post(&url)
        .headers(headers)
        .timeout(std::time::Duration::from_secs(600))
        .json(body)
        .send()
        .await
        .map_err(|e| GatewayError::UpstreamTransport(e.to_string()))
}

/// Attempts to surface a human-readable message from a non-2xx upstream
/// body, for diagnostics only — the body forwarded to the client is always
/// the raw bytes, verbatim.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| value.get("detail"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// Adapts a reqwest byte stream into the `Stream<Item = Bytes>` shape the
/// StreamTransformer is fed with; transport errors are logged and end the
/// stream rather than panicking the request task.
pub fn bytes_stream(response: Response) -> impl Stream<Item = Bytes> {
    use futures_util::StreamExt;
    response.bytes_stream().filter_map(|chunk| async move {
        match chunk {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(error = %err, "upstream transport error mid-stream");
                None
            }
        }
    })
}
