// The Gateway component (spec §4.6): parses the client request, picks the
// stream/non-stream branch, forwards headers, and pipes bytes. All the
// actual shape translation lives in `gateway_core`.

use crate::error::GatewayError;
use crate::upstream;
use crate::AppState;
use async_stream::stream;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use gateway_core::{convert_request, convert_response, AnthropicRequest, OpenAIResponse, StreamTransformer};
use std::convert::Infallible;
use std::time::Duration;
use tracing::debug;

pub async fn handle_messages(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    match handle(state, headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: AppState, headers: HeaderMap, body: Bytes) -> Result<Response, GatewayError> {
    let api_key = extract_credential(&headers)
        .or_else(|| state.config.openai_api_key.clone())
        .ok_or(GatewayError::AuthMissing)?;

    let request: AnthropicRequest =
        serde_json::from_slice(&body).map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;

    debug!(
        model = %request.model,
        stream = request.stream,
        messages = request.messages.len(),
        "translating anthropic-shape request"
    );

    let openai_request = convert_request(&request, &request.model);

    let mut upstream_headers = upstream::build_headers(&api_key)?;
    upstream::forward_optional_headers(&mut upstream_headers, &headers);

    let upstream_response = upstream::send(
        &state.http_client,
        &state.config.openai_base_url,
        upstream_headers,
        &openai_request,
    )
    .await?;

    let status = upstream_response.status();
    if !status.is_success() {
        let body_text = upstream_response.text().await.unwrap_or_default();
        if let Some(message) = upstream::extract_error_message(&body_text) {
            tracing::warn!(status = %status, message = %message, "upstream returned a non-2xx response");
        }
        return Err(GatewayError::UpstreamStatus { status, body: body_text });
    }

    if request.stream {
        stream_response(upstream_response, request.model.clone())
    } else {
        let body_text = upstream_response
            .text()
            .await
            .map_err(|e| GatewayError::UpstreamTransport(e.to_string()))?;
        let openai_response: OpenAIResponse = serde_json::from_str(&body_text)
            .map_err(|e| GatewayError::UpstreamTransport(format!("upstream response did not parse: {e}")))?;
        let anthropic_response = convert_response(&openai_response, &request.model);
        Ok(Json(anthropic_response).into_response())
    }
}

/// Drives the upstream byte stream through the `StreamTransformer` and
/// re-emits it as an Anthropic-shape SSE response. Peeks the first chunk so
/// an upstream error arriving as the very first SSE frame (same HTTP status
/// as a real stream start) still surfaces as a clean error response rather
/// than a half-open stream; once real content has flowed the transformer's
/// own best-effort terminal handling takes over.
fn stream_response(response: reqwest::Response, model: String) -> Result<Response, GatewayError> {
    let mut byte_stream = Box::pin(upstream::bytes_stream(response));

    let sse_stream = stream! {
        let Some(first_chunk) = byte_stream.next().await else {
            let mut transformer = StreamTransformer::new(model);
            for event in transformer.finish_on_disconnect() {
                yield Ok::<_, Infallible>(to_sse_event(event));
            }
            return;
        };

        if let Some(message) = detect_inline_error(&first_chunk) {
            yield Ok(Event::default().event("error").data(
                serde_json::json!({"error": {"message": message}}).to_string(),
            ));
            return;
        }

        let mut transformer = StreamTransformer::new(model);
        let mut saw_terminal = false;

        for event in transformer.process_chunk(&first_chunk) {
            saw_terminal |= event.event == "message_stop";
            yield Ok(to_sse_event(event));
        }

        while let Some(chunk) = byte_stream.next().await {
            for event in transformer.process_chunk(&chunk) {
                saw_terminal |= event.event == "message_stop";
                yield Ok(to_sse_event(event));
            }
        }

        if !saw_terminal {
            for event in transformer.finish_on_disconnect() {
                yield Ok(to_sse_event(event));
            }
        }
    };

    Ok(Sse::new(sse_stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(30)))
        .into_response())
}

fn to_sse_event(event: gateway_core::AnthropicSseEvent) -> Event {
    Event::default().event(event.event).data(event.data.to_string())
}

/// Looks at a raw chunk for a bare `{"error": {...}}` payload carrying no
/// `choices` field — the shape an upstream uses when it decides to fail
/// after already committing to a 200 + `text/event-stream` response.
fn detect_inline_error(chunk: &Bytes) -> Option<String> {
    let text = String::from_utf8_lossy(chunk);
    for line in text.lines() {
        let Some(data) = line.trim().strip_prefix("data: ") else { continue };
        if data == "[DONE]" {
            return None;
        }
        let value: serde_json::Value = serde_json::from_str(data).ok()?;
        if value.get("choices").is_some() {
            return None;
        }
        return value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string);
    }
    None
}

fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }
    headers.get("x-api-key").and_then(|v| v.to_str().ok()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, "Bearer sk-abc".parse().unwrap());
        assert_eq!(extract_credential(&headers), Some("sk-abc".to_string()));
    }

    #[test]
    fn falls_back_to_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "sk-def".parse().unwrap());
        assert_eq!(extract_credential(&headers), Some("sk-def".to_string()));
    }

    #[test]
    fn missing_credential_is_none() {
        assert_eq!(extract_credential(&HeaderMap::new()), None);
    }

    #[test]
    fn detects_inline_error_with_no_choices_field() {
        let chunk = Bytes::from_static(b"data: {\"error\":{\"message\":\"boom\"}}\n\n");
        assert_eq!(detect_inline_error(&chunk), Some("boom".to_string()));
    }

    #[test]
    fn does_not_flag_a_normal_chunk_as_an_error() {
        let chunk = Bytes::from_static(
            b"data: {\"id\":\"chatcmpl-1\",\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
        );
        assert_eq!(detect_inline_error(&chunk), None);
    }
}
