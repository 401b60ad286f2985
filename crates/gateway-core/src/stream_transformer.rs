// The heart of the gateway: a stateful machine that turns a chunked,
// incremental OpenAI-shape SSE stream into a well-formed Anthropic-shape
// SSE event sequence.
//
// Push-driven: bytes in, events out. One instance owns the mutable state
// for exactly one request and is discarded when the stream terminates.

use crate::id_minter;
use crate::models::{OpenAIDelta, OpenAIStreamChunk, OpenAIToolCallDelta, StopReason};
use std::collections::HashMap;
use tracing::warn;

/// One outbound Anthropic-shape SSE frame: `event: <name>\ndata: <json>\n\n`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnthropicSseEvent {
    pub event: &'static str,
    pub data: serde_json::Value,
}

impl AnthropicSseEvent {
    pub fn to_sse_string(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

#[derive(Debug, Default)]
struct ThinkingBlockState {
    claude_index: Option<i64>,
    content: String,
    started: bool,
    stopped: bool,
    signature: Option<String>,
}

#[derive(Debug, Default)]
struct ToolCallState {
    id: Option<String>,
    name: Option<String>,
    args_buffer: String,
    claude_index: Option<i64>,
    started: bool,
    stopped: bool,
}

/// Splits a raw SSE byte stream into `data: ` payloads, carrying a partial
/// trailing line across chunk boundaries.
#[derive(Debug, Default)]
struct LineFramer {
    buffer: String,
}

enum FramedLine {
    Data(String),
    Done,
}

impl LineFramer {
    fn feed(&mut self, bytes: &[u8]) -> Vec<FramedLine> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            if data == "[DONE]" {
                out.push(FramedLine::Done);
            } else {
                out.push(FramedLine::Data(data.to_string()));
            }
        }
        out
    }
}

pub struct StreamTransformer {
    model: String,
    initialized: bool,
    message_id: Option<String>,
    upstream_id: Option<String>,
    next_index: i64,
    thinking_blocks: HashMap<i64, ThinkingBlockState>,
    reasoning_started: bool,
    reasoning_stopped: bool,
    reasoning_claude_index: Option<i64>,
    text_started: bool,
    text_stopped: bool,
    text_claude_index: Option<i64>,
    tool_calls: HashMap<i64, ToolCallState>,
    input_tokens: i64,
    output_tokens: i64,
    last_finish_reason: Option<String>,
    framer: LineFramer,
    done: bool,
}

impl StreamTransformer {
    /// `model` is the name echoed back to the client in `message_start`.
    pub fn new(model: String) -> Self {
        Self {
            model,
            initialized: false,
            message_id: None,
            upstream_id: None,
            next_index: 0,
            thinking_blocks: HashMap::new(),
            reasoning_started: false,
            reasoning_stopped: false,
            reasoning_claude_index: None,
            text_started: false,
            text_stopped: false,
            text_claude_index: None,
            tool_calls: HashMap::new(),
            input_tokens: 0,
            output_tokens: 0,
            last_finish_reason: None,
            framer: LineFramer::default(),
            done: false,
        }
    }

    /// Feeds a raw chunk of upstream SSE bytes and returns every complete
    /// Anthropic-shape event it produces, in emission order. Malformed
    /// `data:` lines are dropped; `[DONE]` triggers terminal handling.
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Vec<AnthropicSseEvent> {
        if self.done {
            return Vec::new();
        }

        let mut events = Vec::new();
        for line in self.framer.feed(bytes) {
            match line {
                FramedLine::Data(data) => match serde_json::from_str::<OpenAIStreamChunk>(&data) {
                    Ok(chunk) => events.extend(self.handle_chunk(&chunk)),
                    Err(err) => {
                        warn!(error = %err, "failed to parse upstream stream chunk, skipping line");
                    }
                },
                FramedLine::Done => {
                    events.extend(self.finalize());
                    return events;
                }
            }
        }
        events
    }

    /// Called when the upstream connection closes without a `[DONE]`
    /// marker. Best-effort closes whatever is open and emits the terminal
    /// sequence, defaulting `stop_reason` to `end_turn`.
    pub fn finish_on_disconnect(&mut self) -> Vec<AnthropicSseEvent> {
        if self.done {
            return Vec::new();
        }
        self.finalize()
    }

    fn handle_chunk(&mut self, chunk: &OpenAIStreamChunk) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();

        if !self.initialized {
            self.upstream_id = chunk.id.clone();
            self.message_id = Some(id_minter::mint(chunk.id.as_deref()));
            self.initialized = true;
            events.push(self.message_start_event());
        }

        if let Some(usage) = &chunk.usage {
            self.input_tokens = self.input_tokens.max(usage.prompt_tokens);
            self.output_tokens = self.output_tokens.max(usage.completion_tokens);
        }

        if let Some(choice) = chunk.choices.first() {
            if let Some(reason) = &choice.finish_reason {
                self.last_finish_reason = Some(reason.clone());
            }
            events.extend(self.handle_delta(&choice.delta));
        }

        events
    }

    fn handle_delta(&mut self, delta: &OpenAIDelta) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();

        let has_thinking_blocks = delta.thinking_blocks.as_ref().is_some_and(|b| !b.is_empty());
        let has_reasoning = delta.reasoning_content.is_some();
        let has_content = delta.content.is_some();
        let has_tool_calls = delta.tool_calls.as_ref().is_some_and(|t| !t.is_empty());

        // Transitions: close whatever thinking-phase block is open once a
        // later phase (text or tool-use) begins, or once the structured
        // thinking_blocks[] pathway supersedes a scalar reasoning stream.
        if self.reasoning_started
            && !self.reasoning_stopped
            && (has_content || has_tool_calls || has_thinking_blocks)
        {
            events.extend(self.close_reasoning_block());
        }
        if (has_content || has_tool_calls) && self.any_thinking_block_open() {
            events.extend(self.close_all_thinking_blocks());
        }
        if self.text_started && !self.text_stopped && has_tool_calls && !has_content {
            events.push(self.close_text_block());
        }

        if has_thinking_blocks {
            events.extend(self.handle_thinking_blocks(delta));
        } else if has_reasoning {
            events.extend(self.handle_reasoning(delta));
        }

        if let Some(text) = &delta.content {
            events.extend(self.handle_text(text));
        }

        if let Some(tool_calls) = &delta.tool_calls {
            for tc in tool_calls {
                events.extend(self.handle_tool_call_delta(tc));
            }
        }

        events
    }

    fn handle_thinking_blocks(&mut self, delta: &OpenAIDelta) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();
        let Some(blocks) = &delta.thinking_blocks else { return events };

        for block in blocks {
            // Single thinking stream, upstream index 0 by convention.
            let already_started = self.thinking_blocks.get(&0).is_some_and(|s| s.started);

            if !already_started {
                if block.thinking.is_none() && block.signature.is_none() {
                    continue;
                }
                let idx = self.open_index();
                let state = self.thinking_blocks.entry(0).or_default();
                state.started = true;
                state.claude_index = Some(idx);
                if let Some(sig) = &block.signature {
                    state.signature = Some(sig.clone());
                }
                events.push(AnthropicSseEvent {
                    event: "content_block_start",
                    data: serde_json::json!({
                        "type": "content_block_start",
                        "index": idx,
                        "content_block": {
                            "type": "thinking",
                            "thinking": "",
                            "signature": state.signature,
                        }
                    }),
                });
            }

            let state = self.thinking_blocks.get_mut(&0).unwrap();
            let idx = state.claude_index.unwrap();

            if let Some(text) = &block.thinking {
                state.content.push_str(text);
                events.push(AnthropicSseEvent {
                    event: "content_block_delta",
                    data: serde_json::json!({
                        "type": "content_block_delta",
                        "index": idx,
                        "delta": {"type": "thinking_delta", "thinking": text}
                    }),
                });
            }

            if let Some(sig) = &block.signature {
                state.signature = Some(sig.clone());
                events.push(AnthropicSseEvent {
                    event: "content_block_delta",
                    data: serde_json::json!({
                        "type": "content_block_delta",
                        "index": idx,
                        "delta": {"type": "signature_delta", "signature": sig}
                    }),
                });
            }
        }

        events
    }

    fn handle_reasoning(&mut self, delta: &OpenAIDelta) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();
        let Some(text) = &delta.reasoning_content else { return events };

        if !self.reasoning_started {
            self.reasoning_started = true;
            let idx = self.open_index();
            self.reasoning_claude_index = Some(idx);
            events.push(AnthropicSseEvent {
                event: "content_block_start",
                data: serde_json::json!({
                    "type": "content_block_start",
                    "index": idx,
                    "content_block": {"type": "thinking", "thinking": "", "signature": null}
                }),
            });
        }

        events.push(AnthropicSseEvent {
            event: "content_block_delta",
            data: serde_json::json!({
                "type": "content_block_delta",
                "index": self.reasoning_claude_index.unwrap(),
                "delta": {"type": "thinking_delta", "thinking": text}
            }),
        });
        events
    }

    fn handle_text(&mut self, text: &str) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();
        if !self.text_started {
            self.text_started = true;
            let idx = self.open_index();
            self.text_claude_index = Some(idx);
            events.push(AnthropicSseEvent {
                event: "content_block_start",
                data: serde_json::json!({
                    "type": "content_block_start",
                    "index": idx,
                    "content_block": {"type": "text", "text": ""}
                }),
            });
        }
        events.push(AnthropicSseEvent {
            event: "content_block_delta",
            data: serde_json::json!({
                "type": "content_block_delta",
                "index": self.text_claude_index.unwrap(),
                "delta": {"type": "text_delta", "text": text}
            }),
        });
        events
    }

    fn handle_tool_call_delta(&mut self, tc: &OpenAIToolCallDelta) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();

        {
            let state = self.tool_calls.entry(tc.index).or_default();
            if let Some(id) = &tc.id {
                state.id = Some(id.clone());
            }
            if let Some(function) = &tc.function {
                if let Some(name) = &function.name {
                    state.name = Some(name.clone());
                }
            }
        }

        let needs_open = {
            let state = &self.tool_calls[&tc.index];
            !state.started && state.id.is_some() && state.name.is_some()
        };

        if needs_open {
            let idx = self.open_index();
            let state = self.tool_calls.get_mut(&tc.index).unwrap();
            state.started = true;
            state.claude_index = Some(idx);
            let id = state.id.clone().unwrap();
            let name = state.name.clone().unwrap();
            events.push(AnthropicSseEvent {
                event: "content_block_start",
                data: serde_json::json!({
                    "type": "content_block_start",
                    "index": idx,
                    "content_block": {"type": "tool_use", "id": id, "name": name, "input": {}}
                }),
            });
        }

        let state = self.tool_calls.get_mut(&tc.index).unwrap();
        if state.started {
            if let Some(function) = &tc.function {
                if let Some(args) = &function.arguments {
                    state.args_buffer.push_str(args);
                    events.push(AnthropicSseEvent {
                        event: "content_block_delta",
                        data: serde_json::json!({
                            "type": "content_block_delta",
                            "index": state.claude_index.unwrap(),
                            "delta": {"type": "input_json_delta", "partial_json": args}
                        }),
                    });
                }
            }
        }

        events
    }

    fn close_reasoning_block(&mut self) -> Vec<AnthropicSseEvent> {
        self.reasoning_stopped = true;
        let idx = self.reasoning_claude_index.unwrap();
        let signature = id_minter::signature(self.upstream_id.as_deref());
        vec![
            AnthropicSseEvent {
                event: "content_block_delta",
                data: serde_json::json!({
                    "type": "content_block_delta",
                    "index": idx,
                    "delta": {"type": "signature_delta", "signature": signature}
                }),
            },
            AnthropicSseEvent {
                event: "content_block_stop",
                data: serde_json::json!({ "type": "content_block_stop", "index": idx }),
            },
        ]
    }

    fn any_thinking_block_open(&self) -> bool {
        self.thinking_blocks.values().any(|b| b.started && !b.stopped)
    }

    fn close_all_thinking_blocks(&mut self) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();
        let mut indices: Vec<i64> = self.thinking_blocks.keys().copied().collect();
        indices.sort_unstable();
        for key in indices {
            let state = self.thinking_blocks.get_mut(&key).unwrap();
            if state.started && !state.stopped {
                state.stopped = true;
                let idx = state.claude_index.unwrap();
                events.push(AnthropicSseEvent {
                    event: "content_block_stop",
                    data: serde_json::json!({ "type": "content_block_stop", "index": idx }),
                });
            }
        }
        events
    }

    fn close_text_block(&mut self) -> AnthropicSseEvent {
        self.text_stopped = true;
        let idx = self.text_claude_index.unwrap();
        AnthropicSseEvent {
            event: "content_block_stop",
            data: serde_json::json!({ "type": "content_block_stop", "index": idx }),
        }
    }

    fn close_tool_call_blocks(&mut self) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();
        let mut entries: Vec<i64> = self.tool_calls.keys().copied().collect();
        entries.sort_unstable_by_key(|k| {
            self.tool_calls[k].claude_index.unwrap_or(i64::MAX)
        });
        for key in entries {
            let state = self.tool_calls.get_mut(&key).unwrap();
            if state.started && !state.stopped {
                state.stopped = true;
                let idx = state.claude_index.unwrap();
                // The final input is reconstructed client-side from the
                // concatenated input_json_delta fragments; parse here only
                // to surface a warning on malformed accumulated JSON.
                if let Err(err) = serde_json::from_str::<serde_json::Value>(&state.args_buffer) {
                    warn!(error = %err, "tool call arguments did not parse as JSON, client falls back to {{_raw}}");
                }
                events.push(AnthropicSseEvent {
                    event: "content_block_stop",
                    data: serde_json::json!({ "type": "content_block_stop", "index": idx }),
                });
            }
        }
        events
    }

    fn finalize(&mut self) -> Vec<AnthropicSseEvent> {
        let mut events = Vec::new();

        if !self.initialized {
            // Upstream closed before a single parseable chunk arrived.
            self.message_id = Some(id_minter::mint(None));
            events.push(self.message_start_event());
        }

        if self.reasoning_started && !self.reasoning_stopped {
            events.extend(self.close_reasoning_block());
        }
        events.extend(self.close_all_thinking_blocks());
        if self.text_started && !self.text_stopped {
            events.push(self.close_text_block());
        }
        events.extend(self.close_tool_call_blocks());

        let stop_reason = StopReason::from_finish_reason(self.last_finish_reason.as_deref());
        events.push(AnthropicSseEvent {
            event: "message_delta",
            data: serde_json::json!({
                "type": "message_delta",
                "delta": {"stop_reason": stop_reason, "stop_sequence": null},
                "usage": {"input_tokens": self.input_tokens, "output_tokens": self.output_tokens}
            }),
        });
        events.push(AnthropicSseEvent {
            event: "message_stop",
            data: serde_json::json!({ "type": "message_stop" }),
        });

        self.done = true;
        events
    }

    fn message_start_event(&self) -> AnthropicSseEvent {
        AnthropicSseEvent {
            event: "message_start",
            data: serde_json::json!({
                "type": "message_start",
                "message": {
                    "id": self.message_id.clone().unwrap_or_default(),
                    "type": "message",
                    "role": "assistant",
                    "model": self.model,
                    "content": [],
                    "stop_reason": null,
                    "usage": {"input_tokens": 0, "output_tokens": 0}
                }
            }),
        }
    }

    fn open_index(&mut self) -> i64 {
        let idx = self.next_index;
        self.next_index += 1;
        idx
    }
}
