// OpenAI-shape non-streaming response -> Anthropic-shape message.

use crate::id_minter;
use crate::models::*;
use tracing::warn;

/// Maps a complete upstream JSON response to the client-facing message.
/// `model` is the name echoed back to the client (the client's own
/// requested model, not necessarily the upstream's).
pub fn convert_response(resp: &OpenAIResponse, model: &str) -> AnthropicResponse {
    let choice = resp.choices.first();
    let message = choice.map(|c| &c.message);

    let mut content = Vec::new();

    // Thinking blocks first: thinking_blocks[] wins over reasoning_content.
    if let Some(message) = message {
        if let Some(blocks) = message.thinking_blocks.as_ref().filter(|b| !b.is_empty()) {
            for block in blocks {
                content.push(AnthropicContentBlock::Thinking {
                    thinking: block.thinking.clone().unwrap_or_default(),
                    signature: block.signature.clone(),
                });
            }
        } else if let Some(reasoning) = message.reasoning_content.as_ref().filter(|r| !r.is_empty()) {
            content.push(AnthropicContentBlock::Thinking {
                thinking: reasoning.clone(),
                signature: Some(id_minter::signature(Some(&resp.id))),
            });
        }
    }

    if let Some(text) = message.and_then(|m| m.content.as_ref()).filter(|t| !t.is_empty()) {
        content.push(AnthropicContentBlock::Text { text: text.clone() });
    }

    if let Some(tool_calls) = message.and_then(|m| m.tool_calls.as_ref()) {
        for call in tool_calls {
            let input = match serde_json::from_str::<serde_json::Value>(&call.function.arguments) {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, "failed to parse tool call arguments, falling back to raw string");
                    serde_json::json!({ "_raw": call.function.arguments })
                }
            };
            content.push(AnthropicContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input,
            });
        }
    }

    let stop_reason = StopReason::from_finish_reason(choice.and_then(|c| c.finish_reason.as_deref()));

    let usage = resp
        .usage
        .map(|u| AnthropicUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or(AnthropicUsage { input_tokens: 0, output_tokens: 0 });

    AnthropicResponse {
        id: id_minter::mint(Some(&resp.id)),
        type_: "message".to_string(),
        role: "assistant".to_string(),
        model: model.to_string(),
        content,
        stop_reason,
        stop_sequence: None,
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_stream_text_only() {
        let resp = OpenAIResponse {
            id: "chatcmpl-abc".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: Some("Hi".to_string()),
                    reasoning_content: None,
                    thinking_blocks: None,
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: Some(OpenAIUsage { prompt_tokens: 3, completion_tokens: 1 }),
        };
        let out = convert_response(&resp, "claude-3");
        assert_eq!(out.id, "msg_abc");
        assert_eq!(out.stop_reason, StopReason::EndTurn);
        assert_eq!(out.usage.input_tokens, 3);
        assert_eq!(out.usage.output_tokens, 1);
        assert_eq!(out.content.len(), 1);
        match &out.content[0] {
            AnthropicContentBlock::Text { text } => assert_eq!(text, "Hi"),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn non_stream_tool_call() {
        let resp = OpenAIResponse {
            id: "chatcmpl-def".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: None,
                    reasoning_content: None,
                    thinking_blocks: None,
                    tool_calls: Some(vec![OpenAIToolCall {
                        id: "call_1".to_string(),
                        type_: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: "lookup".to_string(),
                            arguments: r#"{"q":"x"}"#.to_string(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        assert_eq!(out.stop_reason, StopReason::ToolUse);
        match &out.content[0] {
            AnthropicContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "lookup");
                assert_eq!(input, &json!({"q": "x"}));
            }
            other => panic!("expected tool_use block, got {other:?}"),
        }
    }

    #[test]
    fn malformed_tool_arguments_fall_back_to_raw() {
        let resp = OpenAIResponse {
            id: "chatcmpl-ghi".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: None,
                    reasoning_content: None,
                    thinking_blocks: None,
                    tool_calls: Some(vec![OpenAIToolCall {
                        id: "call_1".to_string(),
                        type_: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: "lookup".to_string(),
                            arguments: "not json".to_string(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        match &out.content[0] {
            AnthropicContentBlock::ToolUse { input, .. } => {
                assert_eq!(input, &json!({"_raw": "not json"}));
            }
            other => panic!("expected tool_use block, got {other:?}"),
        }
    }

    #[test]
    fn thinking_blocks_take_precedence_over_reasoning_content() {
        let resp = OpenAIResponse {
            id: "chatcmpl-jkl".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: Some("final answer".to_string()),
                    reasoning_content: Some("should not appear".to_string()),
                    thinking_blocks: Some(vec![OpenAIThinkingBlock {
                        thinking: Some("structured reasoning".to_string()),
                        signature: Some("sig-1".to_string()),
                    }]),
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        assert_eq!(out.content.len(), 2);
        match &out.content[0] {
            AnthropicContentBlock::Thinking { thinking, signature } => {
                assert_eq!(thinking, "structured reasoning");
                assert_eq!(signature.as_deref(), Some("sig-1"));
            }
            other => panic!("expected thinking block, got {other:?}"),
        }
    }

    #[test]
    fn reasoning_content_falls_back_to_synthetic_thinking_block() {
        let resp = OpenAIResponse {
            id: "chatcmpl-mno".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: Some("final".to_string()),
                    reasoning_content: Some("why".to_string()),
                    thinking_blocks: None,
                    tool_calls: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        match &out.content[0] {
            AnthropicContentBlock::Thinking { thinking, signature } => {
                assert_eq!(thinking, "why");
                assert_eq!(signature.as_deref(), Some("mno"));
            }
            other => panic!("expected thinking block, got {other:?}"),
        }
    }

    #[test]
    fn unknown_finish_reason_defaults_to_end_turn() {
        let resp = OpenAIResponse {
            id: "chatcmpl-pqr".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: Some("hi".to_string()),
                    reasoning_content: None,
                    thinking_blocks: None,
                    tool_calls: None,
                },
                finish_reason: Some("content_filter".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        assert_eq!(out.stop_reason, StopReason::EndTurn);
    }

    #[test]
    fn block_order_is_thinking_then_text_then_tool_use() {
        let resp = OpenAIResponse {
            id: "chatcmpl-stu".to_string(),
            choices: vec![OpenAIChoice {
                message: OpenAIResponseMessage {
                    content: Some("text".to_string()),
                    reasoning_content: Some("thinking".to_string()),
                    thinking_blocks: None,
                    tool_calls: Some(vec![OpenAIToolCall {
                        id: "call_1".to_string(),
                        type_: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: "f".to_string(),
                            arguments: "{}".to_string(),
                        },
                    }]),
                },
                finish_reason: Some("tool_calls".to_string()),
            }],
            usage: None,
        };
        let out = convert_response(&resp, "claude-3");
        assert!(matches!(out.content[0], AnthropicContentBlock::Thinking { .. }));
        assert!(matches!(out.content[1], AnthropicContentBlock::Text { .. }));
        assert!(matches!(out.content[2], AnthropicContentBlock::ToolUse { .. }));
    }
}
