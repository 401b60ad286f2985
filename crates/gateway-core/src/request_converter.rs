// Anthropic-shape request -> OpenAI-shape request.

use crate::models::*;
use crate::sanitizer;

/// Converts a full AnthropicRequest into the OpenAI-shape request sent
/// upstream. `model` is the target model name the upstream expects; the
/// gateway passes through the client's own model field unless told
/// otherwise, but the converter takes it explicitly so callers can remap.
pub fn convert_request(req: &AnthropicRequest, model: &str) -> OpenAIRequest {
    let mut messages = Vec::new();

    if let Some(system) = &req.system {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(OpenAIContent::Text(system.clone())),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for turn in &req.messages {
        match turn.role {
            AnthropicRole::User => convert_user_turn(turn, &mut messages),
            AnthropicRole::Assistant => convert_assistant_turn(turn, &mut messages),
        }
    }

    OpenAIRequest {
        model: model.to_string(),
        messages,
        max_tokens: req.max_tokens,
        temperature: req.temperature,
        top_p: req.top_p,
        stop: req.stop_sequences.clone(),
        stream: req.stream,
        stream_options: req.stream.then_some(StreamOptions { include_usage: true }),
        tools: req.tools.as_ref().map(|tools| tools.iter().map(convert_tool).collect()),
        tool_choice: req.tool_choice.as_ref().map(convert_tool_choice),
        thinking: req.thinking.clone(),
    }
}

fn convert_user_turn(turn: &AnthropicMessage, out: &mut Vec<OpenAIMessage>) {
    let blocks = match &turn.content {
        AnthropicMessageContent::Text(text) => {
            out.push(OpenAIMessage {
                role: "user".to_string(),
                content: Some(OpenAIContent::Text(text.clone())),
                tool_calls: None,
                tool_call_id: None,
            });
            return;
        }
        AnthropicMessageContent::Blocks(blocks) => blocks,
    };

    let mut parts = Vec::new();
    for block in blocks {
        match block {
            AnthropicContentBlock::ToolResult { tool_use_id, content } => {
                out.push(OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(OpenAIContent::Text(content.clone().into_string())),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id.clone()),
                });
            }
            AnthropicContentBlock::Text { text } => {
                parts.push(OpenAIContentPart::Text { text: text.clone() });
            }
            AnthropicContentBlock::Image { source } => {
                parts.push(OpenAIContentPart::ImageUrl {
                    image_url: OpenAIImageUrl {
                        url: format!("data:{};base64,{}", source.media_type, source.data),
                    },
                });
            }
            // A user turn does not carry thinking/tool_use blocks in practice;
            // pass them through as text rather than silently dropping them.
            AnthropicContentBlock::Thinking { thinking, .. } => {
                parts.push(OpenAIContentPart::Text { text: thinking.clone() });
            }
            AnthropicContentBlock::ToolUse { .. } => {}
        }
    }

    if !parts.is_empty() {
        out.push(OpenAIMessage {
            role: "user".to_string(),
            content: Some(OpenAIContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
        });
    }
}

fn convert_assistant_turn(turn: &AnthropicMessage, out: &mut Vec<OpenAIMessage>) {
    let blocks = match &turn.content {
        AnthropicMessageContent::Text(text) => {
            out.push(OpenAIMessage {
                role: "assistant".to_string(),
                content: Some(OpenAIContent::Text(text.clone())),
                tool_calls: None,
                tool_call_id: None,
            });
            return;
        }
        AnthropicMessageContent::Blocks(blocks) => blocks,
    };

    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block {
            AnthropicContentBlock::Text { text } => {
                parts.push(OpenAIContentPart::Text { text: text.clone() });
            }
            AnthropicContentBlock::Thinking { thinking, signature } => {
                parts.push(OpenAIContentPart::Thinking {
                    thinking: thinking.clone(),
                    signature: signature.clone(),
                });
            }
            AnthropicContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(OpenAIToolCall {
                    id: id.clone(),
                    type_: "function".to_string(),
                    function: OpenAIFunctionCall {
                        name: name.clone(),
                        arguments: input.to_string(),
                    },
                });
            }
            AnthropicContentBlock::Image { .. } | AnthropicContentBlock::ToolResult { .. } => {}
        }
    }

    let content = match parts.len() {
        0 => Some(OpenAIContent::Text(String::new())),
        1 => match &parts[0] {
            OpenAIContentPart::Text { text } => Some(OpenAIContent::Text(text.clone())),
            _ => Some(OpenAIContent::Parts(parts)),
        },
        _ => Some(OpenAIContent::Parts(parts)),
    };

    out.push(OpenAIMessage {
        role: "assistant".to_string(),
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });
}

fn convert_tool(tool: &AnthropicTool) -> OpenAITool {
    OpenAITool {
        type_: "function".to_string(),
        function: OpenAIFunctionDef {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: sanitizer::sanitize(&tool.input_schema),
        },
    }
}

fn convert_tool_choice(choice: &AnthropicToolChoice) -> serde_json::Value {
    match choice {
        AnthropicToolChoice::Auto | AnthropicToolChoice::Any => serde_json::json!("auto"),
        AnthropicToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": {"name": name},
        }),
    }
}
