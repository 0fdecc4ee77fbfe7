//! Provider HTTP client.
//!
//! An OpenAI-style chat-completions client over `reqwest`, implementing
//! the core's [`LlmClient`] port. Provider URL, credentials, and model id
//! are client state; the core only sees the three port operations.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use tether_rs::llm::{LlmClient, LlmError, LlmFuture, ToolChoice, decode_single_call};
use tether_rs::prelude::{
    BridgeMessage, BridgeTurn, ToolCallBridge, ToolDescriptor, ToolInvocation,
};
use tether_rs::agent::bridge::BridgeCall;

/// Default chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Async HTTP client for the chat completions API.
pub struct HttpLlmClient {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    system_prompt: String,
    /// Tool definitions advertised in bridge mode.
    bridge_tools: Vec<WireTool>,
}

impl HttpLlmClient {
    /// Create a client with the default endpoint.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("tether-code/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            bridge_tools: Vec::new(),
        })
    }

    /// Override the endpoint (self-hosted gateways, tests).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Advertise tool definitions on bridge-mode turns.
    pub fn with_bridge_tools(mut self, descriptors: &[ToolDescriptor]) -> Self {
        self.bridge_tools = descriptors.iter().map(WireTool::from_descriptor).collect();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Switch the model for subsequent calls.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    async fn chat(
        &self,
        prompt: &str,
        tools: &[ToolDescriptor],
        tool_choice: Option<&'static str>,
    ) -> Result<ChatOutput, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(WireTool::from_descriptor).collect())
            },
            tool_choice,
        };

        debug!(
            "LLM request: model={}, prompt={} chars, tools={}",
            self.model,
            prompt.len(),
            tools.len()
        );
        let start = Instant::now();

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to read response: {e}")))?;
        debug!(
            "LLM response: HTTP {status} in {:.1}s ({} bytes)",
            start.elapsed().as_secs_f64(),
            body.len()
        );
        trace!("LLM raw response: {body}");

        if !status.is_success() {
            return Err(LlmError::Provider(format!("HTTP {status}: {body}")));
        }

        let parsed: RawResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::ResponseParse(format!("bad response JSON: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Provider(error.message));
        }
        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or(LlmError::MissingChoices)?;

        let call = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|c| ToolInvocation::new(c.function.name, c.function.arguments));

        Ok(ChatOutput {
            content: choice.message.content,
            call,
        })
    }
}

struct ChatOutput {
    content: Option<String>,
    call: Option<ToolInvocation>,
}

impl LlmClient for HttpLlmClient {
    fn query<'a>(&'a self, prompt: &'a str, _tools: &'a [ToolDescriptor]) -> LlmFuture<'a, String> {
        Box::pin(async move {
            let output = self.chat(prompt, &[], None).await?;
            output
                .content
                .filter(|c| !c.is_empty())
                .ok_or_else(|| LlmError::ResponseParse("empty completion".into()))
        })
    }

    fn infer_tool_call<'a>(
        &'a self,
        prompt: &'a str,
        tools: &'a [ToolDescriptor],
        force: bool,
    ) -> LlmFuture<'a, ToolChoice> {
        Box::pin(async move {
            let choice = if force { Some("required") } else { Some("auto") };
            let output = self.chat(prompt, tools, choice).await?;
            Ok(ToolChoice {
                call: output.call,
                thinking: output.content,
            })
        })
    }

    fn parse_function_call(&self, raw: &str) -> Option<ToolInvocation> {
        decode_single_call(raw)
    }
}

// ── Bridge protocol ─────────────────────────────────────────────────

impl HttpLlmClient {
    async fn bridge_chat(
        &self,
        messages: &[BridgeMessage],
        max_remaining: u32,
    ) -> Result<BridgeTurn, LlmError> {
        let mut wire: Vec<BridgeWireMessage<'_>> = messages
            .iter()
            .map(|m| BridgeWireMessage {
                role: &m.role,
                content: &m.content,
                tool_call_id: m.tool_call_id.as_deref(),
            })
            .collect();
        let remaining_note = format!("You have {max_remaining} turn(s) remaining.");
        wire.push(BridgeWireMessage {
            role: "system",
            content: &remaining_note,
            tool_call_id: None,
        });

        let request = BridgeChatRequest {
            model: &self.model,
            messages: wire,
            tools: if self.bridge_tools.is_empty() {
                None
            } else {
                Some(&self.bridge_tools)
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Provider(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Provider(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(LlmError::Provider(format!("HTTP {status}: {body}")));
        }

        let parsed: RawResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::ResponseParse(format!("bad response JSON: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(LlmError::Provider(error.message));
        }
        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or(LlmError::MissingChoices)?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, c)| BridgeCall {
                id: c.id.unwrap_or_else(|| format!("call-{index}")),
                name: c.function.name,
                args: serde_json::from_str(&c.function.arguments)
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Ok(BridgeTurn {
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            tool_calls,
        })
    }
}

impl ToolCallBridge for HttpLlmClient {
    fn next_turn<'a>(
        &'a self,
        messages: &'a [BridgeMessage],
        max_remaining: u32,
    ) -> LlmFuture<'a, BridgeTurn> {
        Box::pin(async move { self.bridge_chat(messages, max_remaining).await })
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

impl WireTool {
    fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: descriptor.name.to_string(),
                description: descriptor.description.to_string(),
                parameters: descriptor.parameters.clone(),
            },
        }
    }
}

#[derive(Serialize, Debug)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct RawResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<RawError>,
}

#[derive(Serialize, Debug)]
struct BridgeChatRequest<'a> {
    model: &'a str,
    messages: Vec<BridgeWireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Vec<WireTool>>,
}

#[derive(Serialize, Debug)]
struct BridgeWireMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawMessage {
    content: Option<String>,
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Deserialize, Debug)]
struct RawToolCall {
    #[serde(default)]
    id: Option<String>,
    function: RawFunctionCall,
}

#[derive(Deserialize, Debug)]
struct RawFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Debug)]
struct RawError {
    message: String,
}
