//! OpenAI Responses API gateway.
//!
//! Implements [`LmGateway`] against `POST /v1/responses`. Conversation items
//! map onto `message`, `function_call`, `function_call_output`, and
//! `reasoning` input items; reasoning payloads are replayed untouched.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::BoxFuture;

use super::gateway::{GatewayError, LmGateway};
use super::types::*;

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

/// Model used when a request leaves `model` empty.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";

/// OpenAI Responses API gateway.
pub struct OpenAiGateway {
    client: Client,
    api_key: Zeroizing<String>,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OpenAiGateway {
    /// Create a new gateway with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Zeroizing::new(api_key.into()),
            base_url: OPENAI_RESPONSES_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set a custom endpoint (for Responses-compatible services).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Convert our GatewayRequest into the Responses API format.
    fn build_request_body(&self, request: &GatewayRequest) -> ResponsesRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let input = request
            .input
            .iter()
            .map(|item| match item {
                ConversationItem::UserMessage { text } => WireInput::Typed(InputItem::Message {
                    role: "user",
                    content: text.clone(),
                }),
                ConversationItem::AssistantMessage { text } => {
                    WireInput::Typed(InputItem::Message {
                        role: "assistant",
                        content: text.clone(),
                    })
                }
                ConversationItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } => WireInput::Typed(InputItem::FunctionCall {
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                ConversationItem::FunctionResult { call_id, output } => {
                    WireInput::Typed(InputItem::FunctionCallOutput {
                        call_id: call_id.clone(),
                        output: output.clone(),
                    })
                }
                ConversationItem::Reasoning { payload } => WireInput::Raw(payload.clone()),
            })
            .collect();

        let tools: Vec<WireTool> = request
            .tools
            .iter()
            .map(|t| WireTool {
                r#type: "function",
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
                strict: false,
            })
            .collect();

        ResponsesRequest {
            model,
            input,
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }

    /// Parse the Responses API body into our GatewayResponse.
    fn parse_response(&self, resp: ResponsesResponse) -> Result<GatewayResponse, GatewayError> {
        let mut output = Vec::with_capacity(resp.output.len());

        for raw in resp.output {
            let kind = raw
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            match kind.as_str() {
                "message" => {
                    let message: WireMessage = serde_json::from_value(raw)
                        .map_err(|e| GatewayError::Parse(format!("message item: {e}")))?;
                    let parts: Vec<String> = message
                        .content
                        .into_iter()
                        .filter_map(|part| match part {
                            ContentPart::OutputText { text } => Some(text),
                            _ => None,
                        })
                        .collect();
                    if parts.is_empty() {
                        debug!("dropping message item without output text (refusal)");
                        continue;
                    }
                    output.push(OutputItem::Message {
                        text: parts.concat(),
                    });
                }
                "function_call" => {
                    let call: WireFunctionCall = serde_json::from_value(raw)
                        .map_err(|e| GatewayError::Parse(format!("function_call item: {e}")))?;
                    output.push(OutputItem::FunctionCall {
                        call_id: call.call_id,
                        name: call.name,
                        arguments: call.arguments,
                    });
                }
                "reasoning" => output.push(OutputItem::Reasoning { payload: raw }),
                other => debug!(item_type = %other, "ignoring unsupported output item"),
            }
        }

        Ok(GatewayResponse {
            output,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                cached_input_tokens: u.input_tokens_details.map_or(0, |d| d.cached_tokens),
                output_tokens: u.output_tokens,
                reasoning_tokens: u.output_tokens_details.map_or(0, |d| d.reasoning_tokens),
            }),
        })
    }
}

impl LmGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn respond(&self, request: &GatewayRequest) -> BoxFuture<'_, Result<GatewayResponse, GatewayError>> {
        let body = self.build_request_body(request);
        Box::pin(async move {
            debug!(model = %body.model, items = body.input.len(), "OpenAI responses request");

            let resp = self
                .client
                .post(&self.base_url)
                .bearer_auth(self.api_key.as_str())
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        GatewayError::Timeout
                    } else {
                        GatewayError::Network(e.to_string())
                    }
                })?;

            let status = resp.status().as_u16();
            if status == 401 {
                return Err(GatewayError::Auth("invalid API key".to_string()));
            }
            if status == 404 {
                return Err(GatewayError::ModelNotFound(body.model.clone()));
            }
            if status == 429 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                return Err(GatewayError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }
            if !resp.status().is_success() {
                let error_body = resp.text().await.unwrap_or_default();
                return Err(GatewayError::Provider {
                    status,
                    message: error_body,
                });
            }

            let api_resp: ResponsesResponse = resp
                .json()
                .await
                .map_err(|e| GatewayError::Parse(e.to_string()))?;

            self.parse_response(api_resp)
        })
    }
}

// ── Responses API types (private) ───────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: Vec<WireInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireInput {
    Typed(InputItem),
    Raw(serde_json::Value),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputItem {
    Message {
        role: &'static str,
        content: String,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Serialize)]
struct WireTool {
    r#type: &'static str,
    name: String,
    description: String,
    parameters: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<serde_json::Value>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    call_id: String,
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    input_tokens_details: Option<WireInputDetails>,
    #[serde(default)]
    output_tokens: u64,
    output_tokens_details: Option<WireOutputDetails>,
}

#[derive(Debug, Deserialize)]
struct WireInputDetails {
    #[serde(default)]
    cached_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct WireOutputDetails {
    #[serde(default)]
    reasoning_tokens: u64,
}
