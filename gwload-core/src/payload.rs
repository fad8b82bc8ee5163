use serde::{Deserialize, Serialize};

use crate::call::CallType;
use crate::prompt::Prompts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of an LLM call. Responses are requested non-streaming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    pub model_id: String,
    pub prompt: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct PayloadOptions {
    pub llm_model: String,
    pub max_tokens: u32,
    pub image_model: String,
    pub width: u32,
    pub height: u32,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            llm_model: "meta-llama/Meta-Llama-3.1-8B-Instruct".to_string(),
            max_tokens: 256,
            image_model: "SG161222/RealVisXL_V4.0_Lightning".to_string(),
            width: 1024,
            height: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Llm(LlmRequest),
    Image(ImageRequest),
}

impl Payload {
    pub fn build(call_type: CallType, prompts: &Prompts, opts: &PayloadOptions) -> Self {
        match call_type {
            CallType::Llm => Self::Llm(LlmRequest {
                model: opts.llm_model.clone(),
                messages: vec![ChatMessage {
                    role: "user".to_string(),
                    content: prompts.llm_prompt.clone(),
                }],
                max_tokens: opts.max_tokens,
                stream: false,
            }),
            CallType::Image => Self::Image(ImageRequest {
                model_id: opts.image_model.clone(),
                prompt: prompts.img_prompt.clone(),
                width: opts.width,
                height: opts.height,
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Llm(req) => serde_json::to_vec(req),
            Self::Image(req) => serde_json::to_vec(req),
        }
    }

    /// Extra request headers for this call type (besides `content-type`).
    pub fn extra_headers(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            // Gateways expect the SSE accept header even for non-streaming calls.
            Self::Llm(_) => &[("accept", "text/event-stream")],
            Self::Image(_) => &[],
        }
    }
}
