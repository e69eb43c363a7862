//! Raw LLM response as consumed by the aggregator.
//!
//! The transport lives outside this crate. We only need the sampled choices;
//! the aggregator reads the first one.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ResponseChoice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: None,
        }
    }
}

impl LlmResponse {
    /// Single-choice response, the common case for one shot.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ResponseChoice::new(text)],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.text.as_str())
    }

    /// Decode a `/v1/chat/completions` body. Choices without textual content
    /// are skipped.
    pub fn from_openai_chat_json(body: &str) -> Result<Self> {
        let out: ChatCompletionResponse = serde_json::from_str(body)?;
        let choices = out
            .choices
            .into_iter()
            .filter_map(|c| {
                c.message.content.map(|text| ResponseChoice {
                    text,
                    finish_reason: c.finish_reason,
                })
            })
            .collect();
        Ok(Self { choices })
    }
}

/// Minimal response for `/v1/chat/completions`.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}
