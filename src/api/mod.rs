//! Wire types for OpenAI-compatible chat completion endpoints.

use serde::{Deserialize, Serialize};

use crate::core::message::{Content, Part};
use crate::utils::url::data_url;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// A lone text part is sent as a plain string; anything else as a part list.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: Option<ChatResponseDelta>,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
            .filter(|content| !content.is_empty())
    }
}

#[derive(Deserialize)]
pub struct ApiErrorBody {
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ApiErrorResponse {
    pub error: Option<ApiErrorBody>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn from_content(content: &Content) -> Self {
        let parts: Vec<ContentPart> = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => ContentPart::Text { text: text.clone() },
                Part::InlineData { mime_type, data } => ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_url(mime_type, data),
                    },
                },
            })
            .collect();

        let content_value = match <[ContentPart; 1]>::try_from(parts) {
            Ok([ContentPart::Text { text }]) => MessageContent::Text(text),
            Ok([other]) => MessageContent::Parts(vec![other]),
            Err(parts) => MessageContent::Parts(parts),
        };

        Self {
            role: content.role.to_api_role().to_string(),
            content: content_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::TranscriptRole;
    use serde_json::json;

    #[test]
    fn single_text_part_serializes_as_string() {
        let message = ChatMessage::from_content(&Content {
            role: TranscriptRole::Model,
            parts: vec![Part::Text("Hello".into())],
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"role": "assistant", "content": "Hello"})
        );
    }

    #[test]
    fn inline_data_becomes_data_url_part() {
        let message = ChatMessage::from_content(&Content {
            role: TranscriptRole::User,
            parts: vec![
                Part::Text("Check".into()),
                Part::InlineData {
                    mime_type: "image/png".into(),
                    data: "AAAA".into(),
                },
            ],
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "Check"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
                ]
            })
        );
    }

    #[test]
    fn response_without_content_yields_none() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert!(response.first_content().is_none());
        let response: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(response.first_content().is_none());
    }
}
