use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CHAT_COMPLETION_OBJECT: &str = "chat.completion";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub finish_reason: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl ChatCompletionResponse {
    pub fn from_content(model: &str, content: String) -> Self {
        Self::from_content_at(Utc::now(), model, content)
    }

    pub fn from_content_at(now: DateTime<Utc>, model: &str, content: String) -> Self {
        Self {
            id: format!("shim-{}", now.format("%H%M%S%3f")),
            object: CHAT_COMPLETION_OBJECT.to_string(),
            created: now.timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                finish_reason: "stop".to_string(),
                message: Message {
                    role: "assistant".to_string(),
                    content,
                },
            }],
        }
    }
}
