//! Push channel frame types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncResult;

/// Frame type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Question,
    Status,
    Error,
    Progress,
    Answer,
    Pause,
    Resume,
    /// Backend recomputed the merge visualization
    VisualizationUpdate,
    /// Backend changed the conflict list
    ConflictUpdate,
    /// Any other session-specific notification
    Custom(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Question => "QUESTION",
            MessageKind::Status => "STATUS",
            MessageKind::Error => "ERROR",
            MessageKind::Progress => "PROGRESS",
            MessageKind::Answer => "ANSWER",
            MessageKind::Pause => "PAUSE",
            MessageKind::Resume => "RESUME",
            MessageKind::VisualizationUpdate => "VISUALIZATION_UPDATE",
            MessageKind::ConflictUpdate => "CONFLICT_UPDATE",
            MessageKind::Custom(tag) => tag,
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "QUESTION" => MessageKind::Question,
            "STATUS" => MessageKind::Status,
            "ERROR" => MessageKind::Error,
            "PROGRESS" => MessageKind::Progress,
            "ANSWER" => MessageKind::Answer,
            "PAUSE" => MessageKind::Pause,
            "RESUME" => MessageKind::Resume,
            "VISUALIZATION_UPDATE" => MessageKind::VisualizationUpdate,
            "CONFLICT_UPDATE" => MessageKind::ConflictUpdate,
            _ => MessageKind::Custom(tag),
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        MessageKind::from(tag.to_string())
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame exchanged over the push channel, in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PushFrame {
    /// Create a frame stamped with the current time
    pub fn new(kind: MessageKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Some(Utc::now()),
        }
    }

    /// Outbound answer to a question
    pub fn answer(question_id: &str, answer: Value) -> SyncResult<Self> {
        let payload = AnswerPayload {
            question_id: question_id.to_string(),
            answer,
            timestamp: Utc::now(),
        };
        Ok(Self::new(MessageKind::Answer, serde_json::to_value(payload)?))
    }

    pub fn pause() -> Self {
        Self::new(MessageKind::Pause, Value::Object(Default::default()))
    }

    pub fn resume() -> Self {
        Self::new(MessageKind::Resume, Value::Object(Default::default()))
    }

    /// Decode the payload into a typed struct
    pub fn payload_as<T: DeserializeOwned>(&self) -> SyncResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// `QUESTION` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// `STATUS` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
}

/// `ERROR` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Outbound `ANSWER` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub question_id: String,
    pub answer: Value,
    pub timestamp: DateTime<Utc>,
}
