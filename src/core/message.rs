use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::geolocation::GeoLocation;
use crate::core::seal::DocumentSeal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TranscriptRole {
    User,
    Model,
}

impl TranscriptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Model => "model",
        }
    }

    /// Role name used by OpenAI-compatible chat APIs.
    pub fn to_api_role(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Model => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == TranscriptRole::User
    }

    pub fn is_model(self) -> bool {
        self == TranscriptRole::Model
    }
}

impl AsRef<str> for TranscriptRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for TranscriptRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(TranscriptRole::User),
            "model" => Ok(TranscriptRole::Model),
            _ => Err(format!("invalid transcript role: {value}")),
        }
    }
}

impl TryFrom<String> for TranscriptRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<TranscriptRole> for String {
    fn from(value: TranscriptRole) -> Self {
        value.as_str().to_string()
    }
}

/// Identifies a turn within one transcript. Assigned in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A file attached to a user turn, with its seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
    pub seal: DocumentSeal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: TranscriptRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<AttachedFile>,
    /// SHA-512 of the completed model text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub is_document: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
    /// Shown in the transcript but never sent upstream.
    #[serde(default)]
    pub local_only: bool,
}

impl ConversationTurn {
    pub fn new(id: TurnId, role: TranscriptRole, text: impl Into<String>) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            file: None,
            seal: None,
            actions: None,
            is_document: false,
            document_body: None,
            timestamp: None,
            location: None,
            local_only: false,
        }
    }

    pub fn user(id: TurnId, text: impl Into<String>) -> Self {
        Self::new(id, TranscriptRole::User, text)
    }

    pub fn model(id: TurnId, text: impl Into<String>) -> Self {
        Self::new(id, TranscriptRole::Model, text)
    }

    pub fn greeting(id: TurnId, text: impl Into<String>) -> Self {
        Self {
            local_only: true,
            ..Self::model(id, text)
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }

    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || self.file.is_some()
    }
}

/// One piece of a provider-agnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/// A provider-agnostic history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: TranscriptRole,
    pub parts: Vec<Part>,
}

impl Content {
    /// Project a transcript turn. Returns `None` for local-only or empty turns.
    pub fn from_turn(turn: &ConversationTurn) -> Option<Self> {
        if turn.local_only {
            return None;
        }

        let mut parts = Vec::new();
        if !turn.text.is_empty() {
            parts.push(Part::Text(turn.text.clone()));
        }
        if let Some(file) = &turn.file {
            parts.push(Part::InlineData {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            });
        }

        (!parts.is_empty()).then(|| Content {
            role: turn.role,
            parts,
        })
    }
}
