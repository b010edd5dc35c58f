//! Conversation state and the turn lifecycle.

use base64::Engine;

use crate::core::message::{AttachedFile, ConversationTurn, TurnId};
use crate::core::seal;

pub mod conversation;
pub mod errors;
pub mod session;

pub use conversation::ConversationController;
pub use errors::classify_error;
pub use session::SessionContext;

/// Where the controller is in the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Enriching,
    Failed,
}

impl TurnPhase {
    pub fn is_busy(self) -> bool {
        self != TurnPhase::Idle
    }
}

/// Transcript changes, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    TurnAdded(ConversationTurn),
    /// Full accumulated text of a streaming turn.
    TurnUpdated { id: TurnId, text: String },
    TurnEnriched(ConversationTurn),
    TurnRemoved(TurnId),
    PhaseChanged(TurnPhase),
    Error(String),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("nothing to send")]
    Empty,
    /// The turn failed and was rolled back. Carries the user-facing message.
    #[error("{0}")]
    Failed(String),
}

/// A raw file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    /// Encode and seal the file for transmission.
    pub fn into_attachment(self) -> AttachedFile {
        let data = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        let sealed = seal::seal(&self.name, &self.mime_type, &data, self.bytes.len() as u64);
        AttachedFile {
            name: sealed.name,
            mime_type: sealed.mime_type,
            data: sealed.data,
            seal: sealed.seal,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub file: Option<FileUpload>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.file = Some(file);
        self
    }
}
