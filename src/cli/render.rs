//! Plain-text rendering of a conversation on stdout.

use std::io::{self, Write};
use std::path::Path;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::app::{
    ConversationController, FileUpload, Submission, SubmitError, TranscriptEvent,
};
use crate::core::geolocation::format_location;
use crate::core::message::{ConversationTurn, TurnId};
use crate::core::seal::abbreviate_digest;

/// Prints streamed text incrementally, tracking how much of the current
/// turn has already been written.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    current: Option<TurnId>,
    printed: usize,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text not yet printed for this update.
    pub fn pending<'a>(&mut self, id: TurnId, text: &'a str) -> &'a str {
        if self.current != Some(id) {
            self.current = Some(id);
            self.printed = 0;
        }
        let start = if text.is_char_boundary(self.printed) {
            self.printed
        } else {
            0
        };
        self.printed = text.len();
        &text[start..]
    }

    pub fn handle(&mut self, event: TranscriptEvent) -> io::Result<()> {
        let mut stdout = io::stdout();
        match event {
            TranscriptEvent::TurnUpdated { id, text } => {
                let chunk = self.pending(id, &text);
                write!(stdout, "{chunk}")?;
                stdout.flush()?;
            }
            TranscriptEvent::TurnRemoved(id) if self.current == Some(id) => {
                writeln!(stdout)?;
                self.current = None;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Submit and print the reply as it streams.
pub async fn submit_and_render(
    controller: &mut ConversationController,
    events: &mut UnboundedReceiver<TranscriptEvent>,
    submission: Submission,
) -> Result<TurnId, SubmitError> {
    let mut printer = StreamPrinter::new();
    let result = {
        let submit = controller.submit(submission);
        tokio::pin!(submit);
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => {
                    if let Err(e) = printer.handle(event) {
                        tracing::warn!("failed to write to stdout: {e}");
                    }
                }
                result = &mut submit => break result,
            }
        }
    };
    while let Ok(event) = events.try_recv() {
        if let Err(e) = printer.handle(event) {
            tracing::warn!("failed to write to stdout: {e}");
        }
    }
    if result.is_ok() {
        println!();
    }
    result
}

/// Seal, suggested actions and document notice shown under an answer.
pub fn turn_footer(turn: &ConversationTurn) -> String {
    let mut lines = Vec::new();
    if let Some(seal) = &turn.seal {
        lines.push(format!("🔒 Sealed {}", abbreviate_digest(seal)));
    }
    if turn.is_document {
        lines.push("📄 Document ready. Use /export <file.pdf> to save it.".to_string());
    }
    if let Some(actions) = &turn.actions {
        lines.push("Suggested actions:".to_string());
        for (idx, action) in actions.iter().enumerate() {
            lines.push(format!("  {}. {action}", idx + 1));
        }
    }
    lines.join("\n")
}

/// Header line for a user turn: attachment and location, if any.
pub fn user_turn_notes(turn: &ConversationTurn) -> Option<String> {
    let mut notes = Vec::new();
    if let Some(file) = &turn.file {
        let state = if file.seal.sealed {
            "previously sealed"
        } else {
            "sealed"
        };
        notes.push(format!(
            "📎 {} ({state} {})",
            file.name,
            abbreviate_digest(&file.seal.digest)
        ));
    }
    if let Some(location) = &turn.location {
        notes.push(format!("📍 {}", format_location(location)));
    }
    (!notes.is_empty()).then(|| notes.join("\n"))
}

fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("html" | "htm") => "text/html",
        _ => "application/octet-stream",
    }
}

pub async fn read_upload(path: &Path) -> io::Result<FileUpload> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(FileUpload {
        name,
        mime_type: mime_type_for(path).to_string(),
        bytes,
    })
}
