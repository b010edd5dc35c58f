//! Optional plain-text transcript log.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::message::ConversationTurn;
use crate::core::seal::abbreviate_digest;

#[derive(Debug, Default)]
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
}

impl TranscriptLog {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open a log at `path`, failing early if the file cannot be written.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            file_path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn log_turn(&self, turn: &ConversationTurn) -> io::Result<()> {
        let speaker = if turn.is_user() { "You" } else { "Verum Omnis" };
        let mut entry = format!("{speaker}: {}", turn.text);
        if let Some(file) = &turn.file {
            entry.push_str(&format!(
                "\n[attached {} sealed {}]",
                file.name,
                abbreviate_digest(&file.seal.digest)
            ));
        }
        if let Some(seal) = &turn.seal {
            entry.push_str(&format!("\n[seal {}]", abbreviate_digest(seal)));
        }
        self.log_message(&entry)
    }

    pub fn log_message(&self, content: &str) -> io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between entries
        writeln!(writer)?;
        writer.flush()
    }
}
