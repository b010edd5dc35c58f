//! Sealed report export.
//!
//! A model turn is written out as an A4 PDF whose every page carries a
//! footer with the watermark, the turn's seal and a QR code of the full
//! digest. Paths ending in `.md` get the same report as Markdown.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use printpdf::{
    BuiltinFont, Color, Greyscale, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect,
};
use qrcode::QrCode;
use tempfile::NamedTempFile;

use crate::core::constants::REPORT_WATERMARK;
use crate::core::hashing;
use crate::core::message::{ConversationTurn, TurnId};
use crate::core::seal::abbreviate_digest;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const QR_SIZE: f32 = 30.0;
const BODY_TOP: f32 = PAGE_HEIGHT - 20.0;
const BODY_BOTTOM: f32 = MARGIN + QR_SIZE + 10.0;
const LINE_HEIGHT: f32 = 5.0;
const BODY_FONT_SIZE: f32 = 10.0;
const HEADING_FONT_SIZE: f32 = 12.0;
const FOOTER_FONT_SIZE: f32 = 7.0;
const WRAP_COLUMNS: usize = 95;
const DIGEST_LINE_CHARS: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("turn {0} has no content to export")]
    Empty(TurnId),
    #[error("failed to encode seal QR code: {0}")]
    Qr(String),
    #[error("failed to render PDF: {0}")]
    Pdf(String),
    #[error("failed to write report to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Pdf,
    Markdown,
}

impl ReportFormat {
    /// Markdown for `.md`/`.markdown` paths, PDF for everything else.
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("md" | "markdown") => ReportFormat::Markdown,
            _ => ReportFormat::Pdf,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "PDF",
            ReportFormat::Markdown => "Markdown",
        }
    }
}

/// Render `body` followed by the sealed footer.
pub fn render_report(body: &str, digest: &str, generated_at: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(body.len() + 512);
    out.push_str(body.trim_end());
    out.push_str("\n\n---\n\n");
    out.push_str(&format!("*{REPORT_WATERMARK}*\n\n"));
    out.push_str(&format!("- Seal: `{}`\n", abbreviate_digest(digest)));
    out.push_str(&format!("- SHA-512: `{digest}`\n"));
    out.push_str(&format!(
        "- Generated: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out
}

/// Dark/light modules of the QR code encoding a digest, row by row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealQr {
    pub width: usize,
    pub dark: Vec<bool>,
}

impl SealQr {
    fn is_dark(&self, x: usize, y: usize) -> bool {
        self.dark.get(y * self.width + x).copied().unwrap_or(false)
    }
}

pub fn seal_qr(digest: &str) -> Result<SealQr, ReportError> {
    let code = QrCode::new(digest.as_bytes()).map_err(|e| ReportError::Qr(e.to_string()))?;
    let dark = code
        .to_colors()
        .into_iter()
        .map(|color| color == qrcode::Color::Dark)
        .collect();
    Ok(SealQr {
        width: code.width(),
        dark,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PdfLine {
    text: String,
    heading: bool,
}

/// Word-wrap one line to `columns` characters. Words longer than a line
/// are split.
fn wrap_line(line: &str, columns: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let mut word = word;
        while word.chars().count() > columns {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(columns)
                .map_or(word.len(), |(idx, _)| idx);
            out.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word.chars().count() > columns {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

/// The built-in PDF fonts only cover Latin-1.
fn pdf_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            '•' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            c if (c as u32) < 0x100 && !c.is_control() => c,
            _ => '?',
        })
        .collect()
}

fn layout_body(body: &str) -> Vec<PdfLine> {
    let mut lines = Vec::new();
    for raw in body.trim_end().lines() {
        let trimmed = raw.trim_start();
        let (text, heading) = match trimmed.strip_prefix('#') {
            Some(_) => (trimmed.trim_start_matches('#').trim(), true),
            None => (raw, false),
        };
        let columns = if heading { WRAP_COLUMNS * 5 / 6 } else { WRAP_COLUMNS };
        for wrapped in wrap_line(&pdf_text(text), columns) {
            lines.push(PdfLine {
                text: wrapped,
                heading,
            });
        }
    }
    lines
}

fn footer_lines(digest: &str, generated_at: DateTime<Utc>) -> Vec<(f32, String)> {
    let mut lines = vec![(
        MARGIN + 21.0,
        format!("Generated {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
    )];
    let mut y = MARGIN + 16.0;
    let chunks: Vec<String> = if digest.is_ascii() {
        digest
            .as_bytes()
            .chunks(DIGEST_LINE_CHARS)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    } else {
        vec![digest.to_string()]
    };
    for (idx, chunk) in chunks.into_iter().enumerate() {
        let label = if idx == 0 { "SHA-512 " } else { "" };
        lines.push((y, format!("{label}{chunk}")));
        y -= 3.5;
    }
    lines.push((
        MARGIN - 5.0,
        format!("{REPORT_WATERMARK} | {}", abbreviate_digest(digest)),
    ));
    lines
}

fn draw_qr(layer: &PdfLayerReference, qr: &SealQr) {
    let module = QR_SIZE / (qr.width + 2) as f32;
    let left = PAGE_WIDTH - MARGIN - QR_SIZE + module;
    let top = MARGIN + QR_SIZE - module;
    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.0, None)));
    for y in 0..qr.width {
        for x in 0..qr.width {
            if !qr.is_dark(x, y) {
                continue;
            }
            let x0 = left + x as f32 * module;
            let y0 = top - (y + 1) as f32 * module;
            layer.add_rect(Rect::new(Mm(x0), Mm(y0), Mm(x0 + module), Mm(y0 + module)));
        }
    }
}

fn draw_footer(
    layer: &PdfLayerReference,
    footer: &[(f32, String)],
    qr: &SealQr,
    font: &IndirectFontRef,
) {
    draw_qr(layer, qr);
    layer.set_fill_color(Color::Greyscale(Greyscale::new(0.45, None)));
    for (y, text) in footer {
        layer.use_text(text.as_str(), FOOTER_FONT_SIZE, Mm(MARGIN), Mm(*y), font);
    }
}

fn pdf_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Pdf(e.to_string())
}

/// Render `body` as an A4 PDF. Each page ends with the sealed footer.
pub fn render_pdf(
    body: &str,
    digest: &str,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let qr = seal_qr(digest)?;
    let footer = footer_lines(digest, generated_at);

    let (doc, page, layer) =
        PdfDocument::new(REPORT_WATERMARK, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Report");
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = BODY_TOP;
    for line in layout_body(body) {
        if y < BODY_BOTTOM {
            draw_footer(&current, &footer, &qr, &regular);
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Report");
            current = doc.get_page(page).get_layer(layer);
            y = BODY_TOP;
        }
        if !line.text.is_empty() {
            let (font, size) = if line.heading {
                (&bold, HEADING_FONT_SIZE)
            } else {
                (&regular, BODY_FONT_SIZE)
            };
            current.use_text(line.text, size, Mm(MARGIN), Mm(y), font);
        }
        y -= LINE_HEIGHT;
    }
    draw_footer(&current, &footer, &qr, &regular);

    doc.save_to_bytes().map_err(pdf_err)
}

/// The text a turn exports: its document body when it has one, otherwise
/// the whole reply.
pub fn exportable_body(turn: &ConversationTurn) -> Option<&str> {
    let body = match (&turn.document_body, turn.is_document) {
        (Some(body), true) => body.as_str(),
        _ => turn.text.as_str(),
    };
    (!body.trim().is_empty()).then_some(body)
}

pub fn render_turn(
    turn: &ConversationTurn,
    format: ReportFormat,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let body = exportable_body(turn).ok_or(ReportError::Empty(turn.id))?;
    let digest = match &turn.seal {
        Some(digest) => digest.clone(),
        None => hashing::digest_str(&turn.text),
    };
    match format {
        ReportFormat::Markdown => Ok(render_report(body, &digest, generated_at).into_bytes()),
        ReportFormat::Pdf => render_pdf(body, &digest, generated_at),
    }
}

pub fn write_report(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let write_err = |source: std::io::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(write_err)?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new_in("."),
    }
    .map_err(write_err)?;
    temp_file.write_all(contents).map_err(write_err)?;
    temp_file.as_file_mut().sync_all().map_err(write_err)?;
    temp_file.persist(path).map_err(|err| write_err(err.error))?;

    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

/// Write `turn` to `path`, as Markdown or PDF depending on the extension.
pub fn export_turn(turn: &ConversationTurn, path: &Path) -> Result<ReportFormat, ReportError> {
    let format = ReportFormat::for_path(path);
    let contents = render_turn(turn, format, Utc::now())?;
    write_report(path, &contents)?;
    Ok(format)
}
