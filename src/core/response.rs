//! Post-completion parsing of model output.
//!
//! Both passes are heuristics over free text. They only ever run on the
//! finished response and never fail: text that does not match simply yields
//! no actions and no document.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::hashing;

pub const DOCUMENT_START: &str = "[START OF DOCUMENT]";
pub const DOCUMENT_END: &str = "[END OF DOCUMENT]";
pub const MAX_ACTIONS: usize = 3;

static ACTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*\s+\*\*Step\s[A-Z]:\*\*\s*(.+)").expect("action pattern is valid")
});
static TRAILING_IMMEDIATELY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)immediately\.$").expect("pattern is valid"));
static TRAILING_COMPLAINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)complaint\.$").expect("pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentExtraction {
    pub is_document: bool,
    pub body: Option<String>,
}

/// Everything attached to a model turn once its stream has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnrichment {
    pub seal: String,
    pub actions: Vec<String>,
    pub document: DocumentExtraction,
}

/// Collect up to three `* **Step X:** ...` suggestions, in order of appearance.
pub fn parse_actions(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| ACTION_LINE.captures(line))
        .map(|captures| clean_action(captures[1].trim()))
        .take(MAX_ACTIONS)
        .collect()
}

fn clean_action(action: &str) -> String {
    let lower = action.to_lowercase();
    let mut cleaned = action.to_string();
    if lower.starts_with("submit the") {
        cleaned = TRAILING_IMMEDIATELY
            .replace(&cleaned, "")
            .trim()
            .to_string();
    }
    if lower.starts_with("file the") {
        cleaned = TRAILING_COMPLAINT
            .replace(&cleaned, "Complaint")
            .trim()
            .to_string();
    }
    cleaned
}

/// Drop empty actions and ones that look like truncated structured output.
pub fn filter_valid_actions(actions: Vec<String>) -> Vec<String> {
    actions
        .into_iter()
        .filter(|action| !action.trim().is_empty())
        .filter(|action| balanced(action, '{', '}') && balanced(action, '[', ']'))
        .collect()
}

fn balanced(text: &str, open: char, close: char) -> bool {
    let mut depth: usize = 0;
    for c in text.chars() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
        }
    }
    depth == 0
}

pub fn extract_document(text: &str) -> DocumentExtraction {
    let (Some(start), Some(end)) = (text.find(DOCUMENT_START), text.rfind(DOCUMENT_END)) else {
        return DocumentExtraction::default();
    };

    let body_start = start + DOCUMENT_START.len();
    let body = if end >= body_start {
        text[body_start..end].trim().to_string()
    } else {
        String::new()
    };

    DocumentExtraction {
        is_document: true,
        body: Some(body),
    }
}

/// Seal the full response and run both extraction passes.
pub fn enrich(text: &str) -> ResponseEnrichment {
    ResponseEnrichment {
        seal: hashing::digest_str(text),
        actions: filter_valid_actions(parse_actions(text)),
        document: extract_document(text),
    }
}
