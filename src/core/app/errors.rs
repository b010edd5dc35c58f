use tracing::error;

use crate::core::chat_stream::StreamError;

const LEAKED_KEY: &str = "Your API key was reported as leaked";
const INVALID_KEY: &str = "API key not valid";
const PERMISSION_DENIED: &str = "PERMISSION_DENIED";

/// Turn a raw provider or transport message into the text shown to the user.
pub fn classify_error(message: &str) -> String {
    if message.contains(LEAKED_KEY) {
        return "Your API key was reported as leaked. Please use another API key.".to_string();
    }
    if message.contains(INVALID_KEY) {
        return "Your API key is not valid. Please check it and try again.".to_string();
    }
    if message.contains(PERMISSION_DENIED) {
        return "Permission denied. Please check your API key and ensure it has the necessary permissions."
            .to_string();
    }

    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "An error occurred. Please try again.".to_string();
    }
    if trimmed.starts_with('{') {
        error!("provider error: {trimmed}");
        return "An unexpected error occurred. More details are in the log.".to_string();
    }
    trimmed.to_string()
}

pub fn user_message(err: &StreamError) -> String {
    classify_error(&err.to_string())
}
