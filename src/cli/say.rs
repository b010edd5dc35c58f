//! One-shot "say" command

use std::error::Error;
use std::path::PathBuf;

use crate::cli::render::{read_upload, submit_and_render, turn_footer, user_turn_notes};
use crate::core::app::{ConversationController, SessionContext, Submission};
use crate::core::config::{Config, Credentials};

/// Load config and credentials, exiting with a message if either is unusable.
pub(crate) fn load_settings() -> (Config, Credentials) {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };
    match Credentials::from_env(&config) {
        Ok(credentials) => (config, credentials),
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    }
}

pub async fn run_say(
    prompt: Vec<String>,
    file: Option<PathBuf>,
    log_file: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() && file.is_none() {
        eprintln!("Usage: verum say [--file <path>] <prompt>");
        std::process::exit(1);
    }

    let (config, credentials) = load_settings();
    let mut session = SessionContext::bootstrap(&config, credentials, log_file)?;
    session.cases = None;

    let mut submission = Submission::text(prompt);
    if let Some(path) = file {
        match read_upload(&path).await {
            Ok(upload) => submission = submission.with_file(upload),
            Err(e) => {
                eprintln!("❌ Could not read {}: {e}", path.display());
                std::process::exit(1);
            }
        }
    }

    let mut controller = ConversationController::new(session);
    let mut events = controller.subscribe();

    match submit_and_render(&mut controller, &mut events, submission).await {
        Ok(reply_id) => {
            if let Some(notes) = controller.transcript().iter().find_map(|turn| {
                turn.is_user().then(|| user_turn_notes(turn)).flatten()
            }) {
                eprintln!("{notes}");
            }
            if let Some(reply) = controller.turn(reply_id) {
                let footer = turn_footer(reply);
                if !footer.is_empty() {
                    println!("\n{footer}");
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("\n❌ Error: {e}");
            std::process::exit(1);
        }
    }
}
