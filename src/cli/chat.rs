//! Line-oriented interactive session

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::render::{read_upload, submit_and_render, turn_footer, user_turn_notes};
use crate::cli::say::load_settings;
use crate::core::app::{ConversationController, SessionContext, Submission, SubmitError};
use crate::core::report;

#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    Empty,
    Prompt(String),
    File { path: PathBuf, text: String },
    Action(usize),
    Export(PathBuf),
    Reset,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Prompt(line.to_string());
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "quit" | "exit" => ChatInput::Quit,
        "reset" => ChatInput::Reset,
        "file" if !rest.is_empty() => {
            let (path, text) = rest
                .split_once(char::is_whitespace)
                .map(|(path, text)| (path, text.trim()))
                .unwrap_or((rest, ""));
            ChatInput::File {
                path: PathBuf::from(path),
                text: text.to_string(),
            }
        }
        "action" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => ChatInput::Action(n),
            _ => ChatInput::Invalid("Usage: /action <number>".to_string()),
        },
        "export" if !rest.is_empty() => ChatInput::Export(PathBuf::from(rest)),
        "file" => ChatInput::Invalid("Usage: /file <path> [message]".to_string()),
        "export" => ChatInput::Invalid("Usage: /export <path>".to_string()),
        other => ChatInput::Invalid(format!("Unknown command: /{other}")),
    }
}

fn prompt() -> io::Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "\n> ")?;
    stdout.flush()
}

fn describe_case(controller: &ConversationController) {
    if let Some(case) = controller.case() {
        let stored = case.messages.len();
        if stored == 0 {
            println!("📁 Case: {} ({})", case.name, case.id);
        } else {
            println!("📁 Case: {} ({}), {stored} messages", case.name, case.id);
        }
    }
}

pub async fn run_chat(
    case_id: Option<String>,
    new_case: Option<String>,
    log_file: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let (config, credentials) = load_settings();
    let session = SessionContext::bootstrap(&config, credentials, log_file)?;
    let cases = session.cases.clone();
    let mut controller = ConversationController::new(session);

    if let Some(cases) = &cases {
        match (case_id, new_case) {
            (Some(id), _) => match cases.load_case(&id)? {
                Some(case) => controller.resume_case(case),
                None => {
                    eprintln!("❌ No case with id {id}");
                    std::process::exit(1);
                }
            },
            (None, Some(name)) => {
                controller.start_case(Some(&name))?;
            }
            (None, None) => match cases.current_case() {
                Some(case) => controller.resume_case(case),
                None => {
                    controller.start_case(None)?;
                }
            },
        }
    }

    let mut events = controller.subscribe();
    if let Some(greeting) = controller.transcript().first() {
        println!("{}", greeting.text);
    }
    describe_case(&controller);
    if let Some(path) = controller.session().logging.path() {
        println!("📝 Logging to {}", path.display());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let submission = match parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Invalid(message) => {
                eprintln!("⚠️  {message}");
                continue;
            }
            ChatInput::Reset => {
                controller.reset();
                if cases.is_some() {
                    controller.start_case(None)?;
                }
                println!("{}", controller.transcript()[0].text);
                describe_case(&controller);
                continue;
            }
            ChatInput::Export(path) => {
                match controller.last_reply() {
                    Some(turn) => match report::export_turn(turn, &path) {
                        Ok(format) => {
                            println!("✅ {} report written to {}", format.label(), path.display())
                        }
                        Err(e) => eprintln!("❌ {e}"),
                    },
                    None => eprintln!("⚠️  Nothing to export yet"),
                }
                continue;
            }
            ChatInput::Action(n) => {
                let action = controller
                    .last_reply()
                    .and_then(|turn| turn.actions.as_ref())
                    .and_then(|actions| actions.get(n - 1))
                    .cloned();
                match action {
                    Some(action) => {
                        Submission::text(ConversationController::action_prompt(&action))
                    }
                    None => {
                        eprintln!("⚠️  No suggested action {n}");
                        continue;
                    }
                }
            }
            ChatInput::File { path, text } => match read_upload(&path).await {
                Ok(upload) => Submission::text(text).with_file(upload),
                Err(e) => {
                    eprintln!("❌ Could not read {}: {e}", path.display());
                    continue;
                }
            },
            ChatInput::Prompt(text) => Submission::text(text),
        };

        match submit_and_render(&mut controller, &mut events, submission).await {
            Ok(reply_id) => {
                if let Some(notes) = controller
                    .transcript()
                    .iter()
                    .rev()
                    .find(|turn| turn.is_user())
                    .and_then(user_turn_notes)
                {
                    println!("{notes}");
                }
                if let Some(reply) = controller.turn(reply_id) {
                    let footer = turn_footer(reply);
                    if !footer.is_empty() {
                        println!("\n{footer}");
                    }
                }
            }
            Err(SubmitError::Failed(message)) => eprintln!("\n❌ Error: {message}"),
            Err(e) => eprintln!("⚠️  {e}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_prompts() {
        assert_eq!(parse_input("  hello  "), ChatInput::Prompt("hello".into()));
        assert_eq!(parse_input("   "), ChatInput::Empty);
    }

    #[test]
    fn file_command_with_and_without_text() {
        assert_eq!(
            parse_input("/file scan.png what is this?"),
            ChatInput::File {
                path: PathBuf::from("scan.png"),
                text: "what is this?".into()
            }
        );
        assert_eq!(
            parse_input("/file scan.png"),
            ChatInput::File {
                path: PathBuf::from("scan.png"),
                text: String::new()
            }
        );
        assert!(matches!(parse_input("/file"), ChatInput::Invalid(_)));
    }

    #[test]
    fn action_numbers_start_at_one() {
        assert_eq!(parse_input("/action 2"), ChatInput::Action(2));
        assert!(matches!(parse_input("/action 0"), ChatInput::Invalid(_)));
        assert!(matches!(parse_input("/action two"), ChatInput::Invalid(_)));
    }

    #[test]
    fn control_commands() {
        assert_eq!(parse_input("/quit"), ChatInput::Quit);
        assert_eq!(parse_input("/reset"), ChatInput::Reset);
        assert_eq!(
            parse_input("/export out/report.md"),
            ChatInput::Export(PathBuf::from("out/report.md"))
        );
        assert_eq!(
            parse_input("/bogus"),
            ChatInput::Invalid("Unknown command: /bogus".into())
        );
    }
}
