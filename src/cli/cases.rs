//! Case management and report export from the command line

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;

use crate::core::cases::{CaseRecord, CaseService, FileStore};
use crate::core::config::Config;
use crate::core::message::{ConversationTurn, TurnId};
use crate::core::report;

#[derive(Subcommand, Debug)]
pub enum CasesCommand {
    /// List saved cases, most recently updated first
    List,
    /// Create a case and make it current
    New { name: Option<String> },
    /// Print a case transcript
    Show { id: String },
    /// Delete a case
    Delete { id: String },
}

fn case_service() -> Result<CaseService, Box<dyn Error>> {
    let config = Config::load()?;
    let data_dir = config.resolve_data_dir()?;
    Ok(CaseService::new(Arc::new(FileStore::new(data_dir))))
}

fn find_case(service: &CaseService, id: &str) -> CaseRecord {
    match service.all_cases().into_iter().find(|case| case.id == id) {
        Some(case) => case,
        None => {
            eprintln!("❌ No case with id {id}");
            std::process::exit(1);
        }
    }
}

pub fn run_cases(command: CasesCommand) -> Result<(), Box<dyn Error>> {
    let service = case_service()?;
    match command {
        CasesCommand::List => {
            let current = service.current_case().map(|case| case.id);
            let mut cases = service.all_cases();
            if cases.is_empty() {
                println!("No saved cases.");
                return Ok(());
            }
            cases.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            for case in cases {
                let marker = if current.as_deref() == Some(case.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}  {}  {} messages  updated {}",
                    case.id,
                    case.name,
                    case.messages.len(),
                    case.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        CasesCommand::New { name } => {
            let case = service.create_case(name.as_deref())?;
            println!("✅ Created {} ({})", case.name, case.id);
        }
        CasesCommand::Show { id } => {
            let case = find_case(&service, &id);
            println!("{} ({})", case.name, case.id);
            println!("Started {}", case.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            for turn in &case.messages {
                let speaker = if turn.is_user() { "You" } else { "Verum Omnis" };
                println!("\n[{}] {speaker}:", turn.id.0);
                println!("{}", turn.text);
                if let Some(file) = &turn.file {
                    println!("📎 {} ({})", file.name, file.seal.digest);
                }
                if let Some(seal) = &turn.seal {
                    println!("🔒 {seal}");
                }
            }
        }
        CasesCommand::Delete { id } => {
            if service.delete_case(&id)? {
                println!("✅ Deleted {id}");
            } else {
                eprintln!("❌ No case with id {id}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

/// Pick the turn to export: the requested one, else the latest document,
/// else the latest answer.
pub fn select_export_turn(case: &CaseRecord, turn: Option<u64>) -> Option<&ConversationTurn> {
    if let Some(n) = turn {
        return case.messages.iter().find(|t| t.id == TurnId(n));
    }
    let answers = || case.messages.iter().rev().filter(|t| t.is_model() && t.has_content());
    answers()
        .find(|t| t.is_document)
        .or_else(|| answers().next())
}

pub fn run_export(case_id: &str, out: &Path, turn: Option<u64>) -> Result<(), Box<dyn Error>> {
    let service = case_service()?;
    let case = find_case(&service, case_id);
    let Some(selected) = select_export_turn(&case, turn) else {
        eprintln!("❌ Nothing to export in {case_id}");
        std::process::exit(1);
    };
    let format = report::export_turn(selected, out)?;
    println!("✅ {} report written to {}", format.label(), out.display());
    Ok(())
}
