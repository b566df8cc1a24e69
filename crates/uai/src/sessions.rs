use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use colored::Colorize;

use uai_sessions::{Role, Session, SessionRegistry, SessionStore};

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List recorded sessions, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a session's conversation
    Show {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every recorded session
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show message count and duration of a session
    Stats {
        /// Session ID
        id: String,
    },
}

pub fn handle_sessions_command(action: SessionsAction, store: SessionStore) -> Result<()> {
    match action {
        SessionsAction::List { json } => {
            let sessions = store.list().context("Failed to list sessions")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("{}", "No sessions found.".dimmed());
            } else {
                print_sessions_by_date(&sessions);
            }
        }
        SessionsAction::Show { id, json } => {
            let id = resolve_session_id(&store, id)?;
            let session = match store.read(&id) {
                Ok(session) => session,
                Err(e) if e.is_not_found() => {
                    println!("{} {}", "Session not found:".bright_red(), id);
                    return Ok(());
                }
                Err(e) => return Err(e).context("Failed to read session"),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session_detail(&session);
            }
        }
        SessionsAction::Clear { yes } => {
            let count = store.list().map(|s| s.len()).unwrap_or(0);
            if !yes && !confirm_clear(count)? {
                println!("{}", "Cancelled.".dimmed());
                return Ok(());
            }

            let removed = store.delete_all().context("Failed to clear sessions")?;
            println!("{} Cleared {} session(s)", "✓".bright_green(), removed);
        }
        SessionsAction::Stats { id } => {
            if let Err(e) = store.read(&id) {
                if e.is_not_found() {
                    println!("{} {}", "Session not found:".bright_red(), id);
                    return Ok(());
                }
                return Err(e).context("Failed to read session");
            }

            let stats = SessionRegistry::new(store).stats(&id);
            println!("{}", "=== Session Stats ===".bright_blue().bold());
            println!("{}  {}", "Session ID:".dimmed(), id);
            println!("{}  {}", "Messages:".dimmed(), stats.message_count);
            println!("{}  {}", "Duration:".dimmed(), stats.duration);
        }
    }

    Ok(())
}

fn confirm_clear(count: usize) -> Result<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(format!("Delete all {} recorded session(s)?", count))
        .default(false)
        .interact()?)
}

fn resolve_session_id(store: &SessionStore, id: Option<String>) -> Result<String> {
    if let Some(id) = id {
        return Ok(id);
    }

    // Interactive picker
    let sessions = store.list().context("Failed to list sessions")?;
    if sessions.is_empty() {
        anyhow::bail!("No sessions found.");
    }

    let items: Vec<String> = sessions
        .iter()
        .map(|s| {
            format!(
                "{} | {} {:<12} | {} msgs | {}",
                s.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                tool_icon(&s.tool),
                s.tool,
                s.messages.len(),
                s.project_name()
            )
        })
        .collect();

    let selection = dialoguer::FuzzySelect::new()
        .with_prompt("Select a session")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(sessions[selection].id.clone())
}

pub fn tool_icon(tool: &str) -> &'static str {
    match tool {
        "claude-code" => "🤖",
        "o3-mcp" => "🔍",
        "gemini-cli" => "🎨",
        _ => "🔧",
    }
}

/// Group sessions by local start date, keeping the input order.
fn group_by_date(sessions: &[Session]) -> Vec<(NaiveDate, Vec<&Session>)> {
    let mut groups: Vec<(NaiveDate, Vec<&Session>)> = Vec::new();
    for session in sessions {
        let date = session.start_time.with_timezone(&Local).date_naive();
        match groups.last_mut() {
            Some((last, members)) if *last == date => members.push(session),
            _ => groups.push((date, vec![session])),
        }
    }
    groups
}

fn print_sessions_by_date(sessions: &[Session]) {
    for (date, members) in group_by_date(sessions) {
        println!("{}", date.format("%Y-%m-%d (%a)").to_string().bright_yellow());
        for s in members {
            let status = if s.is_open() {
                " open".bright_cyan().to_string()
            } else {
                String::new()
            };
            println!(
                "  {} {} {} {} {}{}",
                s.start_time.with_timezone(&Local).format("%H:%M").to_string().dimmed(),
                tool_icon(&s.tool),
                s.tool.bright_cyan(),
                format!("({} messages)", s.messages.len()).dimmed(),
                s.project_name().bright_blue(),
                status
            );
        }
        println!();
    }
}

fn print_session_detail(session: &Session) {
    println!("{}", "=== Session Detail ===".bright_blue().bold());
    println!("{}  {}", "ID:".dimmed(), session.id);
    println!("{}  {} {}", "Tool:".dimmed(), tool_icon(&session.tool), session.tool);
    println!("{}  {}", "Project:".dimmed(), session.project_path);
    println!(
        "{}  {}",
        "Started:".dimmed(),
        session.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    );
    match session.end_time {
        Some(end) => println!(
            "{}  {}",
            "Ended:".dimmed(),
            end.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("{}  {}", "Status:".dimmed(), "OPEN".bright_cyan()),
    }

    let turns: Vec<_> = session
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();
    if turns.is_empty() {
        return;
    }

    println!();
    println!("{}", format!("--- Conversation ({}) ---", turns.len()).dimmed());
    for msg in turns {
        let time = msg.timestamp.with_timezone(&Local).format("%H:%M:%S");
        println!();
        match msg.role {
            Role::User => {
                println!("{}", format!("[{}] User:", time).bright_blue());
                println!("{}", msg.content);
            }
            _ => {
                println!("{}", format!("[{}] Assistant:", time).bright_green());
                println!("{}", msg.content.dimmed());
            }
        }
    }
}
