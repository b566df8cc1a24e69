use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use uai_logging::{LogEvent, Logger};
use uai_providers::api::{coding_system_prompt, AnthropicClient, ChatTurn};
use uai_sessions::{Role, SessionRegistry};

enum ReplInput {
    Line(String),
    Eof,
    Interrupted,
}

async fn read_line<R>(lines: &mut tokio::io::Lines<R>) -> Result<ReplInput>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("{} ", ">".bright_cyan());
    std::io::stdout().flush()?;

    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => ReplInput::Line(line),
            None => ReplInput::Eof,
        }),
        _ = tokio::signal::ctrl_c() => Ok(ReplInput::Interrupted),
    }
}

/// Line-oriented chat over the Messages API, used when the Claude CLI
/// cannot be started. Each exchange is recorded as a user and an
/// assistant message; `exit` or Ctrl+C ends the loop.
pub async fn run_api_repl(
    client: &AnthropicClient,
    project_path: &str,
    registry: &SessionRegistry,
    session_id: &str,
    logger: &Logger,
) -> Result<()> {
    println!("{}", "Type a message (exit to quit)".bright_cyan());
    println!();

    let system = coding_system_prompt(project_path);
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let input = match read_line(&mut lines).await? {
            ReplInput::Line(line) => line.trim().to_string(),
            ReplInput::Eof => break,
            ReplInput::Interrupted => {
                println!("\n{}", "Interrupted".bright_yellow());
                break;
            }
        };

        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        history.push(ChatTurn::user(input.clone()));
        let reply = tokio::select! {
            reply = client.send(&history, &system) => reply,
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Interrupted".bright_yellow());
                break;
            }
        };

        match reply {
            Ok(text) => {
                println!();
                println!("{} {}", "🤖".bright_green(), text);
                println!();
                history.push(ChatTurn::assistant(text.clone()));

                for (role, content) in [(Role::User, input), (Role::Assistant, text)] {
                    if let Err(e) = registry.append(session_id, role, content) {
                        logger.log(&LogEvent::PersistenceWarning {
                            session_id: session_id.to_string(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            Err(e) => {
                // Keep the history alternating user/assistant
                history.pop();
                eprintln!("{} {}", "Error:".bright_red(), e);
            }
        }
    }

    Ok(())
}
