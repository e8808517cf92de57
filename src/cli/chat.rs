//! Line-based interactive chat.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::login_required;
use crate::core::chat::{ChatController, IgnoreReason, SubmitOutcome};
use crate::core::message::{ChatMessage, DeliveryState, Sender};
use crate::core::notice::{Notice, NoticeKind};
use crate::core::session::LoginReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Message(String),
    Balance,
    Logout,
    Quit,
    Help,
    Unknown(String),
}

pub fn parse_input(line: &str) -> ChatInput {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return ChatInput::Message(line.trim_end_matches(['\r', '\n']).to_string());
    };
    match command.to_ascii_lowercase().as_str() {
        "balance" => ChatInput::Balance,
        "logout" => ChatInput::Logout,
        "quit" | "exit" => ChatInput::Quit,
        "help" => ChatInput::Help,
        _ => ChatInput::Unknown(trimmed.to_string()),
    }
}

pub fn format_message(message: &ChatMessage) -> String {
    let who = match message.sender {
        Sender::User => "You",
        Sender::Assistant => "Assistant",
    };
    let mut line = format!("[{}] {who}: {}", message.timestamp, message.text);
    if message.delivery_state == DeliveryState::Failed {
        line.push_str("  ✗ not delivered");
    }
    if let Some(remaining) = message.remaining_tokens {
        line.push_str(&format!("  ({remaining} tokens left)"));
    }
    line
}

pub fn format_notice(notice: &Notice) -> String {
    let prefix = match notice.kind() {
        NoticeKind::Info => "ℹ️ ",
        NoticeKind::Warning => "⚠️ ",
        NoticeKind::Error => "❌",
    };
    format!("{prefix} {notice}")
}

fn print_help() {
    println!("Type a message and press Enter to send it.");
    println!("  /balance   Refresh and show your token balance");
    println!("  /logout    End the session");
    println!("  /quit      Leave the chat");
}

async fn print_notices(controller: &ChatController) {
    for notice in controller.drain_notices().await {
        eprintln!("{}", format_notice(&notice));
    }
}

async fn print_prompt(controller: &ChatController) -> io::Result<()> {
    let mut stdout = io::stdout();
    match controller.profile().await {
        Some(profile) => write!(stdout, "{} [{}]> ", profile.username, profile.token_balance)?,
        None => write!(stdout, "> ")?,
    }
    stdout.flush()
}

/// Run the chat until `/quit`, end of input or the session ends.
/// Returns the process exit status.
pub async fn run_chat(controller: ChatController) -> Result<i32, Box<dyn Error>> {
    if let Some(profile) = controller.profile().await {
        println!(
            "💬 Logged in as {} with {} tokens. Type /help for commands.",
            profile.username, profile.token_balance
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(&controller).await?;
        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(0);
        };

        match parse_input(&line) {
            ChatInput::Quit => return Ok(0),
            ChatInput::Help => print_help(),
            ChatInput::Unknown(command) => eprintln!("❌ Unknown command: {command}"),
            ChatInput::Balance => match controller.refresh_balance().await {
                Ok(balance) => println!("🪙 {balance} tokens"),
                Err(required) => {
                    print_notices(&controller).await;
                    return Ok(login_required(required.0));
                }
            },
            ChatInput::Logout => {
                let required = controller.logout().await;
                print_notices(&controller).await;
                return Ok(login_required(required.0));
            }
            ChatInput::Message(text) => {
                controller.set_draft(text).await;
                let outcome = controller.submit_draft().await;
                if let Some(code) = show_outcome(&controller, &outcome).await {
                    return Ok(code);
                }
            }
        }
    }
}

/// Print what a submit did. Returns an exit status when the chat must end.
async fn show_outcome(controller: &ChatController, outcome: &SubmitOutcome) -> Option<i32> {
    match outcome {
        SubmitOutcome::Delivered { .. } | SubmitOutcome::Failed { .. } => {
            let snapshot = controller.snapshot().await;
            let shown = match outcome {
                SubmitOutcome::Delivered { .. } => snapshot.messages.last(),
                _ => snapshot.messages.iter().rev().find(|m| m.is_user()),
            };
            if let Some(message) = shown {
                println!("{}", format_message(message));
            }
            print_notices(controller).await;
            None
        }
        SubmitOutcome::Blocked => {
            print_notices(controller).await;
            None
        }
        SubmitOutcome::LoginRequired(reason) => {
            print_notices(controller).await;
            Some(login_required(*reason))
        }
        SubmitOutcome::Ignored(IgnoreReason::NotAuthenticated) => {
            Some(login_required(LoginReason::NoCredential))
        }
        SubmitOutcome::Ignored(_) | SubmitOutcome::Discarded => None,
    }
}
