//! One-shot "say" command

use std::error::Error;

use crate::cli::chat::format_notice;
use crate::cli::login_required;
use crate::core::app::{App, StartOutcome};
use crate::core::chat::{IgnoreReason, SubmitOutcome};

pub async fn run_say(app: &App, prompt: Vec<String>) -> Result<i32, Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: creditchat say <prompt>");
        return Ok(1);
    }

    let controller = match app.start().await? {
        StartOutcome::Ready(controller) => controller,
        StartOutcome::LoginRequired(reason) => return Ok(login_required(reason)),
    };

    let outcome = controller.submit(&prompt).await;
    for notice in controller.drain_notices().await {
        eprintln!("{}", format_notice(&notice));
    }

    match outcome {
        SubmitOutcome::Delivered { reply, .. } => {
            println!("{reply}");
            Ok(0)
        }
        SubmitOutcome::Blocked | SubmitOutcome::Failed { .. } => Ok(1),
        SubmitOutcome::LoginRequired(reason) => Ok(login_required(reason)),
        SubmitOutcome::Ignored(IgnoreReason::EmptyInput) => {
            eprintln!("Usage: creditchat say <prompt>");
            Ok(1)
        }
        SubmitOutcome::Ignored(_) | SubmitOutcome::Discarded => Ok(1),
    }
}
