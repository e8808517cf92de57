//! `register` and `login` commands.

use std::error::Error;
use std::io;

use crate::auth::ui::{prompt_login, prompt_registration};
use crate::core::app::{App, StartOutcome};

pub async fn run_register(app: &App) -> Result<i32, Box<dyn Error>> {
    let form = {
        let stdin = io::stdin();
        prompt_registration(&mut stdin.lock(), &mut io::stdout())?
    };

    match app.accounts().register(&form).await {
        Ok(()) => {
            println!("✅ Account created. Run 'creditchat login' to start chatting.");
            Ok(0)
        }
        Err(err) => {
            eprintln!("❌ Registration failed: {err}");
            Ok(1)
        }
    }
}

pub async fn run_login(app: &App) -> Result<i32, Box<dyn Error>> {
    let (username, password) = {
        let stdin = io::stdin();
        prompt_login(&mut stdin.lock(), &mut io::stdout())?
    };

    if let Err(err) = app.accounts().login(&username, &password).await {
        eprintln!("❌ Login failed: {err}");
        return Ok(1);
    }

    match app.start().await? {
        StartOutcome::Ready(controller) => {
            if let Some(profile) = controller.profile().await {
                println!(
                    "✅ Logged in as {} ({} tokens)",
                    profile.username, profile.token_balance
                );
            }
            Ok(0)
        }
        StartOutcome::LoginRequired(reason) => Ok(super::login_required(reason)),
    }
}
