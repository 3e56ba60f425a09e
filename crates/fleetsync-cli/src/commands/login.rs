//! Login command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use fleetsync_core::{Credentials, TelegramAuth};

use crate::cli::ApiArgs;
use crate::commands::print_identity;
use crate::output;
use crate::session::{self, storage};

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Username to authenticate with
    #[arg(long, conflicts_with = "telegram")]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "FLEETSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Telegram login widget payload, as JSON
    #[arg(long)]
    pub telegram: Option<String>,
}

fn credentials(args: &LoginArgs) -> Result<Credentials> {
    if let Some(payload) = &args.telegram {
        let auth: TelegramAuth =
            serde_json::from_str(payload).context("Invalid Telegram login payload")?;
        return Ok(Credentials::Telegram(auth));
    }

    let Some(username) = &args.username else {
        bail!("Pass --username or --telegram");
    };
    let password = args
        .password
        .as_deref()
        .context("--password (or FLEETSYNC_PASSWORD) is required")?;
    Ok(Credentials::password(username, password))
}

pub async fn run(args: LoginArgs) -> Result<()> {
    let credentials = credentials(&args)?;
    let cli = session::open(&args.api)?;

    eprintln!("{}", "Logging in...".dimmed());

    let session = cli
        .manager
        .login(credentials)
        .await
        .map_err(output::user_error)?;
    storage::save_api(&cli.api).context("Failed to save profile")?;

    output::success("Logged in successfully");
    println!();
    print_identity(&session);
    output::field("API", cli.api.as_str());

    Ok(())
}
