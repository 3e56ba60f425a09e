//! Register command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::cli::ApiArgs;
use crate::commands::print_identity;
use crate::output;
use crate::session::{self, storage};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Username for the new account
    pub username: String,

    /// Password for the new account
    #[arg(long, env = "FLEETSYNC_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(args: RegisterArgs) -> Result<()> {
    let cli = session::open(&args.api)?;

    eprintln!("{}", "Creating account...".dimmed());

    let session = cli
        .manager
        .register(&args.username, &args.password)
        .await
        .map_err(output::user_error)?;
    storage::save_api(&cli.api).context("Failed to save profile")?;

    output::success("Account created");
    println!();
    print_identity(&session);
    output::field("API", cli.api.as_str());

    Ok(())
}
