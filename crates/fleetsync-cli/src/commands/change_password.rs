//! Change-password command implementation.

use anyhow::Result;
use clap::Args;

use crate::cli::ApiArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct ChangePasswordArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Current password
    #[arg(long, env = "FLEETSYNC_PASSWORD", hide_env_values = true)]
    pub current: String,

    /// New password
    #[arg(long, env = "FLEETSYNC_NEW_PASSWORD", hide_env_values = true)]
    pub new: String,
}

pub async fn run(args: ChangePasswordArgs) -> Result<()> {
    let cli = session::require_login(&args.api).await?;

    cli.manager
        .change_password(&args.current, &args.new)
        .await
        .map_err(output::user_error)?;

    output::success("Password changed");
    Ok(())
}
