//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use crate::cli::ApiArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {
    #[command(flatten)]
    pub api: ApiArgs,
}

pub async fn run(args: LogoutArgs) -> Result<()> {
    let Some(api) = session::resolve_api(&args.api)? else {
        output::warning("Not logged in");
        return Ok(());
    };

    let cli = session::open_with(api)?;
    if !cli.manager.is_authenticated() {
        output::warning("Not logged in");
        return Ok(());
    }

    cli.manager.logout().await;
    output::success("Logged out");
    Ok(())
}
