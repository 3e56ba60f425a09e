//! Validate command implementation.

use anyhow::{Result, bail};
use clap::Args;

use fleetsync_session::Validation;

use crate::cli::ApiArgs;
use crate::output;
use crate::session::{self, NOT_LOGGED_IN};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub api: ApiArgs,
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    let Some(api) = session::resolve_api(&args.api)? else {
        bail!(NOT_LOGGED_IN);
    };
    let cli = session::open_with(api)?;

    match cli.manager.validate_session().await {
        Validation::Healthy => output::success("Session is valid"),
        Validation::Refreshed => output::success("Session tokens refreshed"),
        Validation::Superseded => output::success("Session changed during validation"),
        Validation::Cleared => bail!("Session expired and was cleared. Please log in again."),
        Validation::Unauthenticated => bail!(NOT_LOGGED_IN),
    }

    Ok(())
}
