//! Whoami command implementation.

use anyhow::Result;
use chrono::DateTime;
use clap::Args;

use fleetsync_core::UserProfile;
use fleetsync_http::ApiClient;

use crate::cli::ApiArgs;
use crate::commands::print_identity;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Ask the server for the current profile instead of using the stored one
    #[arg(long)]
    pub remote: bool,

    /// Print the profile as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: WhoamiArgs) -> Result<()> {
    let cli = session::require_login(&args.api).await?;
    let mut current = cli.manager.session();

    if args.remote {
        let client = ApiClient::new(cli.api.clone()).map_err(output::user_error)?;
        let profile: UserProfile = client.get("/auth/me").await.map_err(output::user_error)?;
        current.user = Some(profile);
    }

    if args.json {
        return output::json(&current.user);
    }

    print_identity(&current);
    output::field("API", cli.api.as_str());
    if let Some(expires) = current
        .access_token
        .as_ref()
        .and_then(|t| t.expires_at())
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
    {
        output::field("Token expires", &expires.to_rfc3339());
    }

    Ok(())
}
