//! Opening the persisted session for a command.

pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use fleetsync_core::ApiUrl;
use fleetsync_core::traits::SessionStore;
use fleetsync_session::{SessionManager, Validation};

use crate::cli::ApiArgs;
use crate::output;

pub const NOT_LOGGED_IN: &str = "Not logged in. Run 'fleetsync login' first.";

/// A session manager bound to the API it talks to.
pub struct CliSession {
    pub manager: SessionManager,
    pub api: ApiUrl,
}

/// The API URL from `--api`, `FLEETSYNC_API`, or the last login.
pub fn resolve_api(args: &ApiArgs) -> Result<Option<ApiUrl>> {
    match &args.api {
        Some(url) => Ok(Some(ApiUrl::new(url).context("Invalid API URL")?)),
        None => storage::load_api(),
    }
}

/// Build the manager over the stored session without validating it.
pub fn open_with(api: ApiUrl) -> Result<CliSession> {
    let store: Arc<dyn SessionStore> = Arc::new(storage::session_store()?);
    let manager = SessionManager::with_http(api.clone(), Some(store)).map_err(output::user_error)?;
    Ok(CliSession { manager, api })
}

pub fn open(args: &ApiArgs) -> Result<CliSession> {
    let api = resolve_api(args)?
        .context("No API URL configured. Pass --api or set FLEETSYNC_API.")?;
    open_with(api)
}

/// Open the stored session and make sure it is still usable.
///
/// The persisted session is only a hint; it is always validated before a
/// command acts on it.
pub async fn require_login(args: &ApiArgs) -> Result<CliSession> {
    let Some(api) = resolve_api(args)? else {
        bail!(NOT_LOGGED_IN);
    };
    let session = open_with(api)?;

    match session.manager.validate_session().await {
        Validation::Healthy | Validation::Refreshed => Ok(session),
        Validation::Cleared => bail!("Your session has expired. Please log in again."),
        Validation::Unauthenticated | Validation::Superseded => bail!(NOT_LOGGED_IN),
    }
}
