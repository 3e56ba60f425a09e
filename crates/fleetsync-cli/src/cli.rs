//! CLI argument definitions.

use clap::{Args, Parser, Subcommand};

use crate::commands::{change_password, login, logout, register, validate, watch, whoami};

/// Operator CLI for the fleetsync console.
#[derive(Parser, Debug)]
#[command(name = "fleetsync")]
#[command(author, version = env!("FLEETSYNC_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with a password or a Telegram login payload
    Login(login::LoginArgs),

    /// Create an account and log into it
    Register(register::RegisterArgs),

    /// End the stored session
    Logout(logout::LogoutArgs),

    /// Display the stored session
    Whoami(whoami::WhoamiArgs),

    /// Check the stored session and refresh its tokens if needed
    Validate(validate::ValidateArgs),

    /// Change the password of the logged-in account
    ChangePassword(change_password::ChangePasswordArgs),

    /// Stream realtime cache invalidations
    Watch(watch::WatchArgs),
}

/// Where to reach the console API.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// Console base URL. Defaults to the URL used at login.
    #[arg(long, env = "FLEETSYNC_API")]
    pub api: Option<String>,
}
