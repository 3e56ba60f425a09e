//! Watch command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;
use tokio::time::{MissedTickBehavior, interval};

use fleetsync_core::CacheKey;
use fleetsync_core::traits::CacheInvalidator;
use fleetsync_http::RealtimeManager;
use fleetsync_session::{Validation, supervise_realtime};

use crate::cli::ApiArgs;
use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Output invalidations as JSON
    #[arg(long)]
    pub json: bool,

    /// Seconds between session validations
    #[arg(long, default_value_t = 60)]
    pub validate_every: u64,
}

fn printer(json_output: bool) -> Arc<dyn CacheInvalidator> {
    Arc::new(move |key: &CacheKey| {
        if json_output {
            let line = json!({
                "invalidate": key.to_string(),
                "at": chrono::Utc::now().to_rfc3339(),
            });
            println!("{}", line);
        } else {
            println!("{} {}", "INVALIDATE".cyan(), key);
        }
    })
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let cli = session::require_login(&args.api).await?;

    eprintln!("{}", "Connecting to realtime stream...".dimmed());
    eprintln!("{}", "Press Ctrl+C to stop.".dimmed());
    eprintln!();

    let api = cli.api.clone();
    let invalidator = printer(args.json);
    let supervisor = supervise_realtime(&cli.manager, move || {
        RealtimeManager::new(api.clone(), Arc::clone(&invalidator))
    });

    let mut validation = interval(Duration::from_secs(args.validate_every.max(1)));
    validation.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately and the session was just validated.
    validation.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                break;
            }
            _ = validation.tick() => {
                if cli.manager.validate_session().await == Validation::Cleared {
                    output::warning("Session expired; stopping.");
                    break;
                }
            }
        }
    }

    supervisor.shutdown().await;
    Ok(())
}
