//! CLI module for chronicle.
//!
//! One-shot commands run against a freshly wired [`Engine`] and return the
//! text to print. `run` is left to the caller, which owns the shutdown
//! signal.
//!
//! ```ignore
//! use chronicle::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! match run_cli_command(&engine, command).await {
//!     Some(Ok(output)) => println!("{}", output),
//!     Some(Err(e)) => eprintln!("Error: {}", e),
//!     None => engine.run(None, shutdown).await?,
//! }
//! ```

pub mod args;

pub use args::{parse_args, usage, CliCommand, IDENTITY_TOKEN_ENV};

use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;

use crate::auth::preview;
use crate::reconciler::{ExternalOffer, OfferOrigin, OfferOutcome, StaticLocation};
use crate::session::SessionState;
use crate::startup::Engine;
use crate::sync::{PassOutcome, SkipReason};

/// The current version of chronicle, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run a one-shot command.
///
/// Returns `None` for [`CliCommand::Run`], and the text to print otherwise.
pub async fn run_cli_command(engine: &Engine, command: CliCommand) -> Option<Result<String>> {
    let result = match command {
        CliCommand::Run => return None,
        CliCommand::Version => Ok(format!("chronicle {}", VERSION)),
        CliCommand::Help => Ok(usage().to_string()),
        CliCommand::Invalid(reason) => Err(eyre!("{}\n\n{}", reason, usage())),
        CliCommand::Login(assertion) => handle_login(engine, assertion).await,
        CliCommand::Logout => handle_logout(engine).await,
        CliCommand::Status => handle_status(engine).await,
        CliCommand::Stats => handle_stats(engine).await,
        CliCommand::SyncNow => handle_sync_now(engine).await,
        CliCommand::DashboardUrl => handle_dashboard_url(engine).await,
        CliCommand::AcceptUrl(url) => handle_accept_url(engine, &url).await,
    };
    Some(result)
}

async fn handle_login(engine: &Engine, assertion: Option<String>) -> Result<String> {
    let assertion = assertion
        .or_else(|| std::env::var(IDENTITY_TOKEN_ENV).ok())
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| eyre!("No identity assertion given and ${} is unset", IDENTITY_TOKEN_ENV))?;

    engine.sign_in(assertion.trim()).await?;
    let profile = engine.session().store().load_profile().await?;
    Ok(match profile {
        Some(profile) => format!("Signed in as {}", profile.display_name()),
        None => "Signed in".to_string(),
    })
}

async fn handle_logout(engine: &Engine) -> Result<String> {
    engine.sign_out().await?;
    Ok("Signed out".to_string())
}

async fn handle_status(engine: &Engine) -> Result<String> {
    let state = engine.cold_start(None).await?;
    let store = engine.session().store();
    let creds = store.load().await?;

    let mut lines = vec![format!("Session: {}", state)];
    if let Some(token) = creds.access_token.as_deref() {
        lines.push(format!("Token:   {}", preview(token)));
    }
    if let Some(profile) = store.load_profile().await? {
        lines.push(format!("User:    {}", profile.display_name()));
    }
    lines.push(format!("Synced:  {} entries", store.history_length().await?));
    if engine.indicator().is_raised().await {
        lines.push("Attention: sign in again".to_string());
    }
    Ok(lines.join("\n"))
}

async fn require_session(engine: &Engine) -> Result<()> {
    let state = engine.cold_start(None).await?;
    if state.needs_sign_in() {
        bail!("Not signed in ({}). Run `chronicle login` first.", state);
    }
    Ok(())
}

async fn handle_stats(engine: &Engine) -> Result<String> {
    require_session(engine).await?;

    let api = engine.api();
    let (stats, activity) = futures::try_join!(api.fetch_stats(), api.fetch_recent_activity())?;

    let mut lines = vec![
        format!("Bugs fixed:       {}", stats.bugs_fixed),
        format!("Concepts learned: {}", stats.concepts_learned),
        format!("Time spent:       {}", stats.time_spent),
        format!("Total entries:    {}", stats.total_entries),
    ];
    if !activity.is_empty() {
        lines.push(String::new());
        lines.push("Recent activity:".to_string());
        for item in activity {
            lines.push(format!("  [{}] {} ({})", item.category, item.title, item.domain));
        }
    }
    Ok(lines.join("\n"))
}

async fn handle_sync_now(engine: &Engine) -> Result<String> {
    require_session(engine).await?;

    Ok(match engine.collector().run_pass().await? {
        PassOutcome::Submitted(n) => format!("Submitted {} entries", n),
        PassOutcome::Skipped(SkipReason::NothingCollected) => {
            "No recent history to submit".to_string()
        }
        PassOutcome::Skipped(reason) => format!("Skipped: {:?}", reason),
        PassOutcome::Discarded => "Session changed during submission, result discarded".to_string(),
    })
}

async fn handle_dashboard_url(engine: &Engine) -> Result<String> {
    let state = engine.cold_start(None).await?;
    let store = engine.session().store();
    let token = match store.load().await?.access_token {
        Some(token) if state == SessionState::Authenticated => token,
        _ => bail!("Not signed in ({}). Run `chronicle login` first.", state),
    };

    let offer = ExternalOffer {
        token,
        profile: store.load_profile().await?,
    };
    Ok(offer.to_url(&engine.config().dashboard_url)?.to_string())
}

async fn handle_accept_url(engine: &Engine, url: &str) -> Result<String> {
    let origin = StaticLocation::parse(url)?;
    engine.session().initialize().await?;

    let outcome = engine.reconciler().accept_offer(&origin).await?;
    let message = match outcome {
        OfferOutcome::Applied => "Signed in from link",
        OfferOutcome::NoOffer => "Link carries no credentials",
        OfferOutcome::AlreadyConsumed => "Link was already used",
        OfferOutcome::Superseded => "Already signed in, link ignored",
        OfferOutcome::Discarded => "Link credentials are malformed, ignored",
    };
    let scrubbed = origin
        .current()
        .map(|u| u.to_string())
        .unwrap_or_default();
    Ok(format!("{}\n{}", message, scrubbed))
}
