//! Command-line argument parsing for the chronicle CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Environment variable consulted by `login` when no assertion is given.
pub const IDENTITY_TOKEN_ENV: &str = "CHRONICLE_IDENTITY_TOKEN";

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Exchange an identity assertion for credentials
    Login(Option<String>),
    /// Clear the shared store and the local cache
    Logout,
    /// Show the session state
    Status,
    /// Fetch stats and recent activity
    Stats,
    /// Run one collection pass now
    SyncNow,
    /// Print the dashboard handoff link
    DashboardUrl,
    /// Consume a credential offer carried by a URL
    AcceptUrl(String),
    /// Run the background engine (default)
    Run,
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Arguments that could not be understood
    Invalid(String),
}

/// Parse command-line arguments and return the appropriate command.
///
/// # Arguments
///
/// * `args` - Iterator of command-line arguments (typically `std::env::args()`)
///
/// # Examples
///
/// ```
/// use chronicle::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["chronicle".to_string(), "status".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Status);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);
    let Some(command) = args.next() else {
        return CliCommand::Run;
    };

    match command.as_str() {
        "--version" | "-V" | "version" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "login" => CliCommand::Login(args.next()),
        "logout" => CliCommand::Logout,
        "status" => CliCommand::Status,
        "stats" => CliCommand::Stats,
        "sync" => CliCommand::SyncNow,
        "dashboard-url" => CliCommand::DashboardUrl,
        "accept-url" => match args.next() {
            Some(url) => CliCommand::AcceptUrl(url),
            None => CliCommand::Invalid("accept-url needs a URL".to_string()),
        },
        "run" => CliCommand::Run,
        other => CliCommand::Invalid(format!("unknown command '{}'", other)),
    }
}

/// Usage text for `--help`.
pub fn usage() -> &'static str {
    "Usage: chronicle [COMMAND]

Commands:
  run                 Keep the session alive and sync history (default)
  login [ASSERTION]   Sign in (falls back to $CHRONICLE_IDENTITY_TOKEN)
  logout              Sign out in every context
  status              Show the session state
  stats               Show stats and recent activity
  sync                Run one collection pass now
  dashboard-url       Print a signed-in dashboard link
  accept-url URL      Consume credentials carried by URL
  version             Show version information"
}
