//! cli
//!
//! Command-line interface layer for pushmail.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and flags
//! - Build the per-run [`Environment`] from configuration and repository
//! - Read the updates, classify them and hand the push to the dispatcher
//!
//! # Architecture
//!
//! The CLI layer is thin. Everything it does is wiring; the accounting and
//! rendering live in [`crate::push`] and [`crate::notify`].

pub mod args;
pub mod input;

pub use args::Cli;

use anyhow::{Context, Result};

use crate::core::config::Config;
use crate::core::environment::Environment;
use crate::git::{Git, Oracle};
use crate::notify::mailer::{Mailer, OutputMailer, SendmailMailer};
use crate::push::{Change, Dispatcher, Push, RawUpdate};
use crate::ui::output::{self, Verbosity};

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let cwd = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let git = Git::open(&cwd).context("Failed to open repository")?;
    let info = git.info().context("Failed to read repository information")?;

    let config = Config::load(Some(info.git_dir.as_path())).context("Failed to load configuration")?;
    for (scope, path) in [
        ("global", config.global_config_loaded_from()),
        ("repository", config.repo_config_loaded_from()),
    ] {
        if let Some(path) = path {
            output::debug(format!("{} config: {}", scope, path.display()), verbosity);
        }
    }

    let pusher = cli.pusher.clone().unwrap_or_else(whoami::username);
    let env = Environment::new(&config, &info, &pusher, cli.recipients.as_deref())
        .context("Invalid configuration")?;

    let updates = match cli.single_update() {
        Some((refname, old, new)) => vec![input::resolve_single(&git, refname, old, new)
            .context("Failed to resolve the update")?],
        None => input::read_batch(std::io::stdin().lock())
            .context("Failed to read updates from stdin")?,
    };

    let push = build_push(&git, &env, &updates, verbosity)?;

    let mut mailer: Box<dyn Mailer> = if cli.stdout || config.mailer() == "stdout" {
        Box::new(OutputMailer::stdout())
    } else {
        Box::new(SendmailMailer::new(env.sender.clone()))
    };

    let report = Dispatcher::new(&git, &env, verbosity)
        .run(&push, mailer.as_mut())
        .context("Failed to send notifications")?;

    output::debug(
        format!(
            "sent {} change and {} revision notification(s)",
            report.changes_sent, report.revisions_sent
        ),
        verbosity,
    );
    Ok(())
}

/// Classify every update and assemble the push.
///
/// Classification diagnostics are reported as warnings.
fn build_push(
    oracle: &dyn Oracle,
    env: &Environment,
    updates: &[RawUpdate],
    verbosity: Verbosity,
) -> Result<Push> {
    let mut changes = Vec::with_capacity(updates.len());
    for update in updates {
        let classified = Change::classify(oracle, update)
            .with_context(|| format!("Failed to classify update of '{}'", update.refname))?;
        if let Some(diagnostic) = &classified.diagnostic {
            output::warn(diagnostic, verbosity);
        }
        let mut change = classified.change;
        change.assign_recipients(&env.pools);
        changes.push(change);
    }
    Push::new(oracle, changes).context("Failed to compute the push")
}
