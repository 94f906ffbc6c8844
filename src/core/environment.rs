//! core::environment
//!
//! The per-run context shared by every component.
//!
//! # Design
//!
//! An [`Environment`] is built once per run from the loaded [`Config`], the
//! repository information and the pusher's identity, then passed by
//! reference to the composer and dispatcher. Nothing about the run is kept
//! in process-global state.

use std::path::PathBuf;

use super::config::{Config, ConfigError, RecipientPools, ReplyTo};
use crate::git::RepoInfo;
use crate::notify::filter::BodyLimits;

/// Name used when the repository name cannot be derived.
pub const UNKNOWN_REPOSITORY: &str = "unknown repository";

/// Description used when the repository has none.
pub const UNNAMED_PROJECT: &str = "UNNAMED PROJECT";

/// Administrator named in footers when none is configured.
pub const DEFAULT_ADMINISTRATOR: &str = "the administrator of this repository";

/// Context for one run.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Short repository name used in subjects and headers
    pub repo_shortname: String,
    /// Git directory for bare repositories, else the working tree
    pub repo_path: PathBuf,
    /// First line of the repository description
    pub projectdesc: String,
    pub administrator: String,
    /// Subject prefix, including its trailing space
    pub emailprefix: String,
    /// The pusher as shown in messages
    pub pusher: String,
    /// The pusher's address, when it can be derived
    pub pusher_email: Option<String>,
    /// `From:` address
    pub fromaddr: Option<String>,
    /// Envelope sender for sendmail
    pub sender: Option<String>,
    pub pools: RecipientPools,
    pub limits: BodyLimits,
    pub reply_to_refchange: ReplyTo,
    pub reply_to_commit: ReplyTo,
    pub announce_shortlog: bool,
    pub refchange_showlog: bool,
    /// Per-change cap on commit notifications (`None` = unlimited)
    pub max_commit_emails: Option<usize>,
}

impl Environment {
    /// Build the run context.
    ///
    /// `pusher` is the login name of whoever pushed; `recipients` is the
    /// `--recipients` override, if given.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRecipients` when a recipient pool is not
    /// configured.
    pub fn new(
        config: &Config,
        repo: &RepoInfo,
        pusher: &str,
        recipients: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let pools = config.recipient_pools(recipients)?;

        let repo_path = repo.repo_path().to_path_buf();
        let repo_shortname = config
            .reponame()
            .map(str::to_string)
            .unwrap_or_else(|| shortname_from_path(&repo_path));

        let (pusher, pusher_email) = match config.emaildomain() {
            Some(domain) => {
                let address = format!("{}@{}", pusher, domain);
                (address.clone(), Some(address))
            }
            None => (pusher.to_string(), None),
        };

        let emailprefix = match config.emailprefix().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => format!("{} ", prefix),
            _ => format!("[{}] ", repo_shortname),
        };

        let sender = config.envelope_sender().map(str::to_string);
        let fromaddr = config
            .from()
            .map(str::to_string)
            .or_else(|| match (&repo.user_name, &repo.user_email) {
                (Some(name), Some(email)) if !email.is_empty() => {
                    Some(format!("{} <{}>", name, email))
                }
                (None, Some(email)) if !email.is_empty() => Some(email.clone()),
                _ => None,
            })
            .or_else(|| sender.clone());

        Ok(Self {
            repo_shortname,
            repo_path,
            projectdesc: project_description(repo.description.as_deref()),
            administrator: config
                .administrator()
                .unwrap_or(DEFAULT_ADMINISTRATOR)
                .to_string(),
            emailprefix,
            pusher,
            pusher_email,
            fromaddr,
            sender,
            pools,
            limits: BodyLimits {
                max_lines: config.email_max_lines(),
                max_line_length: config.email_max_line_length(),
                strict_utf8: config.email_strict_utf8(),
            },
            reply_to_refchange: config.reply_to_refchange(),
            reply_to_commit: config.reply_to_commit(),
            announce_shortlog: config.announce_shortlog(),
            refchange_showlog: config.refchange_showlog(),
            max_commit_emails: config.max_commit_emails(),
        })
    }
}

/// Repository name from its path: the final component without `.git`.
fn shortname_from_path(path: &std::path::Path) -> String {
    let Some(basename) = path.file_name().and_then(|name| name.to_str()) else {
        return UNKNOWN_REPOSITORY.to_string();
    };
    match basename.strip_suffix(".git") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ if basename.is_empty() => UNKNOWN_REPOSITORY.to_string(),
        _ => basename.to_string(),
    }
}

/// The project description, or the placeholder for missing and default
/// descriptions.
fn project_description(description: Option<&str>) -> String {
    match description.map(str::trim) {
        Some(desc) if !desc.is_empty() && !desc.starts_with("Unnamed repository") => {
            desc.to_string()
        }
        _ => UNNAMED_PROJECT.to_string(),
    }
}
