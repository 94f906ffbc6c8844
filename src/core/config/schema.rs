//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Files
//!
//! The global and repository files share one schema; repository values
//! override global ones key by key.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the mailer must be a known name).

use serde::Deserialize;

use super::ConfigError;

/// Names accepted for the `mailer` key.
pub const MAILER_NAMES: &[&str] = &["sendmail", "stdout"];

/// Smallest non-zero line-length limit (room for the truncation marker).
pub const MIN_LINE_LENGTH: usize = 8;

/// One configuration file.
///
/// # Example
///
/// ```toml
/// mailinglist = "dev@example.com"
/// announcelist = ["announce@example.com", "release@example.com"]
/// emaildomain = "example.com"
/// emailprefix = "[project]"
/// email_max_lines = 2000
/// reply_to_commit = "author"
/// mailer = "sendmail"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Fallback recipients for every notification class
    pub mailinglist: Option<Recipients>,

    /// Recipients of reference change notifications
    pub refchangelist: Option<Recipients>,

    /// Recipients of annotated tag notifications
    pub announcelist: Option<Recipients>,

    /// Recipients of per-commit notifications
    pub commitlist: Option<Recipients>,

    /// Repository name used in subjects and headers
    pub reponame: Option<String>,

    /// Subject prefix (a trailing space is added)
    pub emailprefix: Option<String>,

    /// Domain appended to the pusher's login name
    pub emaildomain: Option<String>,

    /// `From:` address of notifications
    pub from: Option<String>,

    /// Envelope sender passed to sendmail
    pub envelope_sender: Option<String>,

    /// Who to contact to stop receiving notifications
    pub administrator: Option<String>,

    /// Append a shortlog to annotated tag notifications
    pub announce_shortlog: Option<bool>,

    /// Append a detailed log of new commits to change notifications
    pub refchange_showlog: Option<bool>,

    /// Maximum number of body lines (0 = unlimited)
    pub email_max_lines: Option<usize>,

    /// Maximum body line length (0 = unlimited)
    pub email_max_line_length: Option<usize>,

    /// Maximum number of commit notifications per change (0 = unlimited)
    pub max_commit_emails: Option<usize>,

    /// Measure line lengths in characters
    pub email_strict_utf8: Option<bool>,

    /// Default Reply-To policy for both message kinds
    pub reply_to: Option<String>,

    /// Reply-To policy for commit notifications
    pub reply_to_commit: Option<String>,

    /// Reply-To policy for change notifications
    pub reply_to_refchange: Option<String>,

    /// Delivery mechanism
    pub mailer: Option<String>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(mailer) = &self.mailer {
            if !MAILER_NAMES.contains(&mailer.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid mailer '{}', must be one of: {}",
                    mailer,
                    MAILER_NAMES.join(", ")
                )));
            }
        }

        if let Some(length) = self.email_max_line_length {
            if length != 0 && length < MIN_LINE_LENGTH {
                return Err(ConfigError::InvalidValue(format!(
                    "email_max_line_length must be 0 or at least {}",
                    MIN_LINE_LENGTH
                )));
            }
        }

        for (key, value) in [
            ("reply_to", &self.reply_to),
            ("reply_to_commit", &self.reply_to_commit),
            ("reply_to_refchange", &self.reply_to_refchange),
        ] {
            if let Some(value) = value {
                ReplyTo::parse(value)
                    .map_err(|reason| ConfigError::InvalidValue(format!("{}: {}", key, reason)))?;
            }
        }

        if let Some(domain) = &self.emaildomain {
            if domain.trim().is_empty() || domain.contains('@') {
                return Err(ConfigError::InvalidValue(format!(
                    "emaildomain must be a bare domain name, got '{}'",
                    domain
                )));
            }
        }

        for (key, value) in [
            ("reponame", &self.reponame),
            ("administrator", &self.administrator),
            ("from", &self.from),
            ("envelope_sender", &self.envelope_sender),
        ] {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!("{} cannot be empty", key)));
                }
            }
        }

        Ok(())
    }
}

/// A recipient list: a single (possibly comma-separated) string or a list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// Individual addresses. An empty string yields an empty list.
    pub fn addresses(&self) -> Vec<String> {
        match self {
            Recipients::One(list) => split_addresses(list),
            Recipients::Many(lists) => lists.iter().flat_map(|l| split_addresses(l)).collect(),
        }
    }
}

/// Split a comma-separated address list.
pub fn split_addresses(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reply-To policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTo {
    /// The commit's author
    Author,
    /// The pusher's email address
    Pusher,
    /// No Reply-To header
    None,
    /// A fixed address
    Literal(String),
}

impl ReplyTo {
    /// Parse a policy value; the keywords are case-insensitive.
    pub fn parse(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" => Err("value cannot be empty".to_string()),
            "author" => Ok(ReplyTo::Author),
            "pusher" => Ok(ReplyTo::Pusher),
            "none" => Ok(ReplyTo::None),
            _ => Ok(ReplyTo::Literal(trimmed.to_string())),
        }
    }
}
