//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! pushmail has two configuration scopes:
//! - **Global**: settings shared by every repository on the host
//! - **Repo**: per-repository overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here, except the `--recipients` override)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$PUSHMAIL_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/pushmail/config.toml`
//! 3. `~/.pushmail/config.toml`
//!
//! # Repo Config Location
//!
//! `<git-dir>/pushmail/config.toml`, which also works for the bare
//! repositories hooks usually run in.
//!
//! # Example
//!
//! ```no_run
//! use pushmail::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/srv/git/project.git"))).unwrap();
//! let pools = config.recipient_pools(None).unwrap();
//! println!("Change notifications go to: {}", pools.refchange.join(", "));
//! println!("Max line length: {:?}", config.email_max_line_length());
//! ```

pub mod schema;

pub use schema::{ConfigFile, Recipients, ReplyTo};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default limit on body line length.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 500;

/// Default limit on commit notifications per change.
pub const DEFAULT_MAX_COMMIT_EMAILS: usize = 500;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error(
        "the list of recipients for {class} is not configured; please set {}",
        quoted_keys(.keys)
    )]
    MissingRecipients {
        class: &'static str,
        keys: &'static [&'static str],
    },
}

fn quoted_keys(keys: &[&str]) -> String {
    keys.iter()
        .map(|key| format!("'{}'", key))
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Recipient lists per notification class, resolved once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientPools {
    /// Branch, lightweight tag and other reference changes
    pub refchange: Vec<String>,
    /// Annotated tag changes
    pub announce: Vec<String>,
    /// Individual commits
    pub revision: Vec<String>,
}

/// Keys consulted for each recipient pool, first configured wins.
const REFCHANGE_KEYS: &[&str] = &["refchangelist", "mailinglist"];
const ANNOUNCE_KEYS: &[&str] = &["announcelist", "refchangelist", "mailinglist"];
const REVISION_KEYS: &[&str] = &["commitlist", "mailinglist"];

/// Merged configuration from all sources.
///
/// Accessors apply precedence automatically: repo config overrides global
/// config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: ConfigFile,
    /// Repository configuration (if present)
    pub repo: Option<ConfigFile>,
    /// Path to the global config file (if loaded)
    pub(crate) global_path: Option<PathBuf>,
    /// Path to the repo config file (if loaded)
    pub(crate) repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// If `git_dir` is provided, also loads the repository's config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(Self::find_global().as_deref(), git_dir)
    }

    /// Load from an explicit global file (if any) and repository.
    pub fn load_from(global: Option<&Path>, git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = match global {
            Some(path) if path.exists() => (Self::read_config(path)?, Some(path.to_path_buf())),
            _ => (ConfigFile::default(), None),
        };

        let (repo, repo_path) = match git_dir.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_config(&path)?), Some(path)),
            _ => (None, None),
        };

        // Validate loaded configs
        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// Locate the global configuration file.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $PUSHMAIL_CONFIG
        if let Ok(path) = std::env::var("PUSHMAIL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/pushmail/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("pushmail/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.pushmail/config.toml
        dirs::home_dir()
            .map(|home| home.join(".pushmail/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the repository config file for a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("pushmail/config.toml")
    }

    /// First value set in the repo file, else the global file.
    fn pick<T>(&self, get: impl Fn(&ConfigFile) -> Option<&T>) -> Option<&T>
    where
        T: ?Sized,
    {
        self.repo
            .as_ref()
            .and_then(&get)
            .or_else(|| get(&self.global))
    }

    // =========================================================================
    // Recipients
    // =========================================================================

    fn recipients(&self, key: &str) -> Option<&Recipients> {
        self.pick(|file| match key {
            "mailinglist" => file.mailinglist.as_ref(),
            "refchangelist" => file.refchangelist.as_ref(),
            "announcelist" => file.announcelist.as_ref(),
            "commitlist" => file.commitlist.as_ref(),
            _ => None,
        })
    }

    fn first_recipients(
        &self,
        class: &'static str,
        keys: &'static [&'static str],
    ) -> Result<Vec<String>, ConfigError> {
        keys.iter()
            .find_map(|key| self.recipients(key))
            .map(Recipients::addresses)
            .ok_or(ConfigError::MissingRecipients { class, keys })
    }

    /// Resolve the recipient pools.
    ///
    /// `override_list` (from `--recipients`) replaces every pool.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRecipients` when none of the keys for a
    /// pool is set. A key set to an empty list is valid and yields an empty
    /// pool.
    pub fn recipient_pools(&self, override_list: Option<&str>) -> Result<RecipientPools, ConfigError> {
        if let Some(list) = override_list {
            let all = schema::split_addresses(list);
            return Ok(RecipientPools {
                refchange: all.clone(),
                announce: all.clone(),
                revision: all,
            });
        }

        Ok(RecipientPools {
            refchange: self.first_recipients("refchangelist", REFCHANGE_KEYS)?,
            announce: self.first_recipients("announcelist", ANNOUNCE_KEYS)?,
            revision: self.first_recipients("commitlist", REVISION_KEYS)?,
        })
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    pub fn reponame(&self) -> Option<&str> {
        self.pick(|f| f.reponame.as_deref())
    }

    pub fn emailprefix(&self) -> Option<&str> {
        self.pick(|f| f.emailprefix.as_deref())
    }

    pub fn emaildomain(&self) -> Option<&str> {
        self.pick(|f| f.emaildomain.as_deref())
    }

    pub fn from(&self) -> Option<&str> {
        self.pick(|f| f.from.as_deref())
    }

    pub fn envelope_sender(&self) -> Option<&str> {
        self.pick(|f| f.envelope_sender.as_deref())
    }

    pub fn administrator(&self) -> Option<&str> {
        self.pick(|f| f.administrator.as_deref())
    }

    /// Defaults to `false` if not configured.
    pub fn announce_shortlog(&self) -> bool {
        self.pick(|f| f.announce_shortlog.as_ref())
            .copied()
            .unwrap_or(false)
    }

    /// Defaults to `false` if not configured.
    pub fn refchange_showlog(&self) -> bool {
        self.pick(|f| f.refchange_showlog.as_ref())
            .copied()
            .unwrap_or(false)
    }

    /// `None` means unlimited (the default).
    pub fn email_max_lines(&self) -> Option<usize> {
        self.pick(|f| f.email_max_lines.as_ref())
            .copied()
            .filter(|&n| n != 0)
    }

    /// Defaults to 500; `None` means unlimited.
    pub fn email_max_line_length(&self) -> Option<usize> {
        let length = self
            .pick(|f| f.email_max_line_length.as_ref())
            .copied()
            .unwrap_or(DEFAULT_MAX_LINE_LENGTH);
        (length != 0).then_some(length)
    }

    /// Defaults to 500; `None` means unlimited.
    pub fn max_commit_emails(&self) -> Option<usize> {
        let max = self
            .pick(|f| f.max_commit_emails.as_ref())
            .copied()
            .unwrap_or(DEFAULT_MAX_COMMIT_EMAILS);
        (max != 0).then_some(max)
    }

    /// Defaults to `true` if not configured.
    pub fn email_strict_utf8(&self) -> bool {
        self.pick(|f| f.email_strict_utf8.as_ref())
            .copied()
            .unwrap_or(true)
    }

    /// Reply-To policy for commit notifications.
    ///
    /// `reply_to_commit`, else `reply_to`, else "author".
    pub fn reply_to_commit(&self) -> ReplyTo {
        self.reply_to_policy(|f| f.reply_to_commit.as_deref(), ReplyTo::Author)
    }

    /// Reply-To policy for change notifications.
    ///
    /// `reply_to_refchange`, else `reply_to`, else "pusher".
    pub fn reply_to_refchange(&self) -> ReplyTo {
        self.reply_to_policy(|f| f.reply_to_refchange.as_deref(), ReplyTo::Pusher)
    }

    fn reply_to_policy(
        &self,
        specific: impl Fn(&ConfigFile) -> Option<&str>,
        default: ReplyTo,
    ) -> ReplyTo {
        self.pick(specific)
            .or_else(|| self.pick(|f| f.reply_to.as_deref()))
            .and_then(|value| ReplyTo::parse(value).ok())
            .unwrap_or(default)
    }

    /// Defaults to "sendmail" if not configured.
    pub fn mailer(&self) -> &str {
        self.pick(|f| f.mailer.as_deref()).unwrap_or("sendmail")
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
