//! notify::mailer
//!
//! Delivery of composed messages.
//!
//! # Design
//!
//! A [`Mailer`] receives the full text of one message (headers, a blank
//! line, then the body) as lines. Recipients are carried in the `To:`
//! header; the slice passed alongside is informational. Implementations:
//!
//! - [`SendmailMailer`] pipes the message to `sendmail -t`
//! - [`OutputMailer`] writes messages to a stream between separator lines
//! - [`RecordingMailer`] keeps messages in memory for tests
//!
//! # Example
//!
//! ```
//! use pushmail::notify::mailer::{Mailer, RecordingMailer};
//!
//! let mut mailer = RecordingMailer::new();
//! let handle = mailer.clone();
//! mailer
//!     .send(&["To: dev@example.com".to_string(), String::new(), "body".to_string()],
//!           &["dev@example.com".to_string()])
//!     .unwrap();
//! assert_eq!(handle.sent().len(), 1);
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Default location of the sendmail binary.
pub const SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

/// Errors from message delivery.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("cannot execute '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("error while writing message to '{command}': {source}")]
    Write {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("failed to write message: {0}")]
    Output(#[from] std::io::Error),
}

/// Something that can deliver a message.
pub trait Mailer {
    /// Deliver one message.
    fn send(&mut self, lines: &[String], recipients: &[String]) -> Result<(), MailError>;
}

// =============================================================================
// sendmail
// =============================================================================

/// Delivers messages through `sendmail -t`.
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    program: PathBuf,
    envelope_sender: Option<String>,
}

impl SendmailMailer {
    pub fn new(envelope_sender: Option<String>) -> Self {
        Self {
            program: PathBuf::from(SENDMAIL_PATH),
            envelope_sender,
        }
    }

    /// Use a different sendmail-compatible program.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-t".to_string()];
        if let Some(sender) = &self.envelope_sender {
            args.push("-f".to_string());
            args.push(sender.clone());
        }
        args
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Mailer for SendmailMailer {
    fn send(&mut self, lines: &[String], _recipients: &[String]) -> Result<(), MailError> {
        let command = self.command_line();
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|source| MailError::Spawn {
                command: command.clone(),
                source,
            })?;

        let written = match child.stdin.take() {
            Some(mut stdin) => lines
                .iter()
                .try_for_each(|line| writeln!(stdin, "{}", line)),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin not captured",
            )),
        };
        if let Err(source) = written {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MailError::Write { command, source });
        }

        let status = child.wait().map_err(|source| MailError::Write {
            command: command.clone(),
            source,
        })?;
        if !status.success() {
            return Err(MailError::CommandFailed {
                command,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Output
// =============================================================================

/// Writes messages to a stream, each bracketed by a line of 75 `=`.
#[derive(Debug)]
pub struct OutputMailer<W: Write> {
    out: W,
}

impl<W: Write> OutputMailer<W> {
    pub const SEPARATOR_WIDTH: usize = 75;

    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl OutputMailer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Mailer for OutputMailer<W> {
    fn send(&mut self, lines: &[String], _recipients: &[String]) -> Result<(), MailError> {
        let separator = "=".repeat(Self::SEPARATOR_WIDTH);
        writeln!(self.out, "{}", separator)?;
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        writeln!(self.out, "{}", separator)?;
        self.out.flush()?;
        Ok(())
    }
}

// =============================================================================
// Recording
// =============================================================================

/// A delivered message as seen by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub lines: Vec<String>,
    pub recipients: Vec<String>,
}

impl SentMessage {
    /// Value of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}: ", name);
        self.lines
            .iter()
            .take_while(|line| !line.is_empty())
            .find_map(|line| line.strip_prefix(prefix.as_str()))
    }

    /// Lines after the header block.
    pub fn body(&self) -> &[String] {
        let start = self
            .lines
            .iter()
            .position(String::is_empty)
            .map_or(self.lines.len(), |i| i + 1);
        &self.lines[start..]
    }
}

/// Keeps delivered messages in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentMessage>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send(&mut self, lines: &[String], recipients: &[String]) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                lines: lines.to_vec(),
                recipients: recipients.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> Vec<String> {
        vec![
            "To: dev@example.com".to_string(),
            "Subject: hello".to_string(),
            String::new(),
            "first".to_string(),
            "second".to_string(),
        ]
    }

    mod output {
        use super::*;

        #[test]
        fn brackets_with_separators() {
            let mut mailer = OutputMailer::new(Vec::new());
            mailer.send(&message(), &[]).unwrap();
            let text = String::from_utf8(mailer.into_inner()).unwrap();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.first(), Some(&"=".repeat(75).as_str()));
            assert_eq!(lines.last(), Some(&"=".repeat(75).as_str()));
            assert_eq!(lines.len(), message().len() + 2);
        }
    }

    mod recording {
        use super::*;

        #[test]
        fn header_and_body() {
            let mut mailer = RecordingMailer::new();
            mailer.send(&message(), &["dev@example.com".to_string()]).unwrap();
            let sent = mailer.sent();
            assert_eq!(sent[0].header("Subject"), Some("hello"));
            assert_eq!(sent[0].header("Reply-To"), None);
            assert_eq!(sent[0].body(), &["first".to_string(), "second".to_string()]);
        }

        #[test]
        fn body_lines_are_not_headers() {
            let sent = SentMessage {
                lines: vec![
                    "To: a@example.com".to_string(),
                    String::new(),
                    "Subject: not a header".to_string(),
                ],
                recipients: vec![],
            };
            assert_eq!(sent.header("Subject"), None);
        }
    }

    mod sendmail {
        use super::*;

        #[test]
        fn arguments_include_envelope_sender() {
            let mailer = SendmailMailer::new(Some("hooks@example.com".to_string()));
            assert_eq!(mailer.args(), vec!["-t", "-f", "hooks@example.com"]);
            assert_eq!(mailer.command_line(), "/usr/sbin/sendmail -t -f hooks@example.com");
        }

        #[test]
        fn arguments_without_sender() {
            let mailer = SendmailMailer::new(None);
            assert_eq!(mailer.args(), vec!["-t"]);
        }

        #[cfg(unix)]
        #[test]
        fn missing_program_is_a_spawn_error() {
            let mut mailer =
                SendmailMailer::new(None).with_program("/nonexistent/pushmail-sendmail");
            let err = mailer.send(&message(), &[]).unwrap_err();
            assert!(matches!(err, MailError::Spawn { .. }));
        }

        #[cfg(unix)]
        #[test]
        fn failing_program_is_reported() {
            let mut mailer = SendmailMailer::new(None).with_program("false");
            let err = mailer.send(&message(), &[]).unwrap_err();
            assert!(matches!(
                err,
                MailError::CommandFailed { .. } | MailError::Write { .. }
            ));
        }

        #[cfg(unix)]
        #[test]
        fn succeeding_program() {
            let mut mailer = SendmailMailer::new(None).with_program("cat");
            // `cat -t` is accepted by GNU and BSD cat
            mailer.send(&message(), &[]).unwrap();
        }
    }
}
