//! notify
//!
//! Turning accounted changes into delivered messages.
//!
//! # Modules
//!
//! - [`template`] - Placeholder expansion with per-message field schemas
//! - [`compose`] - Change and revision message rendering
//! - [`filter`] - Body line and length limits
//! - [`mailer`] - Delivery (sendmail, stdout, in-memory)

pub mod compose;
pub mod filter;
pub mod mailer;
pub mod template;

pub use compose::{ComposeError, Composer};
pub use mailer::{MailError, Mailer};
