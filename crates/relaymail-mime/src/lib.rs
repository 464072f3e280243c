//! # relaymail-mime
//!
//! MIME generation for outgoing mail.
//!
//! ## Features
//!
//! - **Message encoding**: RFC 5322 headers with a Base64 body
//! - **Attachments**: `multipart/mixed` with a collision-checked boundary
//! - **Header encoding**: RFC 2047 encoded words for subjects and names
//! - **Content types**: declared or inferred from the filename
//!
//! ## Quick Start
//!
//! ```ignore
//! use relaymail_mime::{Attachment, Mailbox, Message};
//!
//! let message = Message::builder()
//!     .from(Mailbox::with_name("Dispatch", "dispatch@example.com")?)
//!     .to(Mailbox::new("crew@example.com")?)
//!     .subject("Mission report")
//!     .html_body("<h1>Report</h1>")
//!     .attach(Attachment::inferred("report.pdf", pdf_bytes))
//!     .build()?;
//!
//! let encoded = message.encode()?;
//! let wire = encoded.to_bytes(); // what goes after DATA
//! ```
//!
//! Encoding produces an [`EncodedMessage`] holding structured headers and
//! parts first, so boundary and encoding rules can be checked before any
//! bytes are written.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod boundary;
mod content_type;
mod error;
mod header;
mod mailbox;
mod message;

pub mod encoding;

pub use attachment::Attachment;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use mailbox::Mailbox;
pub use message::{Body, EncodedMessage, Message, MessageBuilder, MimeBody, Part};
