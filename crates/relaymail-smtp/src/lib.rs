//! # relaymail-smtp
//!
//! A single-message SMTP submission client (RFC 5321 subset).
//!
//! ## Features
//!
//! - **Type-state sessions**: compile-time enforcement of command order, with
//!   the transport closed on every failed transition
//! - **TLS support**: implicit TLS (port 465) and STARTTLS (port 587), both
//!   verified against the webpki roots
//! - **Authentication**: AUTH LOGIN
//! - **Timeouts**: connect and every read/write are bounded
//!
//! ## Quick Start
//!
//! ```ignore
//! use relaymail_smtp::{Mailbox, Mailer, Message, Security, SmtpConfig};
//!
//! #[tokio::main]
//! async fn main() -> relaymail_smtp::Result<()> {
//!     let config = SmtpConfig::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("bot", "secret")
//!         .build();
//!
//!     let message = Message::builder()
//!         .from(Mailbox::with_name("Alerts", "bot@example.com")?)
//!         .to(Mailbox::new("ops@example.com")?)
//!         .subject("Disk usage")
//!         .html_body("<b>hello</b>")
//!         .build()?;
//!
//!     Mailer::new(config).send_email(&message).await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── starttls() ──→ TlsUpgraded
//!    │                            │
//!    ├──── auth_login() ─────→ Authenticated
//!    │                            │
//!    └──── mail_from() ──→ MailTransaction ──→ RecipientAdded ──→ Data ──→ Delivered
//! ```
//!
//! `quit()` is available in every state and always closes the transport.
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders and DATA framing
//! - [`config`]: Relay configuration
//! - [`connection`]: Transport, TLS and the type-state client
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod connection;
mod error;
mod mailer;
pub mod parser;
pub mod types;

pub use config::{Credentials, Security, SmtpConfig, SmtpConfigBuilder};
pub use connection::{
    Authenticated, Client, Connected, Connector, Data, Delivered, MailTransaction,
    RecipientAdded, ServerInfo, SessionState, SmtpStream, TcpConnector, TlsUpgraded, Transport,
};
pub use error::{Error, Result};
pub use mailer::Mailer;
pub use relaymail_mime::{Attachment, Body, Mailbox, Message, MessageBuilder};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode, Severity};
