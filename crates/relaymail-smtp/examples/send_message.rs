#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: send one HTML message through a relay
//!
//! Connection settings come from the environment:
//!
//! | Variable         | Default      |
//! |------------------|--------------|
//! | `SMTP_HOST`      | `localhost`  |
//! | `SMTP_PORT`      | from security |
//! | `SMTP_SECURITY`  | `tls` (`ssl`, `tls` or `none`) |
//! | `SMTP_USER`      | unset        |
//! | `SMTP_PASSWORD`  | unset        |
//! | `MAIL_FROM`      | required     |
//! | `MAIL_TO`        | required     |
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=relaymail_smtp=debug MAIL_FROM=bot@example.com MAIL_TO=ops@example.com \
//!     cargo run --package relaymail-smtp --example send_message -- report.pdf
//! ```
//!
//! Every path given on the command line is attached.

use relaymail_smtp::{Attachment, Mailbox, Mailer, Message, Security, SmtpConfig};
use std::env;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaymail_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let security: Security = env::var("SMTP_SECURITY")
        .unwrap_or_else(|_| "tls".into())
        .parse()?;
    let host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".into());
    let mut config = SmtpConfig::builder(host)
        .security(security)
        .client_id("relaymail.example");
    if let Ok(port) = env::var("SMTP_PORT") {
        config = config.port(port.parse()?);
    }
    if let (Ok(user), Ok(password)) = (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
        config = config.credentials(user, password);
    }
    let config = config.build();

    let mut message = Message::builder()
        .from(Mailbox::with_name("relaymail", env::var("MAIL_FROM")?)?)
        .to(Mailbox::new(env::var("MAIL_TO")?)?)
        .subject("relaymail test message")
        .html_body("<p>Sent by <b>relaymail</b>.</p>");
    for path in env::args().skip(1) {
        let content = std::fs::read(&path)?;
        message = message.attach(Attachment::inferred(path, content));
    }
    let message = message.build()?;

    println!(
        "Sending to {} via {}:{} ({})...",
        message.to(),
        config.host,
        config.port,
        config.security
    );
    Mailer::new(config).send_email(&message).await?;
    println!("✓ Accepted by relay");

    Ok(())
}
