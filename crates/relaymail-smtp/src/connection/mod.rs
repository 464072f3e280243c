//! SMTP connection management with type-state pattern.

mod client;
mod stream;
mod transport;

pub use client::{
    AuthCapable, Authenticated, Client, Connected, Data, Delivered, MailReady, MailTransaction,
    RecipientAdded, SessionState, State, TlsUpgraded,
};
pub use stream::{MAX_LINE_LENGTH, SmtpStream, TcpConnector, create_tls_connector};
pub use transport::{Connector, Transport};

use crate::types::{AuthMechanism, Extension};

/// Server capabilities from the greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Extensions advertised by the latest EHLO, in order.
    pub extensions: Vec<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[AuthMechanism] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Checks if AUTH LOGIN is advertised.
    #[must_use]
    pub fn supports_auth_login(&self) -> bool {
        self.auth_mechanisms().contains(&AuthMechanism::Login)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "relay.example.org".to_string(),
            extensions: lines.iter().map(|l| Extension::parse(l)).collect(),
        }
    }

    #[test]
    fn test_capabilities() {
        let info = info(&["PIPELINING", "SIZE 35882577", "STARTTLS", "AUTH PLAIN LOGIN"]);
        assert!(info.supports_starttls());
        assert!(info.supports_auth_login());
        assert_eq!(info.max_message_size(), Some(35_882_577));
        assert_eq!(info.auth_mechanisms().len(), 2);
    }

    #[test]
    fn test_no_capabilities() {
        let info = info(&[]);
        assert!(!info.supports_starttls());
        assert!(!info.supports_auth_login());
        assert_eq!(info.max_message_size(), None);
        assert!(info.auth_mechanisms().is_empty());
    }
}
