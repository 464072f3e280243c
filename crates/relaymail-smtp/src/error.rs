//! Error types for SMTP operations.

use crate::types::{Reply, ReplyCode, Severity};
use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every variant aborts the send in progress; none is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The socket could not be opened.
    #[error("Connection failed: {0}")]
    Connection(#[source] io::Error),

    /// TLS handshake or certificate verification failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// No response within the configured bound.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Server replied with a status other than the expected one.
    #[error("Unexpected reply {code} (expected {expected}): {message}")]
    Protocol {
        /// Reply code received (e.g., 550).
        code: u16,
        /// Reply code the command required.
        expected: u16,
        /// Raw reply text.
        message: String,
    },

    /// Server sent something that is not an SMTP reply.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// An AUTH LOGIN step was rejected.
    #[error("Authentication failed: {} {}", reply.code, reply.message_text())]
    Auth {
        /// The last reply received during the exchange.
        reply: Reply,
    },

    /// The configuration cannot be used (e.g., auth required without
    /// credentials).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid envelope address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message could not be encoded.
    #[error("Message encoding failed: {0}")]
    Mime(#[from] relaymail_mime::Error),
}

impl Error {
    /// Creates a protocol error from an unexpected reply.
    #[must_use]
    pub fn unexpected(expected: u16, reply: &Reply) -> Self {
        Self::Protocol {
            code: reply.code.as_u16(),
            expected,
            message: reply.message_text(),
        }
    }

    /// Returns the reply code carried by the error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::Protocol { code, .. } => Some(*code),
            Self::Auth { reply } => Some(reply.code.as_u16()),
            _ => None,
        }
    }

    /// Returns the last raw server response text carried by the error.
    #[must_use]
    pub fn last_reply(&self) -> Option<String> {
        match self {
            Self::Protocol { message, .. } => Some(message.clone()),
            Self::Auth { reply } => Some(reply.message_text()),
            Self::MalformedReply(raw) => Some(raw.clone()),
            _ => None,
        }
    }

    /// Returns the severity of the carried reply code, if any.
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        match self.code() {
            Some(code) => Some(ReplyCode::new(code).severity()),
            None => None,
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.severity() == Some(Severity::Permanent)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.severity() == Some(Severity::Transient)
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

    #[test]
    fn test_protocol_error_exposes_reply() {
        let reply = Reply::new(
            ReplyCode::MAILBOX_UNAVAILABLE,
            vec!["5.1.1 No such user".to_string()],
        );
        let err = Error::unexpected(250, &reply);

        assert_eq!(err.code(), Some(550));
        assert_eq!(err.last_reply().as_deref(), Some("5.1.1 No such user"));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "Unexpected reply 550 (expected 250): 5.1.1 No such user"
        );
    }

    #[test]
    fn test_auth_error_exposes_reply() {
        let reply = Reply::new(ReplyCode::AUTH_FAILED, vec!["Bad credentials".to_string()]);
        let err = Error::Auth { reply };

        assert_eq!(err.code(), Some(535));
        assert_eq!(err.last_reply().as_deref(), Some("Bad credentials"));
        assert_eq!(err.to_string(), "Authentication failed: 535 Bad credentials");
    }

    #[test]
    fn test_transient() {
        let reply = Reply::new(ReplyCode::MAILBOX_BUSY, vec!["Try later".to_string()]);
        assert!(Error::unexpected(250, &reply).is_transient());
    }

    #[test]
    fn test_non_reply_errors() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert_eq!(err.code(), None);
        assert!(err.last_reply().is_none());
        assert!(!err.is_permanent());
    }
}
