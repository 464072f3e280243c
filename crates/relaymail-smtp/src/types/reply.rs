//! SMTP reply types.

use std::fmt;

/// A parsed server reply: its code and one text entry per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply text, one entry per line, without the code prefix.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns the text of the first line, or `""`.
    #[must_use]
    pub fn first_line(&self) -> &str {
        self.message.first().map_or("", String::as_str)
    }

    /// Returns the severity of the reply code.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns true for a positive completion (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.severity(), Severity::Completion)
    }

    /// Returns true for a transient failure (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        matches!(self.severity(), Severity::Transient)
    }

    /// Returns true for a permanent failure (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        matches!(self.severity(), Severity::Permanent)
    }

    /// Returns all lines joined with `\n`.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }
}

/// First digit of a reply code (RFC 5321 section 4.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// 2xx: the command was accepted.
    Completion,
    /// 3xx: accepted, more input expected.
    Intermediate,
    /// 4xx: rejected for now; a later attempt may succeed.
    Transient,
    /// 5xx: rejected.
    Permanent,
    /// Anything outside 2xx-5xx.
    Unknown,
}

/// Three-digit SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self.0 / 100 {
            2 => Severity::Completion,
            3 => Severity::Intermediate,
            4 => Severity::Transient,
            5 => Severity::Permanent,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

// Codes the session expects, plus the failures worth naming
impl ReplyCode {
    /// 220 greeting, or go-ahead for STARTTLS
    pub const SERVICE_READY: Self = Self(220);
    /// 221 reply to QUIT
    pub const CLOSING: Self = Self(221);
    /// 235 AUTH accepted
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 command completed
    pub const OK: Self = Self(250);
    /// 334 AUTH challenge
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 send the message
    pub const START_DATA: Self = Self(354);
    /// 421 relay shutting down
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 450 mailbox busy
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 454 TLS temporarily unavailable
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 500 command not recognised
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 503 commands out of order
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 530 authentication required
    pub const AUTH_REQUIRED: Self = Self(530);
    /// 535 credentials rejected
    pub const AUTH_FAILED: Self = Self(535);
    /// 550 mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 554 transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
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
    fn severity_by_first_digit() {
        assert_eq!(ReplyCode::OK.severity(), Severity::Completion);
        assert_eq!(ReplyCode::CLOSING.severity(), Severity::Completion);
        assert_eq!(ReplyCode::AUTH_CONTINUE.severity(), Severity::Intermediate);
        assert_eq!(ReplyCode::START_DATA.severity(), Severity::Intermediate);
        assert_eq!(ReplyCode::TLS_UNAVAILABLE.severity(), Severity::Transient);
        assert_eq!(ReplyCode::AUTH_FAILED.severity(), Severity::Permanent);
        assert_eq!(ReplyCode::new(0).severity(), Severity::Unknown);
        assert_eq!(ReplyCode::new(699).severity(), Severity::Unknown);
    }

    #[test]
    fn display_pads_to_three_digits() {
        assert_eq!(ReplyCode::START_DATA.to_string(), "354");
        assert_eq!(ReplyCode::new(0).to_string(), "000");
    }

    #[test]
    fn reply_predicates() {
        let reply = Reply::new(ReplyCode::MAILBOX_BUSY, vec!["Busy".to_string()]);
        assert!(!reply.is_success());
        assert!(reply.is_transient_error());
        assert!(!reply.is_permanent_error());
    }

    #[test]
    fn first_line_and_text() {
        let reply = Reply::new(
            ReplyCode::OK,
            vec!["relay.example.org".to_string(), "STARTTLS".to_string()],
        );
        assert_eq!(reply.first_line(), "relay.example.org");
        assert_eq!(reply.message_text(), "relay.example.org\nSTARTTLS");

        let empty = Reply::new(ReplyCode::OK, vec![]);
        assert_eq!(empty.first_line(), "");
        assert_eq!(empty.message_text(), "");
    }
}
