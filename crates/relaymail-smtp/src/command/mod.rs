//! SMTP command builder.

use crate::types::{Address, ReplyCode};
use std::fmt;

/// SMTP command together with the reply code that means success for it.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Client identity
        hostname: String,
    },
    /// STARTTLS - Upgrade to TLS
    StartTls,
    /// AUTH LOGIN - Begin the LOGIN exchange
    AuthLogin,
    /// Base64 username sent after the first 334 prompt
    AuthUsername(String),
    /// Base64 password sent after the second 334 prompt
    AuthPassword(String),
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Returns the reply code that constitutes success for this command.
    #[must_use]
    pub const fn expected(&self) -> ReplyCode {
        match self {
            Self::Ehlo { .. } | Self::MailFrom { .. } | Self::RcptTo { .. } => ReplyCode::OK,
            Self::StartTls => ReplyCode::SERVICE_READY,
            Self::AuthLogin | Self::AuthUsername(_) => ReplyCode::AUTH_CONTINUE,
            Self::AuthPassword(_) => ReplyCode::AUTH_SUCCESS,
            Self::Data => ReplyCode::START_DATA,
            Self::Quit => ReplyCode::CLOSING,
        }
    }

    /// Serializes the command to bytes, CRLF included.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { hostname } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(hostname.as_bytes());
            }
            Self::StartTls => buf.extend_from_slice(b"STARTTLS"),
            Self::AuthLogin => buf.extend_from_slice(b"AUTH LOGIN"),
            Self::AuthUsername(encoded) | Self::AuthPassword(encoded) => {
                buf.extend_from_slice(encoded.as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => buf.extend_from_slice(b"DATA"),
            Self::Quit => buf.extend_from_slice(b"QUIT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

// Log form: credentials never appear.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthUsername(_) | Self::AuthPassword(_) => f.write_str("<redacted>"),
            other => {
                let line = other.serialize();
                f.write_str(String::from_utf8_lossy(&line).trim_end())
            }
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({self})")
    }
}

/// Prepares a message for transmission after `DATA`.
///
/// Line endings are normalised to CRLF, lines starting with `.` are
/// dot-stuffed, and the terminating `.` line is appended.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 5);
    let body = message
        .strip_suffix(b"\r\n")
        .or_else(|| message.strip_suffix(b"\n"))
        .unwrap_or(message);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
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
    fn test_ehlo_command() {
        let cmd = Command::Ehlo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO client.example.com\r\n");
        assert_eq!(cmd.expected(), ReplyCode::OK);
    }

    #[test]
    fn test_starttls_command() {
        assert_eq!(Command::StartTls.serialize(), b"STARTTLS\r\n");
        assert_eq!(Command::StartTls.expected(), ReplyCode::SERVICE_READY);
    }

    #[test]
    fn test_auth_login_sequence() {
        assert_eq!(Command::AuthLogin.serialize(), b"AUTH LOGIN\r\n");
        assert_eq!(Command::AuthLogin.expected(), ReplyCode::AUTH_CONTINUE);

        let user = Command::AuthUsername("dQ==".to_string());
        assert_eq!(user.serialize(), b"dQ==\r\n");
        assert_eq!(user.expected(), ReplyCode::AUTH_CONTINUE);

        let pass = Command::AuthPassword("cA==".to_string());
        assert_eq!(pass.serialize(), b"cA==\r\n");
        assert_eq!(pass.expected(), ReplyCode::AUTH_SUCCESS);
    }

    #[test]
    fn test_credentials_redacted() {
        let pass = Command::AuthPassword("c2VjcmV0".to_string());
        assert_eq!(pass.to_string(), "<redacted>");
        assert!(!format!("{pass:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn test_envelope_commands() {
        let from = Command::MailFrom {
            from: Address::new("sender@example.com").unwrap(),
        };
        assert_eq!(from.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
        assert_eq!(from.to_string(), "MAIL FROM:<sender@example.com>");

        let to = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(to.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
        assert_eq!(to.expected(), ReplyCode::OK);
    }

    #[test]
    fn test_data_and_quit() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Data.expected(), ReplyCode::START_DATA);
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
        assert_eq!(Command::Quit.expected(), ReplyCode::CLOSING);
    }

    #[test]
    fn test_encode_data_terminates() {
        assert_eq!(encode_data(b"Subject: x\r\n\r\nbody\r\n"), b"Subject: x\r\n\r\nbody\r\n.\r\n");
    }

    #[test]
    fn test_encode_data_normalises_newlines() {
        assert_eq!(encode_data(b"a\nb"), b"a\r\nb\r\n.\r\n");
    }

    #[test]
    fn test_encode_data_dot_stuffing() {
        assert_eq!(encode_data(b".hidden\r\n..two\r\n"), b"..hidden\r\n...two\r\n.\r\n");
    }

    #[test]
    fn test_encode_data_empty() {
        assert_eq!(encode_data(b""), b".\r\n");
    }
}
