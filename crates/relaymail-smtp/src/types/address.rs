//! Envelope address type.

use crate::error::{Error, Result};
use relaymail_mime::Mailbox;

/// Email address for the SMTP envelope (`MAIL FROM` / `RCPT TO`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or could break out of the
    /// envelope command.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        Mailbox::new(addr.as_str()).map_err(|e| Error::InvalidAddress(e.to_string()))?;
        Ok(Self(addr))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Mailbox> for Address {
    fn from(mailbox: &Mailbox) -> Self {
        // Mailbox addresses are validated on construction.
        Self(mailbox.address().to_string())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
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
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
        assert_eq!(addr.to_string(), "user@example.com");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(Address::new(""), Err(Error::InvalidAddress(_))));
        assert!(Address::new("userexample.com").is_err());
        assert!(Address::new("@example.com").is_err());
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_rejects_command_injection() {
        assert!(Address::new("a@x.org>\r\nRCPT TO:<b@x.org").is_err());
    }

    #[test]
    fn test_from_mailbox() {
        let mailbox = Mailbox::with_name("Crew", "crew@x.org").unwrap();
        assert_eq!(Address::from(&mailbox).as_str(), "crew@x.org");
    }
}
