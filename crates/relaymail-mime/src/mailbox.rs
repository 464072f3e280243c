//! Mailbox (display name + address) types.

use crate::encoding::encode_word;
use crate::error::{Error, Result};
use std::fmt;

/// Mailbox (optional display name + address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    name: Option<String>,
    address: String,
}

impl Mailbox {
    /// Creates a new mailbox with just an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        validate_address(&address)?;
        Ok(Self {
            name: None,
            address,
        })
    }

    /// Creates a new mailbox with a display name and address.
    ///
    /// An empty or whitespace-only name is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Result<Self> {
        let mut mailbox = Self::new(address)?;
        let name = name.into();
        if !name.trim().is_empty() {
            mailbox.name = Some(name);
        }
        Ok(mailbox)
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the bare address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the domain part of the address.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain)
    }

    /// Renders the mailbox for a header field.
    ///
    /// A display name is always B-encoded: `=?UTF-8?B?...?= <addr>`.
    /// Without one the bare address is used.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", encode_word(name), self.address),
            None => self.address.clone(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Validates an email address (basic validation).
///
/// Rejects anything that could break out of a header field or an SMTP
/// envelope command.
fn validate_address(addr: &str) -> Result<()> {
    if addr.is_empty() {
        return Err(Error::InvalidAddress("Address cannot be empty".into()));
    }

    if addr
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | ',' | ';'))
    {
        return Err(Error::InvalidAddress(format!(
            "Address contains forbidden characters: {addr:?}"
        )));
    }

    let Some((local, domain)) = addr.split_once('@') else {
        return Err(Error::InvalidAddress("Address must contain @".into()));
    };

    if domain.contains('@') {
        return Err(Error::InvalidAddress(
            "Address must have exactly one @".into(),
        ));
    }

    if local.is_empty() || domain.is_empty() {
        return Err(Error::InvalidAddress(
            "Local and domain parts cannot be empty".into(),
        ));
    }

    Ok(())
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
        let mailbox = Mailbox::new("user@example.com").unwrap();
        assert_eq!(mailbox.address(), "user@example.com");
        assert_eq!(mailbox.domain(), "example.com");
        assert!(mailbox.name().is_none());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(Mailbox::new("").is_err());
        assert!(Mailbox::new("userexample.com").is_err());
        assert!(Mailbox::new("@example.com").is_err());
        assert!(Mailbox::new("user@").is_err());
        assert!(Mailbox::new("a@b@c").is_err());
        assert!(Mailbox::new("user@example.com>\r\nRCPT TO:<x@y").is_err());
        assert!(Mailbox::new("john doe@example.com").is_err());
    }

    #[test]
    fn test_header_value_without_name() {
        let mailbox = Mailbox::new("a@x.org").unwrap();
        assert_eq!(mailbox.to_header_value(), "a@x.org");
    }

    #[test]
    fn test_header_value_with_name() {
        let mailbox = Mailbox::with_name("Dispatch", "a@x.org").unwrap();
        assert_eq!(mailbox.name(), Some("Dispatch"));
        assert_eq!(mailbox.to_header_value(), "=?UTF-8?B?RGlzcGF0Y2g=?= <a@x.org>");
    }

    #[test]
    fn test_blank_name_is_ignored() {
        let mailbox = Mailbox::with_name("  ", "a@x.org").unwrap();
        assert!(mailbox.name().is_none());
    }

    #[test]
    fn test_display() {
        let mailbox = Mailbox::with_name("Jo", "jo@x.org").unwrap();
        assert_eq!(mailbox.to_string(), "Jo <jo@x.org>");
    }
}
