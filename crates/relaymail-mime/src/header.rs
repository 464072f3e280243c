//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of header fields.
///
/// Field names keep the case they were added with and are serialised in
/// insertion order. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header field.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name or the value
    /// contains a line break that is not a folding whitespace.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        validate_name(&name)?;
        validate_value(&name, &value)?;
        self.fields.push((name, value));
        Ok(())
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns an iterator over all fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidHeader("Empty header name".to_string()));
    }

    // RFC 5322 ftext: printable US-ASCII except colon
    if !name.bytes().all(|b| (33..=126).contains(&b) && b != b':') {
        return Err(Error::InvalidHeader(format!("Invalid header name: {name}")));
    }

    Ok(())
}

fn validate_value(name: &str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        let folded = match b {
            b'\r' => bytes.get(idx + 1) == Some(&b'\n'),
            b'\n' => idx > 0 && bytes[idx - 1] == b'\r',
            _ => true,
        };
        let continues = b != b'\n' || matches!(bytes.get(idx + 1), Some(b' ' | b'\t'));

        if !folded || !continues {
            return Err(Error::InvalidHeader(format!(
                "Bare line break in {name} header"
            )));
        }
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
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
    }

    #[test]
    fn test_headers_keep_order_and_case() {
        let mut headers = Headers::new();
        headers.add("From", "a@x.org").unwrap();
        headers.add("To", "b@x.org").unwrap();
        headers.add("MIME-Version", "1.0").unwrap();

        let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["From", "To", "MIME-Version"]);
        assert_eq!(
            headers.to_string(),
            "From: a@x.org\r\nTo: b@x.org\r\nMIME-Version: 1.0\r\n"
        );
    }

    #[test]
    fn test_headers_accept_folded_value() {
        let mut headers = Headers::new();
        assert!(
            headers
                .add("Subject", "=?UTF-8?B?YQ==?=\r\n =?UTF-8?B?Yg==?=")
                .is_ok()
        );
    }

    #[test]
    fn test_headers_reject_injection() {
        let mut headers = Headers::new();
        assert!(headers.add("Subject", "Hi\r\nBcc: evil@x.org").is_err());
        assert!(headers.add("Subject", "Hi\nBcc: evil@x.org").is_err());
        assert!(headers.add("Subject", "Hi\r").is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_reject_bad_name() {
        let mut headers = Headers::new();
        assert!(headers.add("", "x").is_err());
        assert!(headers.add("X Bad", "x").is_err());
        assert!(headers.add("X:Bad", "x").is_err());
    }
}
