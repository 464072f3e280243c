//! MIME content type handling.

use crate::encoding::CHARSET;
use crate::error::{Error, Result};
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters in serialisation order (e.g., charset, boundary, name).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a `text/plain; charset=UTF-8` content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", CHARSET)
    }

    /// Creates a `text/html; charset=UTF-8` content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", CHARSET)
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Creates the `application/octet-stream` content type.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Guesses a content type from a filename extension.
    ///
    /// Unknown or missing extensions fall back to `application/octet-stream`.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let (main_type, sub_type) = match extension.as_str() {
            "txt" | "log" => ("text", "plain"),
            "htm" | "html" => ("text", "html"),
            "csv" => ("text", "csv"),
            "pdf" => ("application", "pdf"),
            "json" => ("application", "json"),
            "xml" => ("application", "xml"),
            "zip" => ("application", "zip"),
            "gz" => ("application", "gzip"),
            "xlsx" => (
                "application",
                "vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            "docx" => (
                "application",
                "vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
            "png" => ("image", "png"),
            "jpg" | "jpeg" => ("image", "jpeg"),
            "gif" => ("image", "gif"),
            "svg" => ("image", "svg+xml"),
            _ => return Self::octet_stream(),
        };

        Self::new(main_type, sub_type)
    }

    /// Adds a parameter, replacing an existing one with the same key.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self
            .parameters
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        {
            slot.1 = value;
        } else {
            self.parameters.push((key, value));
        }
        self
    }

    /// Returns a parameter value by key.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Parses a declared content type such as `image/png` or
    /// `text/csv; charset=UTF-8`.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is invalid.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split(';');

        let type_str = parts.next().unwrap_or_default().trim();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {s}")))?;

        let main_type = main_type.trim();
        let sub_type = sub_type.trim();
        if !is_token(main_type) || !is_token(sub_type) {
            return Err(Error::InvalidContentType(s.to_string()));
        }

        let mut content_type = Self::new(main_type.to_lowercase(), sub_type.to_lowercase());

        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (key, value) = param
                .split_once('=')
                .ok_or_else(|| Error::InvalidContentType(format!("Bad parameter: {param}")))?;
            let value = value.trim().trim_matches('"');
            content_type = content_type.with_parameter(key.trim().to_lowercase(), value);
        }

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        // Only charset goes out bare; boundary and name are always quoted.
        for (key, value) in &self.parameters {
            if key.eq_ignore_ascii_case("charset") && is_token(value) {
                write!(f, "; {key}={value}")?;
            } else {
                write!(f, "; {key}=\"{}\"", quote(value))?;
            }
        }
        Ok(())
    }
}

/// Escapes a parameter value for use inside a quoted string.
pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            '\r' | '\n' => {}
            _ => quoted.push(ch),
        }
    }
    quoted
}

/// RFC 2045 token: printable ASCII minus space and tspecials.
fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
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
    fn test_text_types_display() {
        assert_eq!(ContentType::text_plain().to_string(), "text/plain; charset=UTF-8");
        assert_eq!(ContentType::text_html().to_string(), "text/html; charset=UTF-8");
    }

    #[test]
    fn test_multipart_boundary_is_quoted() {
        let ct = ContentType::multipart_mixed("=_Part_abc");
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("=_Part_abc"));
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"=_Part_abc\"");
    }

    #[test]
    fn test_name_parameter_escaped() {
        let ct = ContentType::octet_stream().with_parameter("name", "we\"ird\\.bin");
        assert_eq!(
            ct.to_string(),
            "application/octet-stream; name=\"we\\\"ird\\\\.bin\""
        );
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(ContentType::from_filename("report.PDF").essence(), "application/pdf");
        assert_eq!(ContentType::from_filename("photo.jpeg").essence(), "image/jpeg");
        assert_eq!(
            ContentType::from_filename("noext").essence(),
            "application/octet-stream"
        );
        assert_eq!(
            ContentType::from_filename("archive.unknown").essence(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_parse() {
        let ct = ContentType::parse("Text/CSV; charset=\"UTF-8\"").unwrap();
        assert_eq!(ct.essence(), "text/csv");
        assert_eq!(ct.parameter("charset"), Some("UTF-8"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ContentType::parse("textplain").is_err());
        assert!(ContentType::parse("text/").is_err());
        assert!(ContentType::parse("text/plain; charset").is_err());
    }

    #[test]
    fn test_with_parameter_replaces() {
        let ct = ContentType::text_plain().with_parameter("Charset", "us-ascii");
        assert_eq!(ct.parameters.len(), 1);
        assert_eq!(ct.parameter("charset"), Some("us-ascii"));
    }
}
