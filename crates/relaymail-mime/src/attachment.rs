//! File attachments.

use crate::content_type::{ContentType, quote};
use crate::encoding::{encode_base64_lines, encode_rfc2047};
use crate::error::Result;
use crate::header::Headers;
use crate::message::Part;

/// A binary attachment carried as its own multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content: Vec<u8>,
    content_type: ContentType,
}

impl Attachment {
    /// Creates an `application/octet-stream` attachment.
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: sanitize_filename(&filename.into()),
            content: content.into(),
            content_type: ContentType::octet_stream(),
        }
    }

    /// Creates an attachment whose content type is guessed from the filename.
    #[must_use]
    pub fn inferred(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = sanitize_filename(&filename.into());
        let content_type = ContentType::from_filename(&filename);
        Self {
            filename,
            content: content.into(),
            content_type,
        }
    }

    /// Overrides the content type with a declared one.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Returns the filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the raw content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content type.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Renders the attachment as a base64 MIME part.
    pub(crate) fn to_part(&self) -> Result<Part> {
        // Non-ASCII names go out as an encoded word inside the quoted string,
        // which is what most clients understand.
        let name = encode_rfc2047(&self.filename);
        let content_type = self
            .content_type
            .clone()
            .with_parameter("name", name.replace("\r\n ", " "));

        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string())?;
        headers.add("Content-Transfer-Encoding", "base64")?;
        headers.add(
            "Content-Disposition",
            format!(
                "attachment; filename=\"{}\"",
                quote(&name.replace("\r\n ", " "))
            ),
        )?;

        Ok(Part::new(headers, encode_base64_lines(&self.content)))
    }
}

/// Strips path components and control characters from a filename.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();

    if cleaned.trim().is_empty() {
        "attachment.bin".to_string()
    } else {
        cleaned
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
    use crate::encoding::decode_base64_lines;

    #[test]
    fn test_default_content_type() {
        let attachment = Attachment::new("roster.pdf", b"%PDF".to_vec());
        assert_eq!(attachment.content_type().essence(), "application/octet-stream");
    }

    #[test]
    fn test_inferred_content_type() {
        let attachment = Attachment::inferred("roster.pdf", b"%PDF".to_vec());
        assert_eq!(attachment.content_type().essence(), "application/pdf");
    }

    #[test]
    fn test_declared_content_type() {
        let attachment = Attachment::new("map", vec![1, 2, 3])
            .with_content_type(ContentType::new("image", "png"));
        assert_eq!(attachment.content_type().essence(), "image/png");
    }

    #[test]
    fn test_filename_sanitized() {
        assert_eq!(Attachment::new("../../etc/passwd", vec![]).filename(), "passwd");
        assert_eq!(Attachment::new("C:\\tmp\\a.txt", vec![]).filename(), "a.txt");
        assert_eq!(Attachment::new("a\r\nb.txt", vec![]).filename(), "ab.txt");
        assert_eq!(Attachment::new("", vec![]).filename(), "attachment.bin");
    }

    #[test]
    fn test_part_headers() {
        let part = Attachment::new("report.pdf", b"binary\x00data".to_vec())
            .to_part()
            .unwrap();

        assert_eq!(
            part.headers.get("Content-Type"),
            Some("application/octet-stream; name=\"report.pdf\"")
        );
        assert_eq!(part.headers.get("Content-Transfer-Encoding"), Some("base64"));
        assert_eq!(
            part.headers.get("Content-Disposition"),
            Some("attachment; filename=\"report.pdf\"")
        );
        assert_eq!(decode_base64_lines(&part.body).unwrap(), b"binary\x00data");
    }

    #[test]
    fn test_non_ascii_filename_encoded() {
        let part = Attachment::new("résumé.txt", b"x".to_vec()).to_part().unwrap();
        let disposition = part.headers.get("Content-Disposition").unwrap();
        assert!(disposition.starts_with("attachment; filename=\"=?UTF-8?B?"));
    }
}
