//! Outgoing message structure and encoding.

use crate::attachment::Attachment;
use crate::boundary;
use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_word};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::mailbox::Mailbox;
use chrono::{DateTime, FixedOffset, Local, Utc};
use rand::Rng;
use std::fmt;

/// Primary message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// `text/plain` body.
    Text(String),
    /// `text/html` body.
    Html(String),
}

impl Body {
    /// Creates a body from text and an HTML flag.
    #[must_use]
    pub fn new(text: impl Into<String>, is_html: bool) -> Self {
        if is_html {
            Self::Html(text.into())
        } else {
            Self::Text(text.into())
        }
    }

    /// Returns the body text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Text(text) | Self::Html(text) => text,
        }
    }

    /// Returns true for an HTML body.
    #[must_use]
    pub const fn is_html(&self) -> bool {
        matches!(self, Self::Html(_))
    }

    /// Returns the content type of the body.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Text(_) => ContentType::text_plain(),
            Self::Html(_) => ContentType::text_html(),
        }
    }

    fn to_part(&self) -> Result<Part> {
        let mut headers = Headers::new();
        headers.add("Content-Type", self.content_type().to_string())?;
        headers.add("Content-Transfer-Encoding", "base64")?;
        Ok(Part::new(headers, encode_base64_lines(self.text().as_bytes())))
    }
}

/// One rendered MIME part: headers plus already-encoded body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Encoded body; every line ends with CRLF.
    pub body: String,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: String) -> Self {
        Self { headers, body }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n{}", self.headers, self.body)
    }
}

/// Body of an encoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeBody {
    /// Single-part body (Base64 text).
    Single(String),
    /// `multipart/mixed` body.
    Multipart {
        /// Boundary token, absent from every part.
        boundary: String,
        /// Body part followed by one part per attachment.
        parts: Vec<Part>,
    },
}

/// A message rendered to structured headers and body, ready to serialise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    /// Top-level headers in transmission order.
    pub headers: Headers,
    /// Encoded body.
    pub body: MimeBody,
}

impl EncodedMessage {
    /// Returns the multipart boundary, if the message is multipart.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        match &self.body {
            MimeBody::Single(_) => None,
            MimeBody::Multipart { boundary, .. } => Some(boundary),
        }
    }

    /// Returns the multipart parts (empty for single-part messages).
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        match &self.body {
            MimeBody::Single(_) => &[],
            MimeBody::Multipart { parts, .. } => parts,
        }
    }

    /// Serialises the message to the bytes sent after `DATA`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for EncodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\r\n", self.headers)?;
        match &self.body {
            MimeBody::Single(body) => f.write_str(body),
            MimeBody::Multipart { boundary, parts } => {
                for part in parts {
                    write!(f, "--{boundary}\r\n{part}")?;
                }
                write!(f, "--{boundary}--\r\n")
            }
        }
    }
}

/// An outgoing message: one sender, one recipient, a body and attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    from: Mailbox,
    to: Mailbox,
    subject: String,
    body: Body,
    attachments: Vec<Attachment>,
    date: DateTime<FixedOffset>,
}

impl Message {
    /// Creates a message builder.
    #[must_use]
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Returns the sender.
    #[must_use]
    pub const fn from(&self) -> &Mailbox {
        &self.from
    }

    /// Returns the recipient.
    #[must_use]
    pub const fn to(&self) -> &Mailbox {
        &self.to
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the attachments.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns the `Date` header value.
    #[must_use]
    pub const fn date(&self) -> &DateTime<FixedOffset> {
        &self.date
    }

    /// Encodes the message using the thread-local RNG for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if a header cannot be built or no collision-free
    /// boundary is found.
    pub fn encode(&self) -> Result<EncodedMessage> {
        self.encode_with(&mut rand::thread_rng())
    }

    /// Encodes the message, drawing boundary and Message-ID tokens from `rng`.
    ///
    /// # Errors
    ///
    /// Returns an error if a header cannot be built or no collision-free
    /// boundary is found.
    pub fn encode_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<EncodedMessage> {
        let mut headers = Headers::new();
        headers.add("From", self.from.to_header_value())?;
        headers.add("To", self.to.to_header_value())?;
        headers.add("Subject", encode_word(&self.subject))?;
        headers.add("Date", self.date.to_rfc2822())?;
        headers.add("Message-ID", self.message_id(rng))?;
        headers.add("MIME-Version", "1.0")?;

        if self.attachments.is_empty() {
            let part = self.body.to_part()?;
            for (name, value) in part.headers.iter() {
                headers.add(name, value)?;
            }
            return Ok(EncodedMessage {
                headers,
                body: MimeBody::Single(part.body),
            });
        }

        let mut parts = Vec::with_capacity(self.attachments.len() + 1);
        parts.push(self.body.to_part()?);
        for attachment in &self.attachments {
            parts.push(attachment.to_part()?);
        }

        let rendered: Vec<String> = parts.iter().map(ToString::to_string).collect();
        let boundary = boundary::choose(&rendered, || boundary::generate(rng))?;

        headers.add(
            "Content-Type",
            ContentType::multipart_mixed(boundary.as_str()).to_string(),
        )?;

        Ok(EncodedMessage {
            headers,
            body: MimeBody::Multipart { boundary, parts },
        })
    }

    fn message_id<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        format!(
            "<{:x}.{:016x}@{}>",
            Utc::now().timestamp_millis(),
            rng.r#gen::<u64>(),
            self.from.domain()
        )
    }
}

/// Builder for outgoing messages.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<Mailbox>,
    to: Option<Mailbox>,
    subject: String,
    body: Option<Body>,
    attachments: Vec<Attachment>,
    date: Option<DateTime<FixedOffset>>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender.
    #[must_use]
    pub fn from(mut self, from: Mailbox) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the recipient.
    #[must_use]
    pub fn to(mut self, to: Mailbox) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets a `text/plain` body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.body = Some(Body::Text(text.into()));
        self
    }

    /// Sets a `text/html` body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.body = Some(Body::Html(html.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the `Date` header (defaults to the local time at build).
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Builds the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] if the sender or recipient is unset.
    pub fn build(self) -> Result<Message> {
        Ok(Message {
            from: self.from.ok_or(Error::MissingField("from"))?,
            to: self.to.ok_or(Error::MissingField("to"))?,
            subject: self.subject,
            body: self.body.unwrap_or_else(|| Body::Text(String::new())),
            attachments: self.attachments,
            date: self.date.unwrap_or_else(|| Local::now().fixed_offset()),
        })
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
    use crate::encoding::{decode_base64_lines, decode_rfc2047};
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822("Tue, 1 Jul 2003 10:52:37 +0200").unwrap()
    }

    fn builder() -> MessageBuilder {
        Message::builder()
            .from(Mailbox::with_name("Ops Desk", "a@x.org").unwrap())
            .to(Mailbox::new("b@x.org").unwrap())
            .subject("Hi")
            .date(fixed_date())
    }

    fn body_after_headers(raw: &str) -> &str {
        raw.split_once("\r\n\r\n").unwrap().1
    }

    #[test]
    fn test_build_requires_addresses() {
        assert!(matches!(
            Message::builder().to(Mailbox::new("b@x.org").unwrap()).build(),
            Err(Error::MissingField("from"))
        ));
        assert!(matches!(
            Message::builder().from(Mailbox::new("a@x.org").unwrap()).build(),
            Err(Error::MissingField("to"))
        ));
    }

    #[test]
    fn test_header_order() {
        let message = builder().text_body("hello").build().unwrap();
        let encoded = message.encode_with(&mut StepRng::new(1, 1)).unwrap();

        let names: Vec<&str> = encoded.headers.iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "From",
                "To",
                "Subject",
                "Date",
                "Message-ID",
                "MIME-Version",
                "Content-Type",
                "Content-Transfer-Encoding",
            ]
        );
        assert_eq!(encoded.headers.get("Date"), Some("Tue, 1 Jul 2003 10:52:37 +0200"));
        assert_eq!(encoded.headers.get("MIME-Version"), Some("1.0"));
    }

    #[test]
    fn test_subject_always_encoded() {
        let message = builder().build().unwrap();
        let encoded = message.encode().unwrap();
        let subject = encoded.headers.get("Subject").unwrap();
        assert_eq!(subject, "=?UTF-8?B?SGk=?=");
        assert_eq!(decode_rfc2047(subject).unwrap(), "Hi");
    }

    #[test]
    fn test_from_name_encoded() {
        let encoded = builder().build().unwrap().encode().unwrap();
        let from = encoded.headers.get("From").unwrap();
        assert!(from.ends_with(" <a@x.org>"));
        assert_eq!(decode_rfc2047(from.trim_end_matches(" <a@x.org>")).unwrap(), "Ops Desk");
        assert_eq!(encoded.headers.get("To"), Some("b@x.org"));
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let encoded = builder().build().unwrap().encode().unwrap();
        let id = encoded.headers.get("Message-ID").unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@x.org>"));
    }

    #[test]
    fn test_plain_text_round_trip() {
        let text = "Shift roster for Tuesday.\nAll units report at 06:00 — ünïcode ✓";
        let message = builder().text_body(text).build().unwrap();
        let encoded = message.encode().unwrap();

        assert!(encoded.boundary().is_none());
        assert_eq!(
            encoded.headers.get("Content-Type"),
            Some("text/plain; charset=UTF-8")
        );
        assert_eq!(encoded.headers.get("Content-Transfer-Encoding"), Some("base64"));

        let raw = String::from_utf8(encoded.to_bytes()).unwrap();
        let decoded = decode_base64_lines(body_after_headers(&raw)).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }

    #[test]
    fn test_html_single_part() {
        let message = builder().html_body("<b>hello</b>").build().unwrap();
        let encoded = message.encode().unwrap();
        assert_eq!(
            encoded.headers.get("Content-Type"),
            Some("text/html; charset=UTF-8")
        );
        assert!(encoded.parts().is_empty());
    }

    #[test]
    fn test_lines_end_with_crlf() {
        let message = builder()
            .text_body("x".repeat(300))
            .attach(Attachment::new("a.bin", vec![0u8; 300]))
            .build()
            .unwrap();
        let raw = String::from_utf8(message.encode().unwrap().to_bytes()).unwrap();

        assert!(raw.ends_with("--\r\n"));
        for line in raw.split("\r\n") {
            assert!(!line.contains('\n'));
            assert!(line.len() <= 998);
        }
    }

    #[test]
    fn test_multipart_structure() {
        let message = builder()
            .html_body("<p>report</p>")
            .attach(Attachment::new("one.pdf", b"%PDF-1.4".to_vec()))
            .attach(Attachment::inferred("two.png", vec![0x89, b'P', b'N', b'G']))
            .build()
            .unwrap();
        let encoded = message.encode().unwrap();
        let boundary = encoded.boundary().unwrap().to_string();

        assert_eq!(
            encoded.headers.get("Content-Type"),
            Some(format!("multipart/mixed; boundary=\"{boundary}\"").as_str())
        );
        assert!(encoded.headers.get("Content-Transfer-Encoding").is_none());

        let raw = String::from_utf8(encoded.to_bytes()).unwrap();
        let delimiter = format!("--{boundary}");
        let closing = format!("--{boundary}--");
        let lines: Vec<&str> = raw.split("\r\n").collect();
        assert_eq!(lines.iter().filter(|l| **l == delimiter).count(), 3);
        assert_eq!(lines.iter().filter(|l| **l == closing).count(), 1);

        let parts = encoded.parts();
        assert_eq!(
            parts[0].headers.get("Content-Type"),
            Some("text/html; charset=UTF-8")
        );
        assert_eq!(
            parts[2].headers.get("Content-Type"),
            Some("image/png; name=\"two.png\"")
        );
        assert_eq!(decode_base64_lines(&parts[1].body).unwrap(), b"%PDF-1.4");
    }

    proptest! {
        #[test]
        fn boundary_delimits_n_plus_one_parts(
            contents in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..512),
                0..5,
            ),
            body in ".{0,200}",
        ) {
            let mut builder = builder().text_body(body);
            for (idx, content) in contents.iter().enumerate() {
                let name = format!("file{idx}.bin");
                builder = builder.attach(Attachment::new(name, content.clone()));
            }
            let encoded = builder.build().unwrap().encode().unwrap();
            let raw = String::from_utf8(encoded.to_bytes()).unwrap();

            if contents.is_empty() {
                prop_assert!(encoded.boundary().is_none());
            } else {
                let boundary = encoded.boundary().unwrap();
                for part in encoded.parts() {
                    prop_assert!(!part.to_string().contains(boundary));
                }
                let delimiter = format!("--{boundary}");
                let count = raw.split("\r\n").filter(|l| *l == delimiter).count();
                prop_assert_eq!(count, contents.len() + 1);
            }
        }
    }
}
