//! Session tests against a scripted transport.
//!
//! The mock replays canned reply lines and records every write, upgrade and
//! close, so command order and connection cleanup can be checked without a
//! real relay.

#![allow(clippy::unwrap_used, clippy::similar_names, clippy::unused_async)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use relaymail_mime::encoding::{decode_base64, decode_base64_lines};
use relaymail_smtp::{
    Address, Attachment, Client, Connector, Error, Mailbox, Mailer, Message, Security,
    SessionState, SmtpConfig, Transport,
};

/// What the client did to the wire.
#[derive(Debug, Default)]
struct Wire {
    /// One entry per write.
    writes: Vec<Vec<u8>>,
    /// Writes and upgrades in order, in readable form.
    events: Vec<String>,
    opens: usize,
    closes: usize,
}

type SharedWire = Arc<Mutex<Wire>>;

#[derive(Debug)]
struct MockTransport {
    lines: VecDeque<String>,
    tls: bool,
    fail_upgrade: bool,
    wire: SharedWire,
}

impl Transport for MockTransport {
    async fn read_line(&mut self) -> relaymail_smtp::Result<String> {
        self.lines.pop_front().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed by server",
            ))
        })
    }

    async fn write_all(&mut self, data: &[u8]) -> relaymail_smtp::Result<()> {
        let mut wire = self.wire.lock().unwrap();
        let text = String::from_utf8_lossy(data);
        let event = if text.matches("\r\n").count() > 1 {
            "<message>".to_string()
        } else {
            text.trim_end().to_string()
        };
        wire.events.push(event);
        wire.writes.push(data.to_vec());
        Ok(())
    }

    async fn upgrade(&mut self, _host: &str) -> relaymail_smtp::Result<()> {
        self.wire.lock().unwrap().events.push("<tls>".to_string());
        if self.fail_upgrade {
            return Err(Error::Tls("certificate verify failed".into()));
        }
        self.tls = true;
        Ok(())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }

    async fn close(&mut self) {
        self.wire.lock().unwrap().closes += 1;
    }
}

#[derive(Debug, Default)]
struct MockConnector {
    script: Vec<String>,
    implicit_tls: bool,
    fail_upgrade: bool,
    refuse: bool,
    wire: SharedWire,
}

impl MockConnector {
    fn new(script: &[&str]) -> Self {
        Self {
            script: script.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    fn transport(&self) -> MockTransport {
        self.wire.lock().unwrap().opens += 1;
        MockTransport {
            lines: self.script.iter().cloned().collect(),
            tls: self.implicit_tls,
            fail_upgrade: self.fail_upgrade,
            wire: Arc::clone(&self.wire),
        }
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn open(&self, _config: &SmtpConfig) -> relaymail_smtp::Result<MockTransport> {
        if self.refuse {
            return Err(Error::Connection(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            )));
        }
        Ok(self.transport())
    }
}

const GREETING: &[&str] = &["220 relay.example.org ESMTP ready"];
const EHLO: &[&str] = &[
    "250-relay.example.org",
    "250-PIPELINING",
    "250-SIZE 10240000",
    "250-STARTTLS",
    "250 AUTH PLAIN LOGIN",
];
const STARTTLS: &[&str] = &["220 2.0.0 Ready to start TLS"];
const EHLO_TLS: &[&str] = &["250-relay.example.org", "250 AUTH PLAIN LOGIN"];
const AUTH_LOGIN: &[&str] = &["334 VXNlcm5hbWU6"];
const AUTH_USER: &[&str] = &["334 UGFzc3dvcmQ6"];
const AUTH_PASS: &[&str] = &["235 2.7.0 Authentication successful"];
const MAIL: &[&str] = &["250 2.1.0 Ok"];
const RCPT: &[&str] = &["250 2.1.5 Ok"];
const DATA: &[&str] = &["354 End data with <CR><LF>.<CR><LF>"];
const QUEUED: &[&str] = &["250 2.0.0 Ok: queued as 4BcdYZ"];
const BYE: &[&str] = &["221 2.0.0 Bye"];

/// Reply groups for a full STARTTLS + AUTH session, one per read.
fn full_session() -> Vec<&'static [&'static str]> {
    vec![
        GREETING, EHLO, STARTTLS, EHLO_TLS, AUTH_LOGIN, AUTH_USER, AUTH_PASS, MAIL, RCPT, DATA,
        QUEUED, BYE,
    ]
}

fn flatten(groups: &[&[&'static str]]) -> Vec<&'static str> {
    groups.iter().flat_map(|g| g.iter().copied()).collect()
}

fn starttls_config() -> SmtpConfig {
    SmtpConfig::builder("relay.example.org")
        .security(Security::StartTls)
        .credentials("bot", "secret")
        .build()
}

fn message() -> Message {
    Message::builder()
        .from(Mailbox::with_name("Alerts", "bot@example.com").unwrap())
        .to(Mailbox::new("ops@example.net").unwrap())
        .subject("hi")
        .html_body("<b>hello</b>")
        .build()
        .unwrap()
}

/// Splits the transmitted DATA payload into headers and body, dropping the
/// terminating dot line.
fn split_payload(payload: &[u8]) -> (String, String) {
    let text = String::from_utf8(payload.to_vec()).unwrap();
    let text = text.strip_suffix(".\r\n").unwrap();
    let (headers, body) = text.split_once("\r\n\r\n").unwrap();
    (headers.to_string(), body.to_string())
}

fn transmitted(wire: &SharedWire) -> Vec<u8> {
    let wire = wire.lock().unwrap();
    let index = wire.events.iter().position(|e| e == "<message>").unwrap();
    let writes_before_upgrade = wire.events[..index]
        .iter()
        .filter(|e| *e == "<tls>")
        .count();
    wire.writes[index - writes_before_upgrade].clone()
}

#[tokio::test]
async fn test_end_to_end_starttls_auth_html() {
    let connector = MockConnector::new(&flatten(&full_session()));
    let wire = Arc::clone(&connector.wire);
    let mailer = Mailer::with_connector(starttls_config(), connector);

    mailer.send_email(&message()).await.unwrap();

    let (headers, body) = split_payload(&transmitted(&wire));
    assert!(headers.contains("Content-Type: text/html; charset=UTF-8"));
    assert!(headers.contains("Content-Transfer-Encoding: base64"));
    let html = String::from_utf8(decode_base64_lines(&body).unwrap()).unwrap();
    assert!(html.contains("hello"));

    let wire = wire.lock().unwrap();
    assert_eq!(wire.opens, 1);
    assert_eq!(wire.closes, 1);
}

#[tokio::test]
async fn test_starttls_command_order() {
    let script = flatten(&[
        GREETING, EHLO, STARTTLS, EHLO_TLS, MAIL, RCPT, DATA, QUEUED, BYE,
    ]);
    let connector = MockConnector::new(&script);
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("relay.example.org")
        .client_id("reports.example.com")
        .build();

    Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap();

    let wire = wire.lock().unwrap();
    assert_eq!(
        wire.events,
        vec![
            "EHLO reports.example.com",
            "STARTTLS",
            "<tls>",
            "EHLO reports.example.com",
            "MAIL FROM:<bot@example.com>",
            "RCPT TO:<ops@example.net>",
            "DATA",
            "<message>",
            "QUIT",
        ]
    );
    assert_eq!(wire.closes, 1);
}

#[tokio::test]
async fn test_auth_login_payloads() {
    let connector = MockConnector::new(&flatten(&full_session()));
    let wire = Arc::clone(&connector.wire);

    Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap();

    let wire = wire.lock().unwrap();
    let start = wire.events.iter().position(|e| e == "AUTH LOGIN").unwrap();
    let username = decode_base64(&wire.events[start + 1]).unwrap();
    let password = decode_base64(&wire.events[start + 2]).unwrap();
    assert_eq!(username, b"bot");
    assert_eq!(password, b"secret");
    assert_eq!(wire.events[start + 3], "MAIL FROM:<bot@example.com>");
}

#[tokio::test]
async fn test_implicit_tls_skips_starttls() {
    let script = flatten(&[GREETING, EHLO, MAIL, RCPT, DATA, QUEUED, BYE]);
    let mut connector = MockConnector::new(&script);
    connector.implicit_tls = true;
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("relay.example.org")
        .security(Security::Implicit)
        .build();
    assert_eq!(config.port, 465);

    Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap();

    let wire = wire.lock().unwrap();
    assert!(!wire.events.iter().any(|e| e == "STARTTLS" || e == "<tls>"));
    assert_eq!(wire.closes, 1);
}

#[tokio::test]
async fn test_plain_session_without_credentials() {
    let script = flatten(&[GREETING, EHLO, MAIL, RCPT, DATA, QUEUED, BYE]);
    let connector = MockConnector::new(&script);
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("localhost")
        .security(Security::None)
        .build();

    Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap();

    let wire = wire.lock().unwrap();
    assert_eq!(wire.events.first().unwrap(), "EHLO localhost");
    assert!(!wire.events.iter().any(|e| e.starts_with("AUTH")));
}

#[tokio::test]
async fn test_failure_at_every_step_closes_once() {
    let groups = full_session();
    let auth_steps = 4..=6;

    for failing in 0..groups.len() {
        let failure: &[&str] = if auth_steps.contains(&failing) {
            &["535 5.7.8 Authentication credentials invalid"]
        } else if failing == 2 {
            &["454 4.7.0 TLS not available"]
        } else {
            &["554 5.0.0 Transaction failed"]
        };

        let mut script = groups[..failing].to_vec();
        script.push(failure);
        let connector = MockConnector::new(&flatten(&script));
        let wire = Arc::clone(&connector.wire);

        let err = Mailer::with_connector(starttls_config(), connector)
            .send_email(&message())
            .await
            .unwrap_err();

        if auth_steps.contains(&failing) {
            assert!(
                matches!(&err, Error::Auth { reply } if reply.code.as_u16() == 535),
                "step {failing}: {err}"
            );
        } else {
            assert!(
                matches!(err, Error::Protocol { code, .. } if code == failure_code(failure)),
                "step {failing}: {err}"
            );
        }

        let wire = wire.lock().unwrap();
        assert_eq!(wire.closes, 1, "step {failing}");
        // Every reply group after the greeting answers exactly one write.
        assert_eq!(wire.writes.len(), failing, "step {failing}");
    }
}

fn failure_code(failure: &[&str]) -> u16 {
    failure[0][..3].parse().unwrap()
}

#[tokio::test]
async fn test_protocol_error_carries_reply() {
    let script = flatten(&[
        GREETING,
        EHLO,
        STARTTLS,
        EHLO_TLS,
        AUTH_LOGIN,
        AUTH_USER,
        AUTH_PASS,
        &["550 5.1.1 <bot@example.com>: Sender address rejected"],
    ]);
    let connector = MockConnector::new(&script);

    let err = Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(550));
    assert!(err.is_permanent());
    assert!(!err.is_transient());
    assert_eq!(
        err.last_reply().unwrap(),
        "5.1.1 <bot@example.com>: Sender address rejected"
    );
    assert!(matches!(err, Error::Protocol { expected: 250, .. }));
}

#[tokio::test]
async fn test_upgrade_failure_closes_once() {
    let mut connector = MockConnector::new(&flatten(&[GREETING, EHLO, STARTTLS]));
    connector.fail_upgrade = true;
    let wire = Arc::clone(&connector.wire);

    let err = Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Tls(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.closes, 1);
    assert_eq!(wire.events.last().unwrap(), "<tls>");
}

#[tokio::test]
async fn test_connection_lost_mid_reply() {
    let connector = MockConnector::new(&["220 relay.example.org", "250-relay.example.org"]);
    let wire = Arc::clone(&connector.wire);

    let err = Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert_eq!(wire.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn test_malformed_reply_closes_once() {
    let connector = MockConnector::new(&["220 relay.example.org", "hello there"]);
    let wire = Arc::clone(&connector.wire);

    let err = Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedReply(_)));
    assert_eq!(wire.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn test_connect_failure_closes_nothing() {
    let mut connector = MockConnector::new(&[]);
    connector.refuse = true;
    let wire = Arc::clone(&connector.wire);

    let err = Mailer::with_connector(starttls_config(), connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.opens, 0);
    assert_eq!(wire.closes, 0);
}

#[tokio::test]
async fn test_auth_required_without_credentials_fails_before_io() {
    let connector = MockConnector::new(&flatten(&full_session()));
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("relay.example.org")
        .credentials("bot", "")
        .auth_required(true)
        .build();

    let err = Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.opens, 0);
    assert!(wire.events.is_empty());
}

#[tokio::test]
async fn test_multi_line_ehlo_identity_fails_before_io() {
    let connector = MockConnector::new(&flatten(&full_session()));
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("relay.example.org")
        .client_id("x\r\nRCPT TO:<evil@example.org>")
        .build();

    let err = Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    let wire = wire.lock().unwrap();
    assert_eq!(wire.opens, 0);
    assert!(wire.writes.is_empty());
}

#[tokio::test]
async fn test_incomplete_credentials_skip_auth() {
    let script = flatten(&[
        GREETING, EHLO, STARTTLS, EHLO_TLS, MAIL, RCPT, DATA, QUEUED, BYE,
    ]);
    let connector = MockConnector::new(&script);
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("relay.example.org")
        .credentials("", "secret")
        .build();

    Mailer::with_connector(config, connector)
        .send_email(&message())
        .await
        .unwrap();

    assert!(
        !wire
            .lock()
            .unwrap()
            .events
            .iter()
            .any(|e| e.starts_with("AUTH"))
    );
}

#[tokio::test]
async fn test_plain_text_round_trip() {
    let script = flatten(&[GREETING, EHLO, MAIL, RCPT, DATA, QUEUED, BYE]);
    let connector = MockConnector::new(&script);
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("localhost")
        .security(Security::None)
        .build();
    let text = "Grüße aus dem Rechenzentrum.\n.Zeile mit Punkt\n".repeat(20);
    let message = Message::builder()
        .from(Mailbox::new("bot@example.com").unwrap())
        .to(Mailbox::new("ops@example.net").unwrap())
        .subject("Bericht")
        .text_body(text.clone())
        .build()
        .unwrap();

    Mailer::with_connector(config, connector)
        .send_email(&message)
        .await
        .unwrap();

    let (headers, body) = split_payload(&transmitted(&wire));
    assert!(headers.contains("Content-Type: text/plain; charset=UTF-8"));
    assert!(body.lines().all(|line| line.len() <= 76));
    assert_eq!(
        String::from_utf8(decode_base64_lines(&body).unwrap()).unwrap(),
        text
    );
}

#[tokio::test]
async fn test_attachments_are_transmitted_as_parts() {
    let script = flatten(&[GREETING, EHLO, MAIL, RCPT, DATA, QUEUED, BYE]);
    let connector = MockConnector::new(&script);
    let wire = Arc::clone(&connector.wire);
    let config = SmtpConfig::builder("localhost")
        .security(Security::None)
        .build();
    let message = Message::builder()
        .from(Mailbox::new("bot@example.com").unwrap())
        .to(Mailbox::new("ops@example.net").unwrap())
        .subject("Logs")
        .text_body("See attached.")
        .attach(Attachment::inferred("app.log", b"line one\nline two\n".to_vec()))
        .attach(Attachment::new("dump.bin", vec![0u8, 1, 2, 3, 255]))
        .build()
        .unwrap();

    Mailer::with_connector(config, connector)
        .send_email(&message)
        .await
        .unwrap();

    let (headers, body) = split_payload(&transmitted(&wire));
    let boundary = headers
        .split("boundary=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string();

    assert_eq!(body.matches(&format!("--{boundary}\r\n")).count(), 3);
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    assert!(body.contains("Content-Disposition: attachment; filename=\"app.log\""));
    assert!(body.contains("Content-Type: application/octet-stream; name=\"dump.bin\""));
}

#[tokio::test]
async fn test_client_states_and_server_info() {
    let connector = MockConnector::new(&flatten(&[GREETING, EHLO, MAIL, BYE]));
    let wire = Arc::clone(&connector.wire);
    let transport = connector.transport();

    let client = Client::greet(transport).await.unwrap();
    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(client.server_info().hostname, "relay.example.org");

    let client = client.ehlo("localhost").await.unwrap();
    let info = client.server_info();
    assert!(info.supports_starttls());
    assert!(info.supports_auth_login());
    assert_eq!(info.max_message_size(), Some(10_240_000));
    assert!(!client.is_tls());

    let client = client
        .mail_from(Address::new("bot@example.com").unwrap())
        .await
        .unwrap();
    assert_eq!(client.state(), SessionState::MailTransaction);

    client.quit().await.unwrap();
    assert_eq!(wire.lock().unwrap().closes, 1);
}

#[tokio::test]
async fn test_quit_closes_even_when_rejected() {
    let connector = MockConnector::new(&flatten(&[GREETING, &["500 5.5.1 Unrecognized"]]));
    let wire = Arc::clone(&connector.wire);

    let client = Client::greet(connector.transport()).await.unwrap();
    let err = client.quit().await.unwrap_err();

    assert!(matches!(err, Error::Protocol { code: 500, expected: 221, .. }));
    assert_eq!(wire.lock().unwrap().closes, 1);
}

#[test]
fn test_mailer_and_send_future_are_send() {
    fn assert_send<T: Send>(_: &T) {}
    fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<Mailer>();

    let mailer = Mailer::new(SmtpConfig::new("relay.example.org"));
    let message = message();
    let future = mailer.send_email(&message);
    assert_send(&future);
}
