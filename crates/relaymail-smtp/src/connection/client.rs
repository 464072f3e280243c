//! Type-state SMTP client.
//!
//! Each transition consumes the client. A transition that fails closes the
//! transport before returning the error, so a client value always owns an
//! open session and every error path leaves nothing open.

use super::ServerInfo;
use super::transport::Transport;
use crate::command::{Command, encode_data};
use crate::config::validate_client_id;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::marker::PhantomData;

/// Upper bound on lines accepted for one reply.
const MAX_REPLY_LINES: usize = 512;

mod sealed {
    pub trait Sealed {}
}

/// A session state marker.
pub trait State: sealed::Sealed {
    /// Runtime name of the state.
    const STATE: SessionState;
}

/// States in which EHLO and AUTH may be issued.
pub trait AuthCapable: State {}

/// States in which a mail transaction may start.
pub trait MailReady: State {}

/// Runtime view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Greeting received.
    Connected,
    /// STARTTLS completed and EHLO re-issued.
    TlsUpgraded,
    /// AUTH LOGIN succeeded.
    Authenticated,
    /// MAIL FROM accepted.
    MailTransaction,
    /// RCPT TO accepted.
    RecipientAdded,
    /// DATA accepted; waiting for the message.
    Data,
    /// Message accepted by the relay.
    Delivered,
}

macro_rules! state_marker {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl State for $name {
            const STATE: SessionState = SessionState::$name;
        }
    };
}

state_marker!(
    /// Type-state marker for the greeted connection.
    Connected
);
state_marker!(
    /// Type-state marker for a connection upgraded with STARTTLS.
    TlsUpgraded
);
state_marker!(
    /// Type-state marker for the authenticated state.
    Authenticated
);
state_marker!(
    /// Type-state marker for a started mail transaction.
    MailTransaction
);
state_marker!(
    /// Type-state marker for an accepted recipient.
    RecipientAdded
);
state_marker!(
    /// Type-state marker for data mode.
    Data
);
state_marker!(
    /// Type-state marker for a delivered message.
    Delivered
);

impl AuthCapable for Connected {}
impl AuthCapable for TlsUpgraded {}

impl MailReady for Connected {}
impl MailReady for TlsUpgraded {}
impl MailReady for Authenticated {}

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<T: Transport, S> {
    transport: T,
    server_info: ServerInfo,
    _state: PhantomData<fn() -> S>,
}

impl<T: Transport> Client<T, Connected> {
    /// Reads the server greeting (expects 220).
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is not 220. The
    /// transport is closed first.
    pub async fn greet(transport: T) -> Result<Self> {
        let mut client = Self {
            transport,
            server_info: ServerInfo::default(),
            _state: PhantomData,
        };

        match client.read_greeting().await {
            Ok(hostname) => {
                client.server_info.hostname = hostname;
                Ok(client)
            }
            Err(e) => Err(client.abort(e).await),
        }
    }

    /// Issues STARTTLS (expects 220), upgrades the transport in place and
    /// repeats EHLO.
    ///
    /// `host` is the name the certificate is verified against.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay refuses, the handshake fails or the new
    /// EHLO is rejected. The transport is closed first.
    pub async fn starttls(
        mut self,
        host: &str,
        client_id: &str,
    ) -> Result<Client<T, TlsUpgraded>> {
        match self.negotiate_tls(host, client_id).await {
            Ok(()) => Ok(self.transition()),
            Err(e) => Err(self.abort(e).await),
        }
    }

    async fn read_greeting(&mut self) -> Result<String> {
        let greeting = self.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(Error::unexpected(ReplyCode::SERVICE_READY.as_u16(), &greeting));
        }

        Ok(greeting
            .first_line()
            .split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string())
    }

    async fn negotiate_tls(&mut self, host: &str, client_id: &str) -> Result<()> {
        self.execute(&Command::StartTls).await?;
        self.transport.upgrade(host).await?;
        tracing::debug!(host, "Connection upgraded with STARTTLS");
        self.hello(client_id).await
    }
}

impl<T: Transport, S: AuthCapable> Client<T, S> {
    /// Sends EHLO (expects 250) and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] without writing anything if
    /// `client_id` contains whitespace or control characters, and an error
    /// if EHLO is rejected. The transport is closed first.
    pub async fn ehlo(mut self, client_id: &str) -> Result<Self> {
        match self.hello(client_id).await {
            Ok(()) => Ok(self),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Authenticates with AUTH LOGIN.
    ///
    /// Expects 334 after `AUTH LOGIN`, 334 after the base64 username and
    /// 235 after the base64 password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] carrying the offending reply if any step gets
    /// another code. The transport is closed first.
    pub async fn auth_login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<T, Authenticated>> {
        match self.login(username, password).await {
            Ok(()) => Ok(self.transition()),
            Err(e) => Err(self.abort(e).await),
        }
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let steps = [
            Command::AuthLogin,
            Command::AuthUsername(STANDARD.encode(username)),
            Command::AuthPassword(STANDARD.encode(password)),
        ];

        for cmd in &steps {
            let reply = self.exchange(cmd).await?;
            if reply.code != cmd.expected() {
                return Err(Error::Auth { reply });
            }
        }
        Ok(())
    }
}

impl<T: Transport, S: MailReady> Client<T, S> {
    /// Starts a mail transaction (expects 250).
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is rejected. The transport is closed
    /// first.
    pub async fn mail_from(self, from: Address) -> Result<Client<T, MailTransaction>> {
        self.step(Command::MailFrom { from }).await
    }
}

impl<T: Transport> Client<T, MailTransaction> {
    /// Adds the recipient (expects 250).
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected. The transport is closed first.
    pub async fn rcpt_to(self, to: Address) -> Result<Client<T, RecipientAdded>> {
        self.step(Command::RcptTo { to }).await
    }
}

impl<T: Transport> Client<T, RecipientAdded> {
    /// Begins sending message data (expects 354).
    ///
    /// # Errors
    ///
    /// Returns an error if DATA is rejected. The transport is closed first.
    pub async fn data(self) -> Result<Client<T, Data>> {
        self.step(Command::Data).await
    }
}

impl<T: Transport> Client<T, Data> {
    /// Sends the message content and completes the transaction (expects 250).
    ///
    /// Line endings are normalised to CRLF, leading dots are stuffed and the
    /// terminating `.` line is added.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the relay rejects the message.
    /// The transport is closed first.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<T, Delivered>> {
        match self.transmit(message).await {
            Ok(()) => Ok(self.transition()),
            Err(e) => Err(self.abort(e).await),
        }
    }

    async fn transmit(&mut self, message: &[u8]) -> Result<()> {
        let payload = encode_data(message);
        tracing::debug!(bytes = payload.len(), "C: <message data>");
        self.transport.write_all(&payload).await?;

        let reply = self.read_reply().await?;
        if reply.code != ReplyCode::OK {
            return Err(Error::unexpected(ReplyCode::OK.as_u16(), &reply));
        }
        Ok(())
    }
}

// Common implementation for all states
impl<T: Transport, S> Client<T, S> {
    /// Returns the server information gathered so far.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Returns true if the session runs over TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.transport.is_tls()
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState
    where
        S: State,
    {
        S::STATE
    }

    /// Sends QUIT (expects 221) and closes the transport.
    ///
    /// The transport is closed whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT cannot be sent or is not answered with 221.
    pub async fn quit(mut self) -> Result<()> {
        let result = self.execute(&Command::Quit).await;
        self.transport.close().await;
        result.map(|_| ())
    }

    /// Closes the transport without sending QUIT.
    pub async fn close(mut self) {
        self.transport.close().await;
    }

    fn transition<N>(self) -> Client<T, N> {
        Client {
            transport: self.transport,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn step<N>(mut self, cmd: Command) -> Result<Client<T, N>> {
        match self.execute(&cmd).await {
            Ok(_) => Ok(self.transition()),
            Err(e) => Err(self.abort(e).await),
        }
    }

    async fn abort(mut self, error: Error) -> Error {
        tracing::warn!(error = %error, "SMTP session aborted");
        self.transport.close().await;
        error
    }

    async fn hello(&mut self, client_id: &str) -> Result<()> {
        validate_client_id(client_id)?;
        let reply = self
            .execute(&Command::Ehlo {
                hostname: client_id.to_string(),
            })
            .await?;

        // First line is the greeting, the rest are keywords
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();

        tracing::debug!(
            extensions = self.server_info.extensions.len(),
            "EHLO accepted"
        );
        Ok(())
    }

    /// Sends a command and checks the reply against its expected code.
    async fn execute(&mut self, cmd: &Command) -> Result<Reply> {
        let reply = self.exchange(cmd).await?;
        let expected = cmd.expected();
        if reply.code != expected {
            return Err(Error::unexpected(expected.as_u16(), &reply));
        }
        Ok(reply)
    }

    async fn exchange(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::debug!(command = %cmd, "C:");
        self.transport.write_all(&cmd.serialize()).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.transport.read_line().await?;
            let is_last = is_last_reply_line(&line);
            lines.push(line);

            if is_last {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(Error::MalformedReply(format!(
                    "Reply exceeds {MAX_REPLY_LINES} lines"
                )));
            }
        }

        let reply = parse_reply(&lines)?;
        tracing::debug!(code = %reply.code, "S:");
        Ok(reply)
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
    clippy::similar_names,
    clippy::unused_async
)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio_test::io::{Builder, Mock};

    /// Transport over a `tokio_test` mock that checks every byte written.
    #[derive(Debug)]
    struct MockIo {
        io: BufReader<Mock>,
    }

    impl MockIo {
        fn new(mock: Mock) -> Self {
            Self {
                io: BufReader::new(mock),
            }
        }
    }

    impl Transport for MockIo {
        async fn read_line(&mut self) -> Result<String> {
            let mut line = String::new();
            if self.io.read_line(&mut line).await? == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        }

        async fn write_all(&mut self, data: &[u8]) -> Result<()> {
            self.io.get_mut().write_all(data).await?;
            Ok(())
        }

        async fn upgrade(&mut self, _host: &str) -> Result<()> {
            Err(Error::Tls("no TLS in mock".into()))
        }

        fn is_tls(&self) -> bool {
            false
        }

        async fn close(&mut self) {
            let _ = self.io.get_mut().shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_greeting_hostname() {
        let mock = Builder::new().read(b"220 mx.example.org ESMTP\r\n").build();
        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        assert_eq!(client.server_info().hostname, "mx.example.org");
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_full_transaction_bytes() {
        let mock = Builder::new()
            .read(b"220 mx.example.org\r\n")
            .write(b"EHLO client.local\r\n")
            .read(b"250-mx.example.org\r\n250-SIZE 2048\r\n250 AUTH LOGIN\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dQ==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cA==\r\n")
            .read(b"235 ok\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 ok\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go\r\n")
            .write(b"Subject: x\r\n\r\n..dot\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let client = Client::greet(MockIo::new(mock))
            .await
            .unwrap()
            .ehlo("client.local")
            .await
            .unwrap();
        assert_eq!(client.server_info().max_message_size(), Some(2048));

        let client = client.auth_login("u", "p").await.unwrap();
        assert_eq!(client.state(), SessionState::Authenticated);

        let client = client
            .mail_from(Address::new("a@example.com").unwrap())
            .await
            .unwrap()
            .rcpt_to(Address::new("b@example.com").unwrap())
            .await
            .unwrap()
            .data()
            .await
            .unwrap()
            .send_message(b"Subject: x\n\n.dot\n")
            .await
            .unwrap();
        assert_eq!(client.state(), SessionState::Delivered);

        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_rejection_is_auth_error() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dQ==\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();

        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        let err = client.auth_login("u", "p").await.unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed: 535 5.7.8 Bad credentials");
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_auth_mechanism_refused() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"504 5.5.4 Unrecognized authentication type\r\n")
            .build();

        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        let err = client.auth_login("u", "p").await.unwrap_err();
        assert!(matches!(err, Error::Auth { ref reply } if reply.code.as_u16() == 504));
    }

    #[tokio::test]
    async fn test_wrong_success_code_is_rejected() {
        // 251 is a success class, but MAIL FROM requires 250
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"251 forwarded\r\n")
            .build();

        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        let err = client
            .mail_from(Address::new("a@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol {
                code: 251,
                expected: 250,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_ehlo_identity_with_line_break_is_not_sent() {
        // The mock fails on any write it was not told to expect
        let mock = Builder::new().read(b"220 mx\r\n").build();

        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        let err = client
            .ehlo("x\r\nRCPT TO:<evil@example.org>")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_bad_greeting() {
        let mock = Builder::new()
            .read(b"554 5.3.2 No service\r\n")
            .build();
        let err = Client::greet(MockIo::new(mock)).await.unwrap_err();
        assert_eq!(err.code(), Some(554));
    }

    #[tokio::test]
    async fn test_starttls_upgrade_failure() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"STARTTLS\r\n")
            .read(b"220 ready\r\n")
            .build();

        let client = Client::greet(MockIo::new(mock)).await.unwrap();
        let err = client.starttls("mx", "client.local").await.unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }
}
