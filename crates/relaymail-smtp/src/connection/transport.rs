//! Transport and connector abstractions.
//!
//! The session only talks to the relay through [`Transport`]; the network
//! implementation is [`SmtpStream`](super::SmtpStream), and tests plug in
//! scripted transports.

use crate::config::SmtpConfig;
use crate::error::Result;
use std::future::Future;

/// A line-oriented byte stream to an SMTP relay.
pub trait Transport: Send {
    /// Reads one line, without its line terminator.
    ///
    /// A closed connection is an error, never an empty line.
    fn read_line(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Writes and flushes `data`.
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Performs a TLS handshake in place over the open plain connection,
    /// verifying the certificate against `host`.
    fn upgrade(&mut self, host: &str) -> impl Future<Output = Result<()>> + Send;

    /// Returns true if the stream is TLS-encrypted.
    fn is_tls(&self) -> bool;

    /// Shuts the stream down. Errors are logged, not returned.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens transports to the configured relay.
pub trait Connector: Send + Sync {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Opens a connection according to `config` (plain or implicit TLS).
    fn open(&self, config: &SmtpConfig) -> impl Future<Output = Result<Self::Transport>> + Send;
}
