//! Network transport: TCP with optional TLS, bounded by timeouts.

use super::transport::{Connector, Transport};
use crate::config::{Security, SmtpConfig};
use crate::error::{Error, Result};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

/// Longest reply line accepted, CRLF included (RFC 5321 allows 512).
pub const MAX_LINE_LENGTH: usize = 1024;

/// SMTP stream (TCP or TLS) with a per-operation I/O timeout.
#[derive(Debug)]
pub struct SmtpStream {
    inner: Inner,
    io_timeout: Duration,
}

#[derive(Debug)]
enum Inner {
    /// Plain TCP connection.
    Tcp(BufReader<TcpStream>),
    /// TLS-encrypted connection.
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
    /// Shut down, or lost during a failed upgrade.
    Closed,
}

impl SmtpStream {
    /// Connects to the configured relay.
    ///
    /// With [`Security::Implicit`] the TLS handshake happens immediately;
    /// otherwise a plain stream is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the socket cannot be opened,
    /// [`Error::Tls`] if the handshake or certificate check fails and
    /// [`Error::Timeout`] if either takes longer than the connect timeout.
    pub async fn connect(config: &SmtpConfig) -> Result<Self> {
        let limit = config.connect_timeout;
        let tcp = bounded(limit, TcpStream::connect((config.host.as_str(), config.port)))
            .await?
            .map_err(Error::Connection)?;

        let inner = match config.security {
            Security::Implicit => {
                let tls = bounded(limit, handshake(&config.host, tcp)).await??;
                Inner::Tls(Box::new(BufReader::new(tls)))
            }
            Security::StartTls | Security::None => Inner::Tcp(BufReader::new(tcp)),
        };

        tracing::info!(
            host = %config.host,
            port = config.port,
            security = %config.security,
            "Connected to relay"
        );

        Ok(Self {
            inner,
            io_timeout: config.io_timeout,
        })
    }
}

impl Transport for SmtpStream {
    async fn read_line(&mut self) -> Result<String> {
        let limit = self.io_timeout;
        let mut buf = Vec::new();

        let read = match &mut self.inner {
            Inner::Tcp(reader) => bounded(limit, read_capped(reader, &mut buf)).await?,
            Inner::Tls(reader) => bounded(limit, read_capped(&mut **reader, &mut buf)).await?,
            Inner::Closed => return Err(closed()),
        }?;

        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Connection closed by server",
            )));
        }
        if read == MAX_LINE_LENGTH && !buf.ends_with(b"\n") {
            return Err(Error::MalformedReply(format!(
                "Reply line exceeds {MAX_LINE_LENGTH} bytes"
            )));
        }

        let line = String::from_utf8(buf)
            .map_err(|_| Error::MalformedReply("Reply line is not valid UTF-8".into()))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.io_timeout;
        match &mut self.inner {
            Inner::Tcp(reader) => {
                let stream = reader.get_mut();
                bounded(limit, async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await??;
            }
            Inner::Tls(reader) => {
                let stream = reader.get_mut();
                bounded(limit, async {
                    stream.write_all(data).await?;
                    stream.flush().await
                })
                .await??;
            }
            Inner::Closed => return Err(closed()),
        }
        Ok(())
    }

    async fn upgrade(&mut self, host: &str) -> Result<()> {
        let tcp = match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Tcp(reader) => reader.into_inner(),
            Inner::Tls(reader) => {
                self.inner = Inner::Tls(reader);
                return Err(Error::Tls("Stream is already TLS".into()));
            }
            Inner::Closed => return Err(closed()),
        };

        let tls = bounded(self.io_timeout, handshake(host, tcp)).await??;
        self.inner = Inner::Tls(Box::new(BufReader::new(tls)));
        tracing::debug!(host, "TLS upgrade complete");
        Ok(())
    }

    fn is_tls(&self) -> bool {
        matches!(self.inner, Inner::Tls(_))
    }

    async fn close(&mut self) {
        let limit = self.io_timeout;
        let outcome = match &mut self.inner {
            Inner::Tcp(reader) => tokio::time::timeout(limit, reader.get_mut().shutdown()).await,
            Inner::Tls(reader) => tokio::time::timeout(limit, reader.get_mut().shutdown()).await,
            Inner::Closed => return,
        };
        self.inner = Inner::Closed;

        match outcome {
            Ok(Ok(())) => tracing::debug!("Connection closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Shutdown failed; socket dropped"),
            Err(_) => tracing::debug!("Shutdown timed out; socket dropped"),
        }
    }
}

/// Connector that opens real network connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = SmtpStream;

    async fn open(&self, config: &SmtpConfig) -> Result<SmtpStream> {
        SmtpStream::connect(config).await
    }
}

/// Creates a TLS connector with the webpki root certificates.
///
/// Used for both implicit TLS and STARTTLS so the two paths verify
/// certificates identically.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::Configuration(format!("Invalid hostname: {host}")))?;

    create_tls_connector()
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

/// Reads up to and including `\n`, stopping after [`MAX_LINE_LENGTH`] bytes.
async fn read_capped<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader
        .take(MAX_LINE_LENGTH as u64)
        .read_until(b'\n', buf)
        .await
}

async fn bounded<F: Future>(limit: Duration, fut: F) -> Result<F::Output> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout(limit))
}

fn closed() -> Error {
    Error::Io(io::Error::new(io::ErrorKind::NotConnected, "Stream is closed"))
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
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn local_config(port: u16) -> SmtpConfig {
        SmtpConfig::builder("127.0.0.1")
            .port(port)
            .security(Security::None)
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_millis(200))
            .build()
    }

    #[tokio::test]
    async fn test_read_line_strips_crlf() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 relay ready\r\n").await.unwrap();
            let mut buf = [0u8; 6];
            socket.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        assert!(!stream.is_tls());
        assert_eq!(stream.read_line().await.unwrap(), "220 relay ready");
        stream.write_all(b"QUIT\r\n").await.unwrap();
        assert_eq!(&server.await.unwrap(), b"QUIT\r\n");

        stream.close().await;
        assert!(stream.read_line().await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_line_is_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut line = b"220 ".to_vec();
            line.extend(std::iter::repeat_n(b'A', 64 * 1024));
            line.extend_from_slice(b"\r\n");
            let _ = socket.write_all(&line).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(err, Error::MalformedReply(_)));
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut line = b"250 ".to_vec();
            line.extend(std::iter::repeat_n(b'x', MAX_LINE_LENGTH - 6));
            line.extend_from_slice(b"\r\n250 OK\r\n");
            socket.write_all(&line).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        let line = stream.read_line().await.unwrap();
        assert_eq!(line.len(), MAX_LINE_LENGTH - 2);
        assert_eq!(stream.read_line().await.unwrap(), "250 OK");
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        let err = stream.read_line().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_eof_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        server.await.unwrap();
        assert!(matches!(stream.read_line().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SmtpStream::connect(&local_config(port)).await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_upgrade_against_plain_server_fails_with_tls_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 512];
            let _ = socket.read(&mut buf).await;
            socket.write_all(b"this is not a TLS record\r\n").await.unwrap();
        });

        let mut stream = SmtpStream::connect(&local_config(port)).await.unwrap();
        let err = stream.upgrade("localhost").await.unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
        assert!(!stream.is_tls());
    }

    #[test]
    fn test_create_tls_connector() {
        let _connector = create_tls_connector();
    }
}
