//! High-level sending: one message per connection.

use crate::config::{Credentials, Security, SmtpConfig};
use crate::connection::{AuthCapable, Client, Connector, MailReady, TcpConnector, Transport};
use crate::error::Result;
use crate::types::Address;
use relaymail_mime::Message;

/// Sends messages through one configured relay.
///
/// Holds only immutable configuration; every [`send_email`](Self::send_email)
/// call opens its own connection, so a `Mailer` can be shared across tasks.
#[derive(Debug, Clone)]
pub struct Mailer<C: Connector = TcpConnector> {
    config: SmtpConfig,
    connector: C,
}

impl Mailer {
    /// Creates a mailer that connects over the network.
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Mailer<C> {
    /// Creates a mailer with a custom connector.
    #[must_use]
    pub const fn with_connector(config: SmtpConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Returns the relay configuration.
    #[must_use]
    pub const fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Sends a message.
    ///
    /// Runs greeting, EHLO, STARTTLS (when configured and not already on
    /// TLS), AUTH LOGIN (when credentials are set), MAIL FROM, RCPT TO, DATA,
    /// the encoded message and QUIT. The first failure aborts the rest. An
    /// opened connection is closed exactly once whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) before
    /// any I/O if authentication is required without credentials or the
    /// EHLO identity is not a single token, and otherwise the error of the first step that failed.
    pub async fn send_email(&self, message: &Message) -> Result<()> {
        let credentials = self.config.login_credentials()?;
        let client_id = self.config.ehlo_identity()?;
        let envelope = Envelope {
            from: Address::from(message.from()),
            to: Address::from(message.to()),
        };
        let payload = message.encode()?.to_bytes();

        let transport = self.connector.open(&self.config).await?;
        let client = Client::greet(transport)
            .await?
            .ehlo(client_id)
            .await?;

        tracing::debug!(
            server = %client.server_info().hostname,
            tls = client.is_tls(),
            "Relay greeted"
        );

        if self.config.security == Security::StartTls && !client.is_tls() {
            if !client.server_info().supports_starttls() {
                tracing::warn!(
                    host = %self.config.host,
                    "Relay does not advertise STARTTLS; attempting it anyway"
                );
            }
            let client = client
                .starttls(&self.config.host, client_id)
                .await?;
            authenticate_and_deliver(client, credentials, envelope, &payload).await
        } else {
            authenticate_and_deliver(client, credentials, envelope, &payload).await
        }
    }
}

struct Envelope {
    from: Address,
    to: Address,
}

async fn authenticate_and_deliver<T, S>(
    client: Client<T, S>,
    credentials: Option<&Credentials>,
    envelope: Envelope,
    payload: &[u8],
) -> Result<()>
where
    T: Transport,
    S: AuthCapable + MailReady,
{
    match credentials {
        Some(credentials) => {
            if !client.server_info().supports_auth_login() {
                tracing::warn!("Relay does not advertise AUTH LOGIN; attempting it anyway");
            }
            let client = client
                .auth_login(credentials.username(), credentials.password())
                .await?;
            tracing::debug!(username = credentials.username(), "Authenticated");
            deliver(client, envelope, payload).await
        }
        None => deliver(client, envelope, payload).await,
    }
}

async fn deliver<T, S>(client: Client<T, S>, envelope: Envelope, payload: &[u8]) -> Result<()>
where
    T: Transport,
    S: MailReady,
{
    let Envelope { from, to } = envelope;
    let recipient = to.to_string();

    let client = client
        .mail_from(from)
        .await?
        .rcpt_to(to)
        .await?
        .data()
        .await?
        .send_message(payload)
        .await?;

    tracing::info!(to = %recipient, bytes = payload.len(), "Message accepted by relay");
    client.quit().await
}
