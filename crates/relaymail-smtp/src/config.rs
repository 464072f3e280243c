//! Relay configuration types.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default bound for connecting and for every read or write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption. **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    #[default]
    StartTls,
    /// TLS from the start (port 465).
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

impl FromStr for Security {
    type Err = Error;

    /// Parses `ssl`, `tls` or `none` (also `implicit` and `starttls`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssl" | "implicit" => Ok(Self::Implicit),
            "tls" | "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            "" => Err(Error::Configuration("Security mode is empty".into())),
            other => Err(Error::Configuration(format!(
                "Unknown security mode: {other}"
            ))),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::StartTls => "tls",
            Self::Implicit => "ssl",
        })
    }
}

/// Username and password for AUTH LOGIN.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns true when both username and password are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// SMTP relay configuration.
///
/// Built once and shared read-only by every send.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// Relay hostname (also the name verified against its certificate).
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Credentials for AUTH LOGIN, if any.
    pub credentials: Option<Credentials>,
    /// Refuse to send without complete credentials.
    pub auth_required: bool,
    /// Identity announced in EHLO.
    pub client_id: String,
    /// Connection (and implicit TLS handshake) timeout.
    pub connect_timeout: Duration,
    /// Read/write timeout.
    pub io_timeout: Duration,
}

impl SmtpConfig {
    /// Creates a configuration using STARTTLS on port 587.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        SmtpConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> SmtpConfigBuilder {
        SmtpConfigBuilder::new(host)
    }

    /// Returns the credentials to authenticate with, if any.
    ///
    /// Incomplete credentials count as absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if authentication is required but no
    /// complete credentials are configured.
    pub fn login_credentials(&self) -> Result<Option<&Credentials>> {
        let credentials = self.credentials.as_ref().filter(|c| c.is_complete());
        if self.auth_required && credentials.is_none() {
            return Err(Error::Configuration(
                "Authentication is required but no username/password is configured".into(),
            ));
        }
        Ok(credentials)
    }

    /// Returns the EHLO identity after checking it is a single token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the identity is empty or contains
    /// whitespace or control characters.
    pub fn ehlo_identity(&self) -> Result<&str> {
        validate_client_id(&self.client_id)?;
        Ok(&self.client_id)
    }
}

/// Checks that an EHLO identity cannot break the command line it is sent on.
pub(crate) fn validate_client_id(client_id: &str) -> Result<()> {
    if client_id.is_empty() {
        return Err(Error::Configuration("EHLO identity is empty".into()));
    }
    if client_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Configuration(format!(
            "EHLO identity contains whitespace or control characters: {client_id:?}"
        )));
    }
    Ok(())
}

/// Builder for relay configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    credentials: Option<Credentials>,
    auth_required: bool,
    client_id: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl SmtpConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::default(),
            credentials: None,
            auth_required: false,
            client_id: "localhost".to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the AUTH LOGIN credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Requires authentication on every send.
    #[must_use]
    pub const fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    /// Sets the identity announced in EHLO.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SmtpConfig {
        SmtpConfig {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            credentials: self.credentials,
            auth_required: self.auth_required,
            client_id: self.client_id,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
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

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::StartTls.default_port(), 587);
        assert_eq!(Security::Implicit.default_port(), 465);
    }

    #[test]
    fn test_security_from_str() {
        assert_eq!("ssl".parse::<Security>().unwrap(), Security::Implicit);
        assert_eq!("TLS".parse::<Security>().unwrap(), Security::StartTls);
        assert_eq!("none".parse::<Security>().unwrap(), Security::None);
        assert!(matches!("".parse::<Security>(), Err(Error::Configuration(_))));
        assert!(matches!("  ".parse::<Security>(), Err(Error::Configuration(_))));
        assert!(matches!(
            "sslv3".parse::<Security>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_security_display_round_trips() {
        for security in [Security::None, Security::StartTls, Security::Implicit] {
            assert_eq!(security.to_string().parse::<Security>().unwrap(), security);
        }
    }

    #[test]
    fn test_config_new() {
        let config = SmtpConfig::new("mail.example.org");
        assert_eq!(config.host, "mail.example.org");
        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.client_id, "localhost");
        assert_eq!(config.io_timeout, DEFAULT_TIMEOUT);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = SmtpConfig::builder("mail.example.org")
            .security(Security::Implicit)
            .credentials("bot", "secret")
            .client_id("reports.example.org")
            .io_timeout(Duration::from_secs(5))
            .build();

        assert_eq!(config.port, 465);
        assert_eq!(config.client_id, "reports.example.org");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.credentials.as_ref().unwrap().username(), "bot");
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = SmtpConfig::builder("mail.example.org")
            .security(Security::None)
            .port(2525)
            .build();
        assert_eq!(config.port, 2525);
    }

    #[test]
    fn test_login_credentials() {
        let config = SmtpConfig::builder("h").credentials("bot", "secret").build();
        assert_eq!(config.login_credentials().unwrap().unwrap().password(), "secret");

        let config = SmtpConfig::builder("h").build();
        assert!(config.login_credentials().unwrap().is_none());

        let config = SmtpConfig::builder("h").credentials("bot", "").build();
        assert!(config.login_credentials().unwrap().is_none());
    }

    #[test]
    fn test_auth_required_without_credentials() {
        let config = SmtpConfig::builder("h")
            .credentials("bot", "")
            .auth_required(true)
            .build();
        assert!(matches!(
            config.login_credentials(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_ehlo_identity() {
        let config = SmtpConfig::builder("h").client_id("[192.0.2.1]").build();
        assert_eq!(config.ehlo_identity().unwrap(), "[192.0.2.1]");

        for bad in ["", "host name", "x\r\nRCPT TO:<evil@example.org>", "x\ty", "x\0"] {
            let config = SmtpConfig::builder("h").client_id(bad).build();
            assert!(
                matches!(config.ehlo_identity(), Err(Error::Configuration(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("bot", "secret");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("bot"));
        assert!(!debug.contains("secret"));
    }
}
