//! Connection parameters for a single SMTP or IMAP session.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Protocol {
    Smtp,
    Imap,
}

/// SecurityMode says how the session protects its stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum SecurityMode {
    /// No TLS at all.
    Plain,
    /// TLS handshake right after the TCP connect, before the greeting.
    ImplicitTls,
    /// Plaintext greeting, then an in-band upgrade with `STARTTLS`.
    StartTls,
}

impl SecurityMode {
    /// from_legacy_flags folds the historical `ssl_enabled`/`starttls_enabled` pair into one mode.
    ///
    /// `ssl_enabled` takes precedence when both are set.
    pub fn from_legacy_flags(ssl_enabled: bool, starttls_enabled: bool) -> Self {
        match (ssl_enabled, starttls_enabled) {
            (true, _) => SecurityMode::ImplicitTls,
            (false, true) => SecurityMode::StartTls,
            (false, false) => SecurityMode::Plain,
        }
    }
}

impl Protocol {
    pub fn default_port(self, mode: SecurityMode) -> u16 {
        match (self, mode) {
            (Protocol::Smtp, SecurityMode::Plain) => 25,
            (Protocol::Smtp, SecurityMode::StartTls) => 587,
            (Protocol::Smtp, SecurityMode::ImplicitTls) => 465,
            (Protocol::Imap, SecurityMode::Plain) => 143,
            (Protocol::Imap, SecurityMode::StartTls) => 143,
            (Protocol::Imap, SecurityMode::ImplicitTls) => 993,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if self.password.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        Ok(())
    }
}

// password never ends up in logs or panics
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// TransportConfig is a validated, immutable set of connection parameters.
///
/// Sessions take it by value, so it can't change once a connection is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    protocol: Protocol,
    host: String,
    port: u16,
    credentials: Option<Credentials>,
    security: SecurityMode,
    timeout: Duration,
}

impl TransportConfig {
    pub fn builder<H: Into<String>>(protocol: Protocol, host: H) -> TransportConfigBuilder {
        TransportConfigBuilder {
            protocol,
            host: host.into(),
            port: None,
            credentials: None,
            security: SecurityMode::StartTls,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// from_settings builds config from its deserialized, legacy-shaped form.
    pub fn from_settings(protocol: Protocol, settings: &TransportSettings) -> Result<Self, ConfigError> {
        let mut b = TransportConfig::builder(protocol, settings.host.as_str())
            .legacy_flags(settings.ssl_enabled, settings.starttls_enabled);
        if let Some(port) = settings.port {
            if port == 0 || port > u32::from(u16::max_value()) {
                return Err(ConfigError::InvalidPort);
            }
            b = b.port(port as u16);
        }
        match (&settings.username, &settings.password) {
            (None, None) => {}
            (u, p) => {
                b = b.credentials(Credentials::new(
                    u.clone().unwrap_or_default(),
                    p.clone().unwrap_or_default(),
                ));
            }
        }
        if let Some(secs) = settings.timeout_secs {
            b = b.timeout(Duration::from_secs(secs));
        }
        b.build()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn security(&self) -> SecurityMode {
        self.security
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfigBuilder {
    protocol: Protocol,
    host: String,
    port: Option<u16>,
    credentials: Option<Credentials>,
    security: SecurityMode,
    timeout: Duration,
}

impl TransportConfigBuilder {
    /// port overrides the protocol default for the chosen security mode.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn security(mut self, mode: SecurityMode) -> Self {
        self.security = mode;
        self
    }

    pub fn legacy_flags(self, ssl_enabled: bool, starttls_enabled: bool) -> Self {
        self.security(SecurityMode::from_legacy_flags(ssl_enabled, starttls_enabled))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TransportConfig, ConfigError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ConfigError::InvalidHost(host.to_string()));
        }
        let port = self.port.unwrap_or_else(|| self.protocol.default_port(self.security));
        if port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if let Some(c) = &self.credentials {
            c.validate()?;
        }
        if self.timeout == Duration::from_secs(0) {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(TransportConfig {
            protocol: self.protocol,
            host: host.to_string(),
            port,
            credentials: self.credentials,
            security: self.security,
            timeout: self.timeout,
        })
    }
}

/// TransportSettings is the on-disk shape of one endpoint.
///
/// It keeps the two historical TLS booleans; `TransportConfig::from_settings` resolves them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TransportSettings {
    pub host: String,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub port: Option<u32>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub username: Option<String>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub password: Option<String>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub ssl_enabled: bool,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub starttls_enabled: bool,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SettingsFile {
    #[cfg_attr(feature = "serialize", serde(default))]
    pub smtp: Option<TransportSettings>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub imap: Option<TransportSettings>,
}

impl SettingsFile {
    pub fn smtp_config(&self) -> Result<Option<TransportConfig>, ConfigError> {
        self.smtp.as_ref()
            .map(|s| TransportConfig::from_settings(Protocol::Smtp, s))
            .transpose()
    }

    pub fn imap_config(&self) -> Result<Option<TransportConfig>, ConfigError> {
        self.imap.as_ref()
            .map(|s| TransportConfig::from_settings(Protocol::Imap, s))
            .transpose()
    }
}

#[cfg(feature = "serialize")]
pub fn parse_settings(text: &str) -> Result<SettingsFile, ConfigError> {
    serde_yaml::from_str(text).map_err(|e| ConfigError::Settings(e.to_string()))
}

/// load_settings reads a YAML file with optional `smtp:` and `imap:` sections.
#[cfg(feature = "serialize")]
pub fn load_settings<P: AsRef<std::path::Path>>(path: P) -> Result<SettingsFile, ConfigError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| ConfigError::Settings(format!("{}: {}", path.display(), e)))?;
    serde_yaml::from_reader(std::io::BufReader::new(file))
        .map_err(|e| ConfigError::Settings(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_legacy_flags_resolve_to_one_mode() {
        for (ssl, starttls, mode) in [
            (false, false, SecurityMode::Plain),
            (false, true, SecurityMode::StartTls),
            (true, false, SecurityMode::ImplicitTls),
            (true, true, SecurityMode::ImplicitTls),
        ].iter() {
            assert_eq!(SecurityMode::from_legacy_flags(*ssl, *starttls), *mode);
        }
    }

    #[test]
    fn test_default_ports() {
        for (p, m, port) in [
            (Protocol::Smtp, SecurityMode::Plain, 25),
            (Protocol::Smtp, SecurityMode::StartTls, 587),
            (Protocol::Smtp, SecurityMode::ImplicitTls, 465),
            (Protocol::Imap, SecurityMode::Plain, 143),
            (Protocol::Imap, SecurityMode::StartTls, 143),
            (Protocol::Imap, SecurityMode::ImplicitTls, 993),
        ].iter() {
            let c = TransportConfig::builder(*p, "mail.example.com")
                .security(*m)
                .build()
                .unwrap();
            assert_eq!(c.port(), *port);
        }
    }

    #[test]
    fn test_build_rejects_invalid_values() {
        for (b, e) in [
            (TransportConfig::builder(Protocol::Smtp, ""), ConfigError::EmptyHost),
            (TransportConfig::builder(Protocol::Smtp, "   "), ConfigError::EmptyHost),
            (
                TransportConfig::builder(Protocol::Smtp, "mail example.com"),
                ConfigError::InvalidHost("mail example.com".to_string()),
            ),
            (TransportConfig::builder(Protocol::Smtp, "mx").port(0), ConfigError::InvalidPort),
            (
                TransportConfig::builder(Protocol::Imap, "mx").credentials(Credentials::new("", "pw")),
                ConfigError::EmptyUsername,
            ),
            (
                TransportConfig::builder(Protocol::Imap, "mx").credentials(Credentials::new("me", "")),
                ConfigError::EmptyPassword,
            ),
            (
                TransportConfig::builder(Protocol::Imap, "mx").timeout(Duration::from_secs(0)),
                ConfigError::ZeroTimeout,
            ),
        ].iter().cloned() {
            assert_eq!(b.build().unwrap_err(), e);
        }
    }

    #[test]
    fn test_from_settings() {
        let s = TransportSettings {
            host: "imap.example.com".to_string(),
            port: None,
            username: Some("user@example.com".to_string()),
            password: Some("secret".to_string()),
            ssl_enabled: true,
            starttls_enabled: true,
            timeout_secs: Some(5),
        };
        let c = TransportConfig::from_settings(Protocol::Imap, &s).unwrap();
        assert_eq!(c.security(), SecurityMode::ImplicitTls);
        assert_eq!(c.port(), 993);
        assert_eq!(c.timeout(), Duration::from_secs(5));
        assert_eq!(c.credentials().unwrap().username, "user@example.com");

        let mut s = s;
        s.port = Some(70000);
        assert_eq!(TransportConfig::from_settings(Protocol::Imap, &s).unwrap_err(), ConfigError::InvalidPort);

        s.port = Some(2525);
        s.password = None;
        assert_eq!(TransportConfig::from_settings(Protocol::Smtp, &s).unwrap_err(), ConfigError::EmptyPassword);
    }

    #[test]
    fn test_debug_hides_password() {
        let c = Credentials::new("me", "hunter2");
        assert!(!format!("{:?}", c).contains("hunter2"));
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_can_parse_settings_yaml() {
        let text = "smtp:\n  host: smtp.example.com\n  port: 587\n  username: user@example.com\n  password: pw\n  starttls_enabled: true\nimap:\n  host: imap.example.com\n  ssl_enabled: true\n";
        let f = parse_settings(text).unwrap();
        let smtp = f.smtp_config().unwrap().unwrap();
        assert_eq!(smtp.security(), SecurityMode::StartTls);
        assert_eq!(smtp.port(), 587);
        let imap = f.imap_config().unwrap().unwrap();
        assert_eq!(imap.security(), SecurityMode::ImplicitTls);
        assert_eq!(imap.port(), 993);
        assert!(imap.credentials().is_none());

        assert!(parse_settings("smtp: [").is_err());
    }
}
