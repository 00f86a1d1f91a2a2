use std::path::PathBuf;

use crate::error::ConfigError;
use crate::mail::address::EmailAddress;

/// EmailMessage is outgoing message before MIME encoding.
///
/// Addresses are kept as given. They may carry display name (`Jane <jane@example.com>`),
/// envelope uses bare address only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EmailMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub cc_recipients: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub bcc_recipients: Vec<String>,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub subject: String,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub body: String,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub is_html: bool,
    #[cfg_attr(feature = "serialize", serde(default))]
    pub attachment_paths: Vec<PathBuf>,
}

/// ValidatedAddresses holds parsed sender and header/envelope recipients of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAddresses {
    pub sender: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
}

impl ValidatedAddresses {
    /// envelope returns bare addresses for `RCPT TO`: to, then cc, then bcc.
    pub fn envelope(&self) -> impl Iterator<Item=&str> {
        self.to.iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(|a| a.address.as_str())
    }
}

fn parse_address(text: &str) -> Result<EmailAddress, ConfigError> {
    EmailAddress::parse_single(text).map_err(|_| ConfigError::InvalidAddress(text.to_string()))
}

fn parse_all(list: &[String]) -> Result<Vec<EmailAddress>, ConfigError> {
    list.iter().map(|a| parse_address(a)).collect()
}

impl EmailMessage {
    pub fn new<F, S, B>(sender: F, subject: S, body: B) -> Self
        where F: Into<String>, S: Into<String>, B: Into<String>
    {
        Self {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn to<A: Into<String>>(mut self, address: A) -> Self {
        self.recipients.push(address.into());
        self
    }

    pub fn cc<A: Into<String>>(mut self, address: A) -> Self {
        self.cc_recipients.push(address.into());
        self
    }

    pub fn bcc<A: Into<String>>(mut self, address: A) -> Self {
        self.bcc_recipients.push(address.into());
        self
    }

    pub fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    pub fn attach<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.attachment_paths.push(path.into());
        self
    }

    pub fn has_recipients(&self) -> bool {
        !self.recipients.is_empty() || !self.cc_recipients.is_empty() || !self.bcc_recipients.is_empty()
    }

    /// validate checks that message may be sent and returns its parsed addresses.
    pub fn validate(&self) -> Result<ValidatedAddresses, ConfigError> {
        let sender = parse_address(&self.sender)?;
        if !self.has_recipients() {
            return Err(ConfigError::NoRecipients);
        }
        Ok(ValidatedAddresses {
            sender,
            to: parse_all(&self.recipients)?,
            cc: parse_all(&self.cc_recipients)?,
            bcc: parse_all(&self.bcc_recipients)?,
        })
    }
}
