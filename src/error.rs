//! Error taxonomy shared by every component of the transport.
//!
//! Each failure carries enough context (host, command, server reply) to be reported without
//! having to keep the session around. `TransportError::kind` gives a `Copy` discriminant for
//! callers that only need to branch.

use std::error::Error;
use std::fmt;
use std::io;

/// ErrorKind is the coarse classification of `TransportError`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Authentication,
    Protocol,
    Io,
    Encoding,
    PartialSend,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[display(fmt = "host must not be empty")]
    EmptyHost,
    #[display(fmt = "host {:?} contains whitespace or control characters", _0)]
    InvalidHost(String),
    #[display(fmt = "port must be in range 1-65535")]
    InvalidPort,
    #[display(fmt = "username must not be empty")]
    EmptyUsername,
    #[display(fmt = "password must not be empty")]
    EmptyPassword,
    #[display(fmt = "credentials are required to log in")]
    MissingCredentials,
    #[display(fmt = "timeout must be greater than zero")]
    ZeroTimeout,
    #[display(fmt = "{:?} is not a valid local@domain address", _0)]
    InvalidAddress(String),
    #[display(fmt = "message has no recipients")]
    NoRecipients,
    #[display(fmt = "settings could not be loaded: {}", _0)]
    Settings(String),
}

/// RejectedRecipient is a single `RCPT TO` refused by the server.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "{} ({} {})", address, code, text)]
pub struct RejectedRecipient {
    pub address: String,
    pub code: u16,
    pub text: String,
}

/// RejectedRecipients is the list carried by `TransportError::PartialSend`.
#[derive(Debug, Clone, PartialEq, Eq, Default, From)]
pub struct RejectedRecipients(pub Vec<RejectedRecipient>);

impl fmt::Display for RejectedRecipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

#[derive(Debug, Display, From)]
pub enum TransportError {
    #[display(fmt = "invalid configuration: {}", _0)]
    #[from]
    Configuration(ConfigError),

    #[display(fmt = "connection to {} failed: {}", host, reason)]
    Connection { host: String, reason: String },

    #[display(fmt = "{} rejected credentials: {} {}", host, code, text)]
    Authentication { host: String, code: String, text: String },

    /// Protocol is returned for any reply that does not fit the current state of the session.
    #[display(fmt = "{} answered {:?} with {} {}", host, command, code, text)]
    Protocol {
        host: String,
        command: String,
        code: String,
        text: String,
    },

    #[display(fmt = "i/o failure on {}: {}", path, source)]
    Io { path: String, source: io::Error },

    #[display(fmt = "mime encoding failed: {}", _0)]
    Encoding(String),

    /// PartialSend means the message was delivered but some recipients were refused.
    #[display(fmt = "message accepted, recipients rejected: {}", _0)]
    PartialSend(RejectedRecipients),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Configuration(_) => ErrorKind::Configuration,
            TransportError::Connection { .. } => ErrorKind::Connection,
            TransportError::Authentication { .. } => ErrorKind::Authentication,
            TransportError::Protocol { .. } => ErrorKind::Protocol,
            TransportError::Io { .. } => ErrorKind::Io,
            TransportError::Encoding(_) => ErrorKind::Encoding,
            TransportError::PartialSend(_) => ErrorKind::PartialSend,
        }
    }

    pub(crate) fn connection(host: &str, reason: impl fmt::Display) -> Self {
        TransportError::Connection {
            host: host.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(host: &str, command: &str, code: impl fmt::Display, text: &str) -> Self {
        TransportError::Protocol {
            host: host.to_string(),
            command: command.to_string(),
            code: code.to_string(),
            text: text.to_string(),
        }
    }

    pub(crate) fn authentication(host: &str, code: impl fmt::Display, text: &str) -> Self {
        TransportError::Authentication {
            host: host.to_string(),
            code: code.to_string(),
            text: text.to_string(),
        }
    }

    pub(crate) fn io(path: impl fmt::Display, source: io::Error) -> Self {
        TransportError::Io {
            path: path.to_string(),
            source,
        }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransportError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error for ConfigError {}

pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        for (e, k) in [
            (TransportError::from(ConfigError::EmptyHost), ErrorKind::Configuration),
            (TransportError::connection("mx", "refused"), ErrorKind::Connection),
            (TransportError::authentication("mx", 535, "bad"), ErrorKind::Authentication),
            (TransportError::protocol("mx", "DATA", 554, "no"), ErrorKind::Protocol),
            (TransportError::io("/tmp/x", io::Error::from(io::ErrorKind::NotFound)), ErrorKind::Io),
            (TransportError::Encoding("boundary".to_string()), ErrorKind::Encoding),
            (TransportError::PartialSend(RejectedRecipients::default()), ErrorKind::PartialSend),
        ].iter() {
            assert_eq!(e.kind(), *k);
        }
    }

    #[test]
    fn test_display_carries_context() {
        let e = TransportError::protocol("smtp.example.com", "RCPT TO:<b@y.com>", 550, "no such user");
        assert_eq!(
            e.to_string(),
            "smtp.example.com answered \"RCPT TO:<b@y.com>\" with 550 no such user"
        );

        let e = TransportError::PartialSend(RejectedRecipients(vec![
            RejectedRecipient { address: "a@x.com".to_string(), code: 550, text: "unknown".to_string() },
            RejectedRecipient { address: "b@x.com".to_string(), code: 451, text: "later".to_string() },
        ]));
        assert_eq!(
            e.to_string(),
            "message accepted, recipients rejected: a@x.com (550 unknown), b@x.com (451 later)"
        );
    }

    #[test]
    fn test_component_errors_display() {
        use std::path::PathBuf;

        use crate::encoding::multipart::MultipartError;
        use crate::imap::fetch::FetchParseError;
        use crate::imap::response::ResponseError;
        use crate::mail::decoder::DecodeError;
        use crate::mail::header::ContentTransferEncoding;
        use crate::smtp::reply::ReplyError;
        use crate::store::StoreError;

        for (e, o) in [
            (TransportError::from(ConfigError::NoRecipients).to_string(), "invalid configuration: message has no recipients"),
            (
                ReplyError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")).to_string(),
                "closed",
            ),
            (ReplyError::InconsistentCode { expected: 250, got: 251 }.to_string(), "multiline reply changed code from 250 to 251"),
            (
                ResponseError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")).to_string(),
                "closed",
            ),
            (ResponseError::LiteralTooBig(7).to_string(), "literal of 7 bytes is too big"),
            (DecodeError::from(MultipartError::Unterminated).to_string(), "multipart body has no closing delimiter"),
            (
                DecodeError::TransferEncoding {
                    encoding: ContentTransferEncoding::Base64,
                    reason: "bad padding".to_string(),
                }.to_string(),
                "invalid base64 payload: bad padding",
            ),
            (StoreError::NotFound(PathBuf::from("a.pdf")).to_string(), "a.pdf does not exist"),
            (StoreError::InvalidFilename("..".to_string()).to_string(), "refusing to write attachment named \"..\""),
            (FetchParseError { offset: 3, reason: "expected (" }.to_string(), "expected ( at offset 3"),
            (
                RejectedRecipient { address: "a@x.com".to_string(), code: 550, text: "unknown".to_string() }.to_string(),
                "a@x.com (550 unknown)",
            ),
        ].iter() {
            assert_eq!(e, o);
        }
    }

    #[test]
    fn test_io_error_has_source() {
        let e = TransportError::io("/var/mail", io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(e.source().is_some());
        assert!(TransportError::Encoding(String::new()).source().is_none());
    }
}
