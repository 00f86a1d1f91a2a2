//! Blocking SMTP and IMAP client with MIME multipart encoder and decoder.
//!
//! Typical use goes through `client::send_email` and `client::receive_attachments`.
//! Sessions in `smtp` and `imap` can be driven step by step when finer control is needed.

#[macro_use]
extern crate derive_more;
#[cfg(feature = "serialize")]
#[macro_use]
extern crate serde_derive;

pub(crate) mod utils;
pub mod fuzz;
pub mod encoding;
pub mod mail;

pub mod error;
pub mod config;
pub mod store;
pub mod net;
pub mod smtp;
pub mod imap;
pub mod client;

pub use client::{receive_attachments, send_email, SavedAttachment, SendReport};
pub use config::{Credentials, Protocol, SecurityMode, TransportConfig};
pub use error::{ConfigError, ErrorKind, TransportError, TransportResult};
pub use mail::decoder::{decode, DecodedMessage};
pub use mail::encoder::MimeEncoder;
pub use mail::message::EmailMessage;
pub use mail::part::MimePart;
pub use net::{Connector, TcpConnector};
pub use store::{AttachmentStore, FsAttachmentStore};
