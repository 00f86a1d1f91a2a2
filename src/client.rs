//! Whole send and receive cycles built from sessions, codecs and attachment store.
//!
//! Both flows tear connection down after mid-flow failure. Teardown is best effort: its own
//! failure is logged and never replaces error which stopped the flow.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::TransportConfig;
use crate::encoding::multipart::BoundarySource;
use crate::error::{RejectedRecipient, RejectedRecipients, TransportError, TransportResult};
use crate::imap::{FetchedMessage, ImapSession};
use crate::mail::decoder::decode;
use crate::mail::encoder::MimeEncoder;
use crate::mail::message::EmailMessage;
use crate::net::Connector;
use crate::smtp::SmtpSession;
use crate::store::AttachmentStore;

/// SendReport describes message accepted by server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    /// Recipients refused with `RCPT TO`. Message was delivered to all others.
    pub rejected: Vec<RejectedRecipient>,
}

impl SendReport {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }

    /// into_result turns partial delivery into `TransportError::PartialSend`.
    pub fn into_result(self) -> TransportResult<()> {
        if self.rejected.is_empty() {
            Ok(())
        } else {
            Err(TransportError::PartialSend(RejectedRecipients(self.rejected)))
        }
    }
}

fn teardown(host: &str, what: &str, res: TransportResult<()>) {
    if let Err(e) = res {
        warn!("{} with {} failed: {}", what, host, e);
    }
}

fn deliver<C: Connector>(
    session: &mut SmtpSession<C>,
    message: &EmailMessage,
    encoded: &[u8],
) -> TransportResult<Vec<RejectedRecipient>> {
    session.negotiate_tls()?;
    session.authenticate()?;
    session.send_transaction(message, encoded)
}

/// send_email encodes `message` and delivers it over single SMTP session.
pub fn send_email<C: Connector>(
    config: TransportConfig,
    message: &EmailMessage,
    connector: C,
) -> TransportResult<SendReport> {
    send_email_with(config, message, connector, &mut MimeEncoder::new())
}

/// send_email_with is `send_email` with caller provided encoder.
///
/// Message is validated and encoded before connection is opened, so invalid addresses and
/// unreadable attachments never reach server.
pub fn send_email_with<C, S, A>(
    config: TransportConfig,
    message: &EmailMessage,
    connector: C,
    encoder: &mut MimeEncoder<S, A>,
) -> TransportResult<SendReport>
where
    C: Connector,
    S: BoundarySource,
    A: AttachmentStore,
{
    message.validate()?;
    let encoded = encoder.encode(message)?;

    let mut session = SmtpSession::new(config, connector);
    session.connect()?;
    let res = deliver(&mut session, message, &encoded);
    let host = session.config().host().to_string();
    teardown(&host, "QUIT", session.quit());

    let rejected = res?;
    if !rejected.is_empty() {
        warn!("{} of the recipients were refused by {}", rejected.len(), host);
    }
    Ok(SendReport { rejected })
}

/// SavedAttachment is single attachment written by `receive_attachments`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SavedAttachment {
    /// Sequence number of message attachment came from.
    pub sequence: u32,
    pub uid: Option<u32>,
    pub content_type: String,
    pub path: PathBuf,
}

fn fetch_folder<C: Connector>(session: &mut ImapSession<C>, folder: &str) -> TransportResult<Vec<FetchedMessage>> {
    session.negotiate_tls()?;
    session.login()?;
    session.select_folder(folder)?;
    session.fetch_messages()
}

/// fallback_filename names attachment which came without one.
fn fallback_filename(sequence: u32, index: usize, content_type: &str) -> String {
    let ext = mime_guess::get_mime_extensions_str(content_type)
        .and_then(|e| e.first())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    format!("attachment-{}-{}{}", sequence, index, ext)
}

/// receive_attachments downloads every message of `folder` and writes their attachments to
/// `directory`. Messages are left unread on server.
pub fn receive_attachments<C, A>(
    config: TransportConfig,
    folder: &str,
    directory: &Path,
    connector: C,
    store: &A,
) -> TransportResult<Vec<SavedAttachment>>
where
    C: Connector,
    A: AttachmentStore,
{
    let mut session = ImapSession::new(config, connector);
    session.connect()?;
    let res = fetch_folder(&mut session, folder);
    let host = session.config().host().to_string();
    teardown(&host, "LOGOUT", session.logout());
    let messages = res?;

    let mut saved = Vec::new();
    for m in messages.iter() {
        let decoded = decode(&m.raw).map_err(|e| {
            TransportError::protocol(&host, &format!("FETCH {}", m.sequence), "OK", &e.to_string())
        })?;
        for (i, part) in decoded.attachments.into_iter().enumerate() {
            let name = match part.filename {
                Some(ref f) => f.clone(),
                None => fallback_filename(m.sequence, i + 1, &part.content_type),
            };
            let path = store.write_attachment(directory, &name, &part.payload)?;
            saved.push(SavedAttachment {
                sequence: m.sequence,
                uid: m.uid,
                content_type: part.content_type,
                path,
            });
        }
    }
    info!(
        "saved {} attachment(s) from {} message(s) in {} to {}",
        saved.len(),
        messages.len(),
        folder,
        directory.display()
    );
    Ok(saved)
}
