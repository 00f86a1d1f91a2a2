//! MIME multipart/mixed composer.

use std::path::Path;

use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::encoding::base64::encode_wrapped;
use crate::encoding::multipart::{contains_boundary, BoundarySource, RandomBoundary};
use crate::encoding::quoted_printable::QuotedPrintableEncoder;
use crate::encoding::Encoder;
use crate::error::{TransportError, TransportResult};
use crate::mail::address::EmailAddress;
use crate::mail::header::ContentTransferEncoding;
use crate::mail::message::EmailMessage;
use crate::store::{AttachmentStore, FsAttachmentStore, StoreError};
use crate::utils::quoted::{encode_header_value, quote_string};

/// MAX_BOUNDARY_ATTEMPTS is how many candidates are tried before giving up.
pub const MAX_BOUNDARY_ATTEMPTS: usize = 8;

/// RFC 5322 hard limit, CRLF excluded.
const MAX_LINE_LENGTH: usize = 998;
const FOLD_AT: usize = 76;

/// normalize_line_endings turns lone `\r` and `\n` into `\r\n`.
pub fn normalize_line_endings(text: &str) -> String {
    let mut res = String::with_capacity(text.len() + text.len() / 32);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                res.push_str("\r\n");
            }
            '\n' => res.push_str("\r\n"),
            c => res.push(c),
        }
    }
    res
}

/// body_transfer_encoding picks `7bit` for short-lined ascii and `quoted-printable` otherwise.
/// Text is expected to be CRLF normalized.
pub fn body_transfer_encoding(text: &str) -> ContentTransferEncoding {
    if text.is_ascii() && text.split("\r\n").all(|l| l.len() <= MAX_LINE_LENGTH) {
        ContentTransferEncoding::SevenBit
    } else {
        ContentTransferEncoding::QuotedPrintable
    }
}

struct EncodedAttachment {
    filename: String,
    content_type: String,
    raw: Vec<u8>,
    encoded: String,
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

/// fold_address_list joins mailboxes with `, ` and folds line before it gets too long.
fn fold_address_list(name: &str, list: &[EmailAddress]) -> String {
    let mut res = String::new();
    let mut column = name.len() + 2;
    for (i, a) in list.iter().enumerate() {
        let rendered = a.to_header();
        if i > 0 {
            if column + 2 + rendered.len() > FOLD_AT {
                res.push_str(",\r\n ");
                column = 1;
            } else {
                res.push_str(", ");
                column += 2;
            }
        }
        column += rendered.len();
        res.push_str(&rendered);
    }
    res
}

/// filename_value renders file name as quoted parameter value.
/// Non ascii names are carried as RFC 2047 encoded words inside the quotes.
fn filename_value(name: &str) -> String {
    match encode_header_value(name) {
        std::borrow::Cow::Borrowed(n) => quote_string(n),
        std::borrow::Cow::Owned(encoded) => format!("\"{}\"", encoded),
    }
}

fn generate_message_id(domain: &str) -> String {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("<{}@{}>", id, domain)
}

/// MimeEncoder serializes `EmailMessage` into `multipart/mixed` entity ready for SMTP `DATA`.
///
/// Output always uses CRLF line endings. Bcc recipients never appear in produced headers.
pub struct MimeEncoder<S = RandomBoundary, A = FsAttachmentStore> {
    boundaries: S,
    store: A,
}

impl MimeEncoder {
    pub fn new() -> Self {
        Self {
            boundaries: RandomBoundary,
            store: FsAttachmentStore,
        }
    }
}

impl Default for MimeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: BoundarySource, A: AttachmentStore> MimeEncoder<S, A> {
    pub fn with_parts(boundaries: S, store: A) -> Self {
        Self { boundaries, store }
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    fn load_attachment(&self, path: &Path) -> TransportResult<Option<EncodedAttachment>> {
        let raw = match self.store.read_attachment(path) {
            Ok(raw) => raw,
            Err(StoreError::NotFound(p)) => {
                warn!("attachment {} does not exist, skipping", p.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let filename = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let encoded = encode_wrapped(&raw);
        Ok(Some(EncodedAttachment {
            filename,
            content_type,
            raw,
            encoded,
        }))
    }

    fn choose_boundary(&mut self, body: &str, encoded_body: &str, attachments: &[EncodedAttachment]) -> TransportResult<String> {
        for attempt in 0..MAX_BOUNDARY_ATTEMPTS {
            let candidate = self.boundaries.next_boundary();
            let collides = contains_boundary(body.as_bytes(), &candidate)
                || contains_boundary(encoded_body.as_bytes(), &candidate)
                || attachments.iter().any(|a| {
                    contains_boundary(&a.raw, &candidate)
                        || contains_boundary(a.encoded.as_bytes(), &candidate)
                        || contains_boundary(a.filename.as_bytes(), &candidate)
                });
            if !collides {
                return Ok(candidate);
            }
            debug!("boundary candidate {} collided with content (attempt {})", candidate, attempt + 1);
        }
        Err(TransportError::Encoding(format!(
            "no collision free boundary after {} attempts",
            MAX_BOUNDARY_ATTEMPTS
        )))
    }

    /// encode validates message and produces whole MIME entity, headers included.
    pub fn encode(&mut self, message: &EmailMessage) -> TransportResult<Vec<u8>> {
        let addresses = message.validate()?;

        let body = normalize_line_endings(&message.body);
        let body_encoding = body_transfer_encoding(&body);
        let encoded_body = match body_encoding {
            ContentTransferEncoding::QuotedPrintable => QuotedPrintableEncoder::encode(body.as_bytes()),
            _ => body.clone(),
        };

        let mut attachments = Vec::with_capacity(message.attachment_paths.len());
        for path in message.attachment_paths.iter() {
            if let Some(a) = self.load_attachment(path)? {
                attachments.push(a);
            }
        }

        let boundary = self.choose_boundary(&body, &encoded_body, &attachments)?;

        let mut out = String::with_capacity(
            1024 + encoded_body.len() + attachments.iter().map(|a| a.encoded.len() + 256).sum::<usize>(),
        );
        push_header(&mut out, "From", &addresses.sender.to_header());
        if !addresses.to.is_empty() {
            push_header(&mut out, "To", &fold_address_list("To", &addresses.to));
        }
        if !addresses.cc.is_empty() {
            push_header(&mut out, "Cc", &fold_address_list("Cc", &addresses.cc));
        }
        push_header(&mut out, "Subject", &encode_header_value(&message.subject));
        push_header(&mut out, "Date", &chrono::Utc::now().to_rfc2822());
        push_header(&mut out, "Message-ID", &generate_message_id(addresses.sender.domain()));
        push_header(&mut out, "MIME-Version", "1.0");
        push_header(&mut out, "Content-Type", &format!("multipart/mixed; boundary=\"{}\"", boundary));
        out.push_str("\r\n");

        out.push_str("--");
        out.push_str(&boundary);
        out.push_str("\r\n");
        let text_type = if message.is_html { "text/html" } else { "text/plain" };
        push_header(&mut out, "Content-Type", &format!("{}; charset=utf-8", text_type));
        push_header(&mut out, "Content-Transfer-Encoding", body_encoding.as_str());
        out.push_str("\r\n");
        out.push_str(&encoded_body);

        for a in attachments.iter() {
            let name = filename_value(&a.filename);
            out.push_str("\r\n--");
            out.push_str(&boundary);
            out.push_str("\r\n");
            push_header(&mut out, "Content-Type", &format!("{}; name={}", a.content_type, name));
            push_header(&mut out, "Content-Transfer-Encoding", ContentTransferEncoding::Base64.as_str());
            push_header(&mut out, "Content-Disposition", &format!("attachment; filename={}", name));
            out.push_str("\r\n");
            out.push_str(&a.encoded);
        }

        out.push_str("\r\n--");
        out.push_str(&boundary);
        out.push_str("--\r\n");

        debug!(
            "encoded message with {} attachment(s), {} bytes",
            attachments.len(),
            out.len()
        );
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use crate::error::ErrorKind;
    use crate::mail::header::{split_head_body, HeaderBag};
    use crate::store::MemoryAttachmentStore;

    use super::*;

    struct FixedBoundaries(Vec<String>);

    impl BoundarySource for FixedBoundaries {
        fn next_boundary(&mut self) -> String {
            if self.0.is_empty() {
                return "exhausted".to_string();
            }
            self.0.remove(0)
        }
    }

    fn encoder(store: MemoryAttachmentStore) -> MimeEncoder<FixedBoundaries, MemoryAttachmentStore> {
        MimeEncoder::with_parts(FixedBoundaries(vec!["----=_Part_b1".to_string()]), store)
    }

    fn encode_text(out: &[u8]) -> &str {
        std::str::from_utf8(out).unwrap()
    }

    #[test]
    fn test_normalize_line_endings() {
        for (i, o) in [
            ("", ""),
            ("a\nb", "a\r\nb"),
            ("a\r\nb\r", "a\r\nb\r\n"),
            ("a\r\rb\n\n", "a\r\n\r\nb\r\n\r\n"),
        ].iter() {
            assert_eq!(normalize_line_endings(i), *o);
        }
    }

    #[test]
    fn test_body_transfer_encoding() {
        for (i, o) in [
            ("hello", ContentTransferEncoding::SevenBit),
            ("żółw", ContentTransferEncoding::QuotedPrintable),
            (&"a".repeat(998)[..], ContentTransferEncoding::SevenBit),
            (&"a".repeat(999)[..], ContentTransferEncoding::QuotedPrintable),
            (&format!("{}\r\nshort", "a".repeat(1200))[..], ContentTransferEncoding::QuotedPrintable),
        ].iter() {
            assert_eq!(body_transfer_encoding(i), *o);
        }
    }

    #[test]
    fn test_encodes_plain_text_message() {
        let m = EmailMessage::new("a@x.com", "Hi", "hello").to("b@y.com");
        let out = encoder(MemoryAttachmentStore::default()).encode(&m).unwrap();
        let text = encode_text(&out);

        let (head, body) = split_head_body(&out);
        let headers = HeaderBag::parse(&head);
        assert_eq!(headers.get("From"), Some("a@x.com"));
        assert_eq!(headers.get("To"), Some("b@y.com"));
        assert_eq!(headers.get("Subject"), Some("Hi"));
        assert_eq!(headers.get("MIME-Version"), Some("1.0"));
        assert_eq!(headers.get("Content-Type"), Some("multipart/mixed; boundary=\"----=_Part_b1\""));
        assert!(headers.get("Message-ID").unwrap().ends_with("@x.com>"));
        assert!(headers.contains("Date"));

        assert_eq!(
            body,
            &b"------=_Part_b1\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            Content-Transfer-Encoding: 7bit\r\n\
            \r\n\
            hello\r\n\
            ------=_Part_b1--\r\n"[..]
        );
        assert!(!text.contains("\n\n"));
        assert!(text.split("\r\n").all(|l| !l.contains('\n') && !l.contains('\r')));
    }

    #[test]
    fn test_encodes_attachment() {
        let mut store = MemoryAttachmentStore::default();
        store.insert("/home/a/report.pdf", b"%PDF");
        let m = EmailMessage::new("a@x.com", "Hi", "hello")
            .to("b@y.com")
            .attach("/home/a/report.pdf");
        let out = encoder(store).encode(&m).unwrap();
        let text = encode_text(&out);

        let expected = "------=_Part_b1\r\n\
            Content-Type: application/pdf; name=\"report.pdf\"\r\n\
            Content-Transfer-Encoding: base64\r\n\
            Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
            \r\n\
            JVBERg==\r\n\
            ------=_Part_b1--\r\n";
        assert!(text.ends_with(expected), "{}", text);
        assert_eq!(text.matches("------=_Part_b1\r\n").count(), 2);
    }

    #[test]
    fn test_missing_attachment_is_skipped() {
        let mut store = MemoryAttachmentStore::default();
        store.insert("b.txt", b"bbb");
        let m = EmailMessage::new("a@x.com", "", "x")
            .to("b@y.com")
            .attach("missing.bin")
            .attach("b.txt");
        let out = encoder(store).encode(&m).unwrap();
        let text = encode_text(&out);
        assert!(!text.contains("missing.bin"));
        assert!(text.contains("Content-Type: text/plain; name=\"b.txt\"\r\n"));
    }

    #[test]
    fn test_unreadable_attachment_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        // reading a directory fails with error other than not found
        let m = EmailMessage::new("a@x.com", "", "x")
            .to("b@y.com")
            .attach(tmp.path().to_path_buf());
        let mut enc = MimeEncoder::with_parts(
            FixedBoundaries(vec!["----=_Part_b1".to_string()]),
            FsAttachmentStore,
        );
        assert_eq!(enc.encode(&m).unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn test_bcc_is_not_in_headers() {
        let m = EmailMessage::new("a@x.com", "Hi", "hello")
            .to("b@y.com")
            .cc("Carl <c@y.com>")
            .bcc("secret@z.com");
        let out = encoder(MemoryAttachmentStore::default()).encode(&m).unwrap();
        let text = encode_text(&out);
        assert!(!text.contains("secret@z.com"));
        let (head, _) = split_head_body(&out);
        assert!(!HeaderBag::parse(&head).contains("Bcc"));
        assert!(text.contains("Cc: Carl <c@y.com>\r\n"));
    }

    #[test]
    fn test_long_recipient_list_is_folded() {
        let mut m = EmailMessage::new("a@x.com", "", "");
        for i in 0..10 {
            m = m.to(format!("recipient{}@example.com", i));
        }
        let out = encoder(MemoryAttachmentStore::default()).encode(&m).unwrap();
        let (head, _) = split_head_body(&out);
        assert!(head.split("\r\n").all(|l| l.len() <= 78), "{}", head);
        let to = HeaderBag::parse(&head).get("To").unwrap().to_string();
        assert_eq!(EmailAddress::parse_list(&to).unwrap().len(), 10);
    }

    #[test]
    fn test_non_ascii_subject_body_and_filename() {
        let mut store = MemoryAttachmentStore::default();
        store.insert("Łódź.txt", b"x");
        let m = EmailMessage::new("a@x.com", "Łódź", "zażółć\ngęślą")
            .to("b@y.com")
            .attach("Łódź.txt");
        let out = encoder(store).encode(&m).unwrap();
        let text = encode_text(&out);
        assert!(text.is_ascii());
        assert!(text.contains("Subject: =?UTF-8?B?xYHDs2TFug==?=\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(text.contains("filename=\"=?UTF-8?B?xYHDs2TFui50eHQ=?=\""));
    }

    #[test]
    fn test_subject_can_not_inject_headers() {
        let m = EmailMessage::new("a@x.com", "Hi\r\nBcc: victim@z.com", "").to("b@y.com");
        let out = encoder(MemoryAttachmentStore::default()).encode(&m).unwrap();
        let (head, _) = split_head_body(&out);
        assert!(!HeaderBag::parse(&head).contains("Bcc"));
    }

    #[test]
    fn test_colliding_boundary_is_regenerated() {
        let m = EmailMessage::new("a@x.com", "", "line\r\n--first\r\n").to("b@y.com");
        let mut enc = MimeEncoder::with_parts(
            FixedBoundaries(vec!["first".to_string(), "second".to_string()]),
            MemoryAttachmentStore::default(),
        );
        let out = enc.encode(&m).unwrap();
        assert!(encode_text(&out).contains("boundary=\"second\""));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let m = EmailMessage::new("a@x.com", "", "always collides").to("b@y.com");
        let mut enc = MimeEncoder::with_parts(
            FixedBoundaries(vec!["collides".to_string(); MAX_BOUNDARY_ATTEMPTS + 1]),
            MemoryAttachmentStore::default(),
        );
        assert_eq!(enc.encode(&m).unwrap_err().kind(), ErrorKind::Encoding);
        assert_eq!(enc.boundaries.0.len(), 1);
    }

    #[test]
    fn test_invalid_message_is_configuration_error() {
        for m in [
            EmailMessage::new("a@x.com", "", ""),
            EmailMessage::new("nobody", "", "").to("b@y.com"),
            EmailMessage::new("a@x.com", "", "").cc("\"v\\\r\\\nBcc: hidden@z.com\"@y.com"),
            EmailMessage::new("a@x.com", "", "").to("\"x\\\r\\\nRCPT TO:<evil@attacker.example>\"@y.com"),
        ].iter() {
            let err = encoder(MemoryAttachmentStore::default()).encode(m).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_attachment_content_type_from_extension() {
        let mut store = MemoryAttachmentStore::default();
        for p in ["a.png", "b.unknownext", "c"].iter() {
            store.insert(p, b"data");
        }
        let m = EmailMessage::new("a@x.com", "", "")
            .to("b@y.com")
            .attach(PathBuf::from("a.png"))
            .attach("b.unknownext")
            .attach("c");
        let out = encoder(store).encode(&m).unwrap();
        let text = encode_text(&out);
        assert!(text.contains("Content-Type: image/png; name=\"a.png\""));
        assert!(text.contains("Content-Type: application/octet-stream; name=\"b.unknownext\""));
        assert!(text.contains("Content-Type: application/octet-stream; name=\"c\""));
    }
}
