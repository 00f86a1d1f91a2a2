//! Splitting of received messages into body text and attachments.

use log::debug;

use crate::encoding::multipart::{split_multipart, MultipartError};
use crate::mail::header::{split_head_body, ContentTransferEncoding, HeaderBag, ParameterizedValue};
use crate::mail::part::MimePart;
use crate::utils::quoted::decode_header_value;

/// Multipart entities nested deeper than this are not descended into.
const MAX_MULTIPART_DEPTH: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Display, From)]
pub enum DecodeError {
    #[display(fmt = "multipart entity has no boundary parameter")]
    MissingBoundary,
    #[display(fmt = "{}", _0)]
    #[from]
    Multipart(MultipartError),
    #[display(fmt = "invalid {} payload: {}", encoding, reason)]
    TransferEncoding {
        encoding: ContentTransferEncoding,
        reason: String,
    },
}

impl std::error::Error for DecodeError {}

/// DecodedMessage is received message split into parts the transport cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct DecodedMessage {
    pub subject: String,
    pub from: String,
    pub body: String,
    pub is_html: bool,
    pub attachments: Vec<MimePart>,
}

/// ContentType keeps fields of `Content-Type` used by decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentType {
    essence: String,
    boundary: Option<String>,
    charset: Option<String>,
    name: Option<String>,
}

impl ContentType {
    fn parse(value: Option<&str>) -> Self {
        let value = match value {
            Some(v) => v,
            None => return Self::default_text(),
        };
        // `name` may be RFC 2231 or 2047 encoded, mime keeps it raw
        let params = ParameterizedValue::parse(value);
        let name = params.text_param("name");

        match value.trim().parse::<mime::Mime>() {
            Ok(m) => Self {
                essence: m.essence_str().to_string(),
                boundary: m.get_param(mime::BOUNDARY).map(|b| b.as_str().trim_matches('"').to_string()),
                charset: m.get_param(mime::CHARSET).map(|c| c.as_str().trim_matches('"').to_string()),
                name,
            },
            // mime is strict about parameter syntax, real world headers are not
            Err(_) => Self {
                boundary: params.param("boundary").map(str::to_string),
                charset: params.param("charset").map(str::to_string),
                essence: params.value,
                name,
            },
        }
    }

    fn default_text() -> Self {
        Self {
            essence: "text/plain".to_string(),
            boundary: None,
            charset: None,
            name: None,
        }
    }

    fn is_multipart(&self) -> bool {
        self.essence.starts_with("multipart/")
    }

    fn is_text(&self) -> bool {
        self.essence == "text/plain" || self.essence == "text/html"
    }
}

/// decode_text turns payload into string. Latin-1 is mapped directly, anything else is read as UTF-8.
fn decode_text(charset: Option<&str>, payload: Vec<u8>) -> String {
    match charset {
        Some(c) if c.eq_ignore_ascii_case("iso-8859-1") || c.eq_ignore_ascii_case("latin1") || c.eq_ignore_ascii_case("us-ascii") => {
            payload.into_iter().map(char::from).collect()
        }
        _ => match String::from_utf8(payload) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    }
}

struct Collector {
    message: DecodedMessage,
    body_found: bool,
}

impl Collector {
    fn visit(&mut self, headers: &HeaderBag, body: &[u8], depth: usize) -> Result<(), DecodeError> {
        let ct = ContentType::parse(headers.get("Content-Type"));

        if ct.is_multipart() {
            if depth > MAX_MULTIPART_DEPTH {
                debug!("skipping {} nested {} levels deep", ct.essence, depth);
                return Ok(());
            }
            let boundary = ct.boundary.as_ref().ok_or(DecodeError::MissingBoundary)?;
            for part in split_multipart(body, boundary)? {
                let (head, part_body) = split_head_body(part);
                let part_headers = HeaderBag::parse(&head);
                self.visit(&part_headers, part_body, depth + 1)?;
            }
            return Ok(());
        }

        let encoding = headers.get("Content-Transfer-Encoding")
            .map(ContentTransferEncoding::parse)
            .unwrap_or_default();
        let payload = encoding.decode_bytes(body).map_err(|e| DecodeError::TransferEncoding {
            encoding,
            reason: e.to_string(),
        })?;

        let disposition = headers.get("Content-Disposition").map(ParameterizedValue::parse);
        let filename = disposition.as_ref()
            .and_then(|d| d.text_param("filename"))
            .or_else(|| ct.name.clone());
        let is_attachment = filename.is_some()
            || disposition.as_ref().map(|d| d.value == "attachment").unwrap_or(false);

        if !is_attachment && !self.body_found && (ct.is_text() || depth == 0) {
            self.message.body = decode_text(ct.charset.as_deref(), payload);
            self.message.is_html = ct.essence == "text/html";
            self.body_found = true;
        } else if is_attachment {
            self.message.attachments.push(MimePart {
                content_type: ct.essence,
                filename,
                transfer_encoding: Some(encoding),
                payload,
            });
        } else {
            debug!("skipping inline {} part", ct.essence);
        }
        Ok(())
    }
}

/// decode splits raw RFC 822 message into body text and attachment parts.
///
/// Only one level of nested multipart (such as `multipart/alternative` inside
/// `multipart/mixed`) is searched. First text part which is not an attachment becomes the body.
pub fn decode(raw: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let (head, body) = split_head_body(raw);
    let headers = HeaderBag::parse(&head);

    let mut c = Collector {
        message: DecodedMessage {
            subject: headers.get("Subject").map(decode_header_value).unwrap_or_default(),
            from: headers.get("From").map(decode_header_value).unwrap_or_default(),
            ..Default::default()
        },
        body_found: false,
    };
    c.visit(&headers, body, 0)?;
    Ok(c.message)
}
