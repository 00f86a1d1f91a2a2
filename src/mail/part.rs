use crate::mail::header::ContentTransferEncoding;

/// MimePart is single leaf entity of multipart message with its payload already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct MimePart {
    /// Essence of content type, for instance `application/pdf`.
    pub content_type: String,
    pub filename: Option<String>,
    /// Encoding the payload was transferred with.
    pub transfer_encoding: Option<ContentTransferEncoding>,
    pub payload: Vec<u8>,
}

impl MimePart {
    pub fn new<C: Into<String>>(content_type: C, payload: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            filename: None,
            transfer_encoding: None,
            payload,
        }
    }

    pub fn with_filename<F: Into<String>>(mut self, filename: F) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn is_text(&self) -> bool {
        self.content_type.starts_with("text/")
    }
}
