use std::fmt;
use std::io::{self, Cursor, Error, Read};
use std::str::FromStr;

use crate::encoding::base64::Base64Reader;
use crate::encoding::quoted_printable::QuotedPrintableReader;
use crate::encoding::spaceless::SpacelessReader;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ContentTransferEncoding {
    Base64,
    QuotedPrintable,
    EightBit,
    SevenBit,
    Binary,

    /// Any ContentTransferEncoding that was not recognised. Payload is passed through.
    Other,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}

pub enum ContentTransferEncodingDecoder<R> {
    /// NoDecoder is used for 7bit, 8bit, binary and unknown encodings
    NoDecoder(R),
    Base64(Base64Reader<SpacelessReader<R>>),
    QuotedPrintable(QuotedPrintableReader<R>),
}

impl<R: Read> Read for ContentTransferEncodingDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        match self {
            ContentTransferEncodingDecoder::NoDecoder(r) => r.read(buf),
            ContentTransferEncodingDecoder::Base64(r) => r.read(buf),
            ContentTransferEncodingDecoder::QuotedPrintable(r) => r.read(buf),
        }
    }
}

impl FromStr for ContentTransferEncoding {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let res = if text.eq_ignore_ascii_case("base64") {
            ContentTransferEncoding::Base64
        } else if text.eq_ignore_ascii_case("quoted-printable") {
            ContentTransferEncoding::QuotedPrintable
        } else if text.eq_ignore_ascii_case("8bit") {
            ContentTransferEncoding::EightBit
        } else if text.eq_ignore_ascii_case("7bit") {
            ContentTransferEncoding::SevenBit
        } else if text.eq_ignore_ascii_case("binary") {
            ContentTransferEncoding::Binary
        } else {
            return Err(());
        };
        Ok(res)
    }
}

impl fmt::Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ContentTransferEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentTransferEncoding::Base64 => "base64",
            ContentTransferEncoding::QuotedPrintable => "quoted-printable",
            ContentTransferEncoding::EightBit => "8bit",
            ContentTransferEncoding::SevenBit => "7bit",
            ContentTransferEncoding::Binary => "binary",
            ContentTransferEncoding::Other => "x-unknown",
        }
    }

    pub fn get_decoder<R>(self, r: R) -> ContentTransferEncodingDecoder<R> {
        match self {
            ContentTransferEncoding::Base64 => {
                ContentTransferEncodingDecoder::Base64(Base64Reader::new(SpacelessReader::new(r)))
            }
            ContentTransferEncoding::QuotedPrintable => {
                ContentTransferEncodingDecoder::QuotedPrintable(QuotedPrintableReader::new(r))
            }
            _ => ContentTransferEncodingDecoder::NoDecoder(r),
        }
    }

    /// decode_bytes decodes whole transfer encoded payload.
    pub fn decode_bytes(self, data: &[u8]) -> Result<Vec<u8>, io::Error> {
        let mut res = Vec::with_capacity(data.len());
        self.get_decoder(Cursor::new(data)).read_to_end(&mut res)?;
        Ok(res)
    }

    /// parse can't fail. Unrecognised encoding yields `Other`.
    pub fn parse(text: &str) -> ContentTransferEncoding {
        ContentTransferEncoding::from_str(text).unwrap_or(ContentTransferEncoding::Other)
    }
}
