use std::borrow::Cow;

use crate::encoding::base64::{Base64Decoder, Base64Encoder};
use crate::encoding::quoted_printable::QuotedPrintableDecoder;
use crate::encoding::{Decoder, Encoder};
use crate::utils::hex::encode_hex_char;
use crate::utils::quoted::QuotedStringError;

/// Encoded word may not be longer than 75 chars.
const MAX_ENCODED_WORD: usize = 75;
const WORD_OVERHEAD: usize = "=?UTF-8?B??=".len();

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RFC2047Encoding {
    Base64,
    QuotedPrintable,
}

#[inline]
fn is_q_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'!' || b == b'*' || b == b'+' || b == b'-' || b == b'/'
}

impl RFC2047Encoding {
    /// encoded_len returns size of encoded text only, without `=?UTF-8?X?` and `?=` parts.
    pub fn encoded_len(&self, data: &str) -> usize {
        match self {
            RFC2047Encoding::Base64 => (data.len() + 2) / 3 * 4,
            RFC2047Encoding::QuotedPrintable => data.bytes()
                .map(|b| if is_q_safe(b) || b == b' ' { 1 } else { 3 })
                .sum(),
        }
    }

    pub fn rfc_letter(&self) -> &'static str {
        match self {
            RFC2047Encoding::Base64 => "B",
            RFC2047Encoding::QuotedPrintable => "Q",
        }
    }
}

fn encode_q(text: &str, res: &mut String) {
    for b in text.bytes() {
        if is_q_safe(b) {
            res.push(b as char);
        } else if b == b' ' {
            res.push('_');
        } else {
            let enc = encode_hex_char(b);
            res.push('=');
            res.push(enc[0] as char);
            res.push(enc[1] as char);
        }
    }
}

/// encode_rfc_2047 encodes text as single encoded word. It does not care about word length limit.
pub fn encode_rfc_2047(text: &str, encoding: RFC2047Encoding) -> String {
    let mut res = String::with_capacity(WORD_OVERHEAD + encoding.encoded_len(text));
    res.push_str("=?UTF-8?");
    res.push_str(encoding.rfc_letter());
    res.push('?');
    match encoding {
        RFC2047Encoding::QuotedPrintable => encode_q(text, &mut res),
        RFC2047Encoding::Base64 => {
            Base64Encoder::encode_to_string(text.as_bytes(), &mut res);
        }
    }
    res.push_str("?=");
    res
}

/// optimal_encode_rfc_2047 encodes text using either base64 or quoted printable, whichever is shorter.
pub fn optimal_encode_rfc_2047(text: &str) -> String {
    let qp_sz = RFC2047Encoding::QuotedPrintable.encoded_len(text);
    let b64_sz = RFC2047Encoding::Base64.encoded_len(text);
    if b64_sz <= qp_sz {
        encode_rfc_2047(text, RFC2047Encoding::Base64)
    } else {
        encode_rfc_2047(text, RFC2047Encoding::QuotedPrintable)
    }
}

/// encode_header_value returns text unchanged when it is printable ascii.
/// Otherwise it emits base64 encoded words, folded with `\r\n ` so none exceeds 75 chars.
pub fn encode_header_value(text: &str) -> Cow<str> {
    if text.bytes().all(|b| b == b' ' || b == b'\t' || (b'!'..=b'~').contains(&b)) && !text.contains("=?") {
        return Cow::Borrowed(text);
    }
    let max_chunk = (MAX_ENCODED_WORD - WORD_OVERHEAD) / 4 * 3;
    let mut words = Vec::new();
    let mut chunk_start = 0;
    let mut chunk_end = 0;
    for (offset, c) in text.char_indices() {
        let next = offset + c.len_utf8();
        if next - chunk_start > max_chunk {
            words.push(encode_rfc_2047(&text[chunk_start..chunk_end], RFC2047Encoding::Base64));
            chunk_start = chunk_end;
        }
        chunk_end = next;
    }
    if chunk_end > chunk_start || words.is_empty() {
        words.push(encode_rfc_2047(&text[chunk_start..chunk_end], RFC2047Encoding::Base64));
    }
    Cow::Owned(words.join("\r\n "))
}

fn decode_charset(charset: &str, data: Vec<u8>) -> String {
    // language suffix as in `UTF-8*en` is ignored
    let charset = charset.split('*').next().unwrap_or(charset);
    if charset.eq_ignore_ascii_case("iso-8859-1") || charset.eq_ignore_ascii_case("latin1") {
        data.into_iter().map(char::from).collect()
    } else {
        match String::from_utf8(data) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

/// parse_rfc_2047 decodes single encoded word. Whole input has to be the word.
pub fn parse_rfc_2047(text: &str) -> Result<String, QuotedStringError> {
    if text.is_empty() {
        return Err(QuotedStringError::InputEmpty);
    }
    if !text.starts_with("=?") || !text.ends_with("?=") || text.len() < 6 {
        return Err(QuotedStringError::UnexpectedEof);
    }
    let inner = &text[2..text.len() - 2];
    let mut it = inner.splitn(3, '?');
    let (charset, encoding, enc_text) = match (it.next(), it.next(), it.next()) {
        (Some(c), Some(e), Some(t)) if !c.is_empty() => (c, e, t),
        _ => return Err(QuotedStringError::UnexpectedEof),
    };
    if enc_text.contains('?') || enc_text.contains(' ') {
        return Err(QuotedStringError::InvalidEncodedWord);
    }

    let decoded = if encoding.eq_ignore_ascii_case("B") {
        Base64Decoder::decode(enc_text.as_bytes())
    } else if encoding.eq_ignore_ascii_case("Q") {
        QuotedPrintableDecoder::decode(enc_text.replace('_', " ").as_bytes())
    } else {
        return Err(QuotedStringError::InvalidEncoding);
    }.map_err(|_| QuotedStringError::DecodingFailed)?;

    Ok(decode_charset(charset, decoded))
}

/// encoded_word_len returns length of encoded word `text` starts with, if it has proper shape.
fn encoded_word_len(text: &str) -> Option<usize> {
    let q1 = 2 + text.get(2..)?.find('?')?;
    let q2 = q1 + 1 + text.get(q1 + 1..)?.find('?')?;
    let end = q2 + 1 + text.get(q2 + 1..)?.find("?=")?;
    Some(end + 2)
}

/// decode_header_value decodes every encoded word found in unstructured header value.
///
/// Whitespace between adjacent encoded words is dropped. Malformed words are left as they are.
pub fn decode_header_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev_encoded = false;
    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        let decoded = encoded_word_len(candidate)
            .and_then(|len| parse_rfc_2047(&candidate[..len]).ok().map(|d| (len, d)));
        match decoded {
            Some((len, d)) => {
                if !(prev_encoded && before.chars().all(char::is_whitespace)) {
                    out.push_str(before);
                }
                out.push_str(&d);
                rest = &candidate[len..];
                prev_encoded = true;
            }
            None => {
                out.push_str(before);
                out.push_str("=?");
                rest = &candidate[2..];
                prev_encoded = false;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn parse_maybe_rfc_2047(text: &str) -> Result<Cow<str>, QuotedStringError> {
    if text.starts_with("=?") {
        Ok(Cow::Owned(parse_rfc_2047(text)?))
    } else {
        Ok(Cow::Borrowed(text))
    }
}
