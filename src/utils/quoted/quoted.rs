use crate::utils::cc::*;
use crate::utils::quoted::QuotedStringError;

/// take_quoted_string parses quoted string at the beginning of `text`.
/// Returns unescaped content and input left after closing quote.
pub fn take_quoted_string(text: &str) -> Result<(String, &str), QuotedStringError> {
    let mut chars = text.char_indices();
    match chars.next() {
        None => return Err(QuotedStringError::InputEmpty),
        Some((_, '"')) => {}
        Some(_) => return Err(QuotedStringError::FirstCharIsNotQuote),
    }

    let mut out = String::with_capacity(text.len());
    let mut is_escaped = false;
    for (offset, c) in chars {
        match c {
            // quoted-pair, control characters can't be escaped
            c if is_escaped => {
                if !is_vchar(c) && !is_white_space(c) {
                    return Err(QuotedStringError::InvalidCharacter { byte_offset: offset });
                }
                out.push(c);
                is_escaped = false;
            }
            '\\' => is_escaped = true,
            '"' => return Ok((out, &text[offset + 1..])),
            c if is_qtext(c) || is_white_space(c) => out.push(c),
            _ => return Err(QuotedStringError::InvalidCharacter { byte_offset: offset }),
        }
    }
    Err(QuotedStringError::UnexpectedEof)
}

/// unquote_string parses text which has to be exactly one quoted string.
pub fn unquote_string(text: &str) -> Result<String, QuotedStringError> {
    let (res, rest) = take_quoted_string(text)?;
    if !rest.is_empty() {
        return Err(QuotedStringError::InvalidCharacter {
            byte_offset: text.len() - rest.len(),
        });
    }
    Ok(res)
}

/// quote_string wraps text in quotes escaping `"` and `\`.
pub fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
