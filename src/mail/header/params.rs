use crate::utils::hex::decode_hex_digit;
use crate::utils::quoted::{decode_header_value, take_quoted_string};

/// ParameterizedValue is header value of form `value; name=param; name2="quoted param"`,
/// as used by `Content-Type` and `Content-Disposition`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizedValue {
    pub value: String,
    /// Parameter names are lowercased.
    pub params: Vec<(String, String)>,
}

impl ParameterizedValue {
    /// parse never fails. Malformed parameters are dropped.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.splitn(2, ';');
        let value = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let mut params = Vec::new();
        let mut rest = parts.next().unwrap_or("");

        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }
            let eq = match rest.find('=') {
                Some(eq) => eq,
                None => break,
            };
            let name = rest[..eq].trim().to_ascii_lowercase();
            let after = rest[eq + 1..].trim_start();
            let (param, remaining) = if after.starts_with('"') {
                match take_quoted_string(after) {
                    Ok((v, r)) => (v, r),
                    // unterminated quote, take everything
                    Err(_) => (after.trim_matches('"').to_string(), ""),
                }
            } else {
                let end = after.find(';').unwrap_or_else(|| after.len());
                (after[..end].trim().to_string(), &after[end..])
            };
            if !name.is_empty() {
                params.push((name, param));
            }
            rest = remaining;
        }

        Self { value, params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// text_param returns parameter decoded from either RFC 2231 `name*` form or plain form
    /// possibly carrying RFC 2047 encoded words.
    pub fn text_param(&self, name: &str) -> Option<String> {
        if let Some(extended) = self.param(&format!("{}*", name)) {
            if let Some(v) = decode_extended_value(extended) {
                return Some(v);
            }
        }
        self.param(name).map(decode_header_value)
    }
}

/// decode_extended_value decodes `charset'language'percent-encoded` value.
fn decode_extended_value(text: &str) -> Option<String> {
    let mut it = text.splitn(3, '\'');
    let charset = it.next()?;
    let _language = it.next()?;
    let encoded = it.next()?.as_bytes();

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut i = 0;
    while i < encoded.len() {
        if encoded[i] == b'%' && i + 2 < encoded.len() {
            let h = decode_hex_digit(encoded[i + 1])?;
            let l = decode_hex_digit(encoded[i + 2])?;
            bytes.push(h * 16 + l);
            i += 3;
        } else if encoded[i] == b'%' {
            return None;
        } else {
            bytes.push(encoded[i]);
            i += 1;
        }
    }
    if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.into_iter().map(char::from).collect())
    } else {
        String::from_utf8(bytes).ok()
    }
}
