use std::borrow::Cow;

use crate::encoding::multipart::find_subslice;

fn is_char_valid_name_char(c: char) -> bool {
    match c {
        '!'..='\'' => true,
        '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~' => true,
        '0'..='9' | 'a'..='z' | 'A'..='Z' => true,
        _ => false,
    }
}

/// HeaderBag keeps unfolded headers in order of appearance.
/// Names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    headers: Vec<(String, String)>,
}

impl HeaderBag {
    /// parse unfolds continuation lines and splits `Name: value` pairs.
    ///
    /// Lines which are not headers (no colon or invalid name) are skipped, real world mail
    /// carries all kinds of garbage there.
    pub fn parse(text: &str) -> Self {
        let mut headers: Vec<(String, String)> = Vec::new();
        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, v)) = headers.last_mut() {
                    v.push(' ');
                    v.push_str(line.trim_start());
                }
                continue;
            }
            let colon = match line.find(':') {
                Some(c) => c,
                None => continue,
            };
            let name = line[..colon].trim_end();
            if name.is_empty() || !name.chars().all(is_char_valid_name_char) {
                continue;
            }
            headers.push((name.to_string(), line[colon + 1..].trim().to_string()));
        }
        Self { headers }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item=&'a str> + 'a {
        self.headers.iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// split_head_body splits raw entity at first empty line.
/// Entity which begins with empty line has no headers.
pub fn split_head_body(raw: &[u8]) -> (Cow<str>, &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (Cow::Borrowed(""), &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (Cow::Borrowed(""), &raw[1..]);
    }
    let crlf = find_subslice(raw, b"\r\n\r\n", 0).map(|p| (p, p + 4));
    let lf = find_subslice(raw, b"\n\n", 0).map(|p| (p, p + 2));
    let (head_end, body_start) = match (crlf, lf) {
        (Some(a), Some(b)) => if a.0 <= b.0 { a } else { b },
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => (raw.len(), raw.len()),
    };
    (String::from_utf8_lossy(&raw[..head_end]), &raw[body_start..])
}
