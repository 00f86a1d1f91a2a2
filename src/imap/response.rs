use std::io::{self, Read, Write};

use crate::net::LineChannel;

/// Literals bigger than this are refused instead of allocated.
pub const MAX_LITERAL_SIZE: usize = 256 * 1024 * 1024;

#[derive(Debug, Display, From)]
pub enum ResponseError {
    #[display(fmt = "{}", _0)]
    #[from]
    Io(io::Error),
    #[display(fmt = "malformed response {:?}", _0)]
    Malformed(String),
    #[display(fmt = "literal of {} bytes is too big", _0)]
    LiteralTooBig(usize),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl Status {
    pub fn parse(text: &str) -> Option<Self> {
        if text.eq_ignore_ascii_case("OK") {
            Some(Status::Ok)
        } else if text.eq_ignore_ascii_case("NO") {
            Some(Status::No)
        } else if text.eq_ignore_ascii_case("BAD") {
            Some(Status::Bad)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::No => "NO",
            Status::Bad => "BAD",
        }
    }
}

/// Untagged is `* ...` response.
///
/// Literals are cut out of `text`. Their `{n}` markers stay in place and payloads are kept
/// in `literals` in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Untagged {
    /// number is set for responses like `* 5 EXISTS` or `* 1 FETCH (...)`.
    pub number: Option<u32>,
    /// kind is uppercased first word after number, for instance `EXISTS`, `OK` or `BYE`.
    pub kind: String,
    pub text: String,
    pub literals: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Tagged { tag: String, status: Status, text: String },
    Untagged(Untagged),
    Continuation(String),
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(' ') {
        Some(p) => (&text[..p], &text[p + 1..]),
        None => (text, ""),
    }
}

/// literal_size returns size announced by `{n}` or `{n+}` at the end of line.
pub fn literal_size(line: &str) -> Result<Option<usize>, ResponseError> {
    if !line.ends_with('}') {
        return Ok(None);
    }
    let open = match line.rfind('{') {
        Some(o) => o,
        None => return Ok(None),
    };
    let inner = line[open + 1..line.len() - 1].trim_end_matches('+');
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let n = inner.parse::<usize>().map_err(|_| ResponseError::Malformed(line.to_string()))?;
    if n > MAX_LITERAL_SIZE {
        return Err(ResponseError::LiteralTooBig(n));
    }
    Ok(Some(n))
}

impl Response {
    /// parse parses response which literals were already read.
    pub fn parse(line: &str, literals: Vec<Vec<u8>>) -> Result<Self, ResponseError> {
        let malformed = || ResponseError::Malformed(line.to_string());
        if line == "+" || line.starts_with("+ ") {
            return Ok(Response::Continuation(line.get(2..).unwrap_or("").to_string()));
        }
        if let Some(rest) = line.strip_prefix("* ") {
            let (first, after) = split_word(rest);
            let (number, kind, text) = if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()) {
                let number = first.parse::<u32>().map_err(|_| malformed())?;
                let (kind, text) = split_word(after);
                (Some(number), kind, text)
            } else {
                (None, first, after)
            };
            if kind.is_empty() {
                return Err(malformed());
            }
            return Ok(Response::Untagged(Untagged {
                number,
                kind: kind.to_ascii_uppercase(),
                text: text.to_string(),
                literals,
            }));
        }

        let (tag, rest) = split_word(line);
        let valid_tag = !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.');
        if !valid_tag {
            return Err(malformed());
        }
        let (status, text) = split_word(rest);
        let status = Status::parse(status).ok_or_else(malformed)?;
        Ok(Response::Tagged {
            tag: tag.to_string(),
            status,
            text: text.to_string(),
        })
    }

    /// read reads one response, including every literal it carries.
    pub fn read<S: Read + Write>(channel: &mut LineChannel<S>) -> Result<Self, ResponseError> {
        let mut line = channel.read_line()?;
        let mut literals = Vec::new();
        // only the fragment following a literal may announce the next one
        let mut pending = literal_size(&line)?;
        while let Some(n) = pending {
            literals.push(channel.read_exact_bytes(n)?);
            let continued = channel.read_line()?;
            pending = literal_size(&continued)?;
            line.push_str(&continued);
        }
        Response::parse(&line, literals)
    }
}
