//! Parsing of `FETCH` response item lists.

#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "{} at offset {}", reason, offset)]
pub struct FetchParseError {
    pub offset: usize,
    pub reason: &'static str,
}

/// FetchItems are items of single `FETCH` response this client cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchItems {
    pub uid: Option<u32>,
    /// body is whole message, from `BODY[]` or `RFC822` item.
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Nil,
    Atom(String),
    Bytes(Vec<u8>),
    List,
}

struct ItemParser<'a> {
    text: &'a [u8],
    pos: usize,
    literals: &'a [Vec<u8>],
    next_literal: usize,
}

impl<'a> ItemParser<'a> {
    fn error(&self, reason: &'static str) -> FetchParseError {
        FetchParseError {
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8, reason: &'static str) -> Result<(), FetchParseError> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    /// take_name takes item name such as `UID` or `BODY[HEADER.FIELDS (FROM)]<0>`.
    fn take_name(&mut self) -> Result<String, FetchParseError> {
        let start = self.pos;
        let mut depth = 0;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' if depth > 0 => depth -= 1,
                b' ' | b'(' | b')' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        if depth != 0 {
            return Err(self.error("unterminated section"));
        }
        if self.pos == start {
            return Err(self.error("expected item name"));
        }
        Ok(String::from_utf8_lossy(&self.text[start..self.pos]).to_ascii_uppercase())
    }

    fn take_quoted(&mut self) -> Result<Vec<u8>, FetchParseError> {
        self.expect(b'"', "expected quoted string")?;
        let mut res = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(res);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b) => res.push(b),
                        None => return Err(self.error("unterminated quoted string")),
                    }
                }
                Some(b) => res.push(b),
            }
            self.pos += 1;
        }
    }

    fn take_literal(&mut self) -> Result<Vec<u8>, FetchParseError> {
        self.expect(b'{', "expected literal")?;
        let start = self.pos;
        while self.peek().map(|b| b.is_ascii_digit()).unwrap_or(false) {
            self.pos += 1;
        }
        let size = std::str::from_utf8(&self.text[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| self.error("invalid literal size"))?;
        if self.peek() == Some(b'+') {
            self.pos += 1;
        }
        self.expect(b'}', "unterminated literal size")?;
        let data = self.literals
            .get(self.next_literal)
            .ok_or_else(|| self.error("literal payload missing"))?;
        if data.len() != size {
            return Err(self.error("literal size mismatch"));
        }
        self.next_literal += 1;
        Ok(data.clone())
    }

    fn take_atom(&mut self) -> Result<String, FetchParseError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b' ' || b == b'(' || b == b')' {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected value"));
        }
        Ok(String::from_utf8_lossy(&self.text[start..self.pos]).into_owned())
    }

    /// skip_list skips parenthesized list, consuming literals found inside.
    fn skip_list(&mut self) -> Result<(), FetchParseError> {
        self.expect(b'(', "expected list")?;
        loop {
            self.skip_spaces();
            match self.peek() {
                None => return Err(self.error("unterminated list")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => {
                    self.take_value()?;
                }
            }
        }
    }

    fn take_value(&mut self) -> Result<Value, FetchParseError> {
        match self.peek() {
            Some(b'"') => self.take_quoted().map(Value::Bytes),
            Some(b'{') => self.take_literal().map(Value::Bytes),
            Some(b'(') => self.skip_list().map(|_| Value::List),
            Some(_) => {
                let atom = self.take_atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(Value::Nil)
                } else {
                    Ok(Value::Atom(atom))
                }
            }
            None => Err(self.error("expected value")),
        }
    }
}

/// parse_fetch_items parses `(NAME value NAME value ...)` part of `FETCH` response.
/// `literals` are payloads of literals in order of their `{n}` markers in `text`.
pub fn parse_fetch_items(text: &str, literals: &[Vec<u8>]) -> Result<FetchItems, FetchParseError> {
    let mut p = ItemParser {
        text: text.as_bytes(),
        pos: 0,
        literals,
        next_literal: 0,
    };
    let mut res = FetchItems::default();

    p.skip_spaces();
    p.expect(b'(', "expected item list")?;
    loop {
        p.skip_spaces();
        if p.peek() == Some(b')') {
            p.pos += 1;
            break;
        }
        let name = p.take_name()?;
        p.skip_spaces();
        let value = p.take_value()?;
        match (name.as_str(), value) {
            ("UID", Value::Atom(a)) => {
                res.uid = Some(a.parse().map_err(|_| p.error("invalid UID"))?);
            }
            ("UID", _) => return Err(p.error("invalid UID")),
            (n, Value::Bytes(b)) if n == "RFC822" || n.starts_with("BODY[]") => res.body = Some(b),
            (n, _) if n == "RFC822" || n.starts_with("BODY[]") => res.body = None,
            _ => {}
        }
    }
    p.skip_spaces();
    if p.pos != p.text.len() {
        return Err(p.error("unexpected data after item list"));
    }
    Ok(res)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_can_parse_fetch_items() {
        for (text, literals, o) in [
            ("(UID 7 BODY[] {5})", vec![b"hello".to_vec()], Some((Some(7), Some("hello")))),
            ("(BODY[] \"a \\\"b\\\"\" UID 1)", vec![], Some((Some(1), Some("a \"b\"")))),
            ("(FLAGS (\\Seen \\Recent) RFC822 {2})", vec![b"ab".to_vec()], Some((None, Some("ab")))),
            (
                "(ENVELOPE (\"d\" {3} NIL) UID 9 BODY[]<0> {1})",
                vec![b"s()".to_vec(), b"x".to_vec()],
                Some((Some(9), Some("x"))),
            ),
            ("(BODY[HEADER.FIELDS (FROM)] {1} UID 2)", vec![b"h".to_vec()], Some((Some(2), None))),
            ("(UID 3 BODY[] NIL)", vec![], Some((Some(3), None))),
            ("(UID 3)", vec![], Some((Some(3), None))),
            ("()", vec![], Some((None, None))),
            ("(UID x)", vec![], None),
            ("(UID 7 BODY[] {5})", vec![b"hell".to_vec()], None),
            ("(UID 7 BODY[] {5})", vec![], None),
            ("(UID 7", vec![], None),
            ("UID 7", vec![], None),
            ("(UID 7) trailing", vec![], None),
            ("(BODY[HEADER {1})", vec![b"h".to_vec()], None),
        ].iter() {
            let res = parse_fetch_items(text, literals).ok().map(|r| {
                (r.uid, r.body.map(|b| String::from_utf8(b).unwrap()))
            });
            let o = o.map(|(u, b)| (u, b.map(str::to_string)));
            assert_eq!(res, o, "{:?}", text);
        }
    }
}
