use std::fmt;
use std::str::FromStr;

use crate::utils::cc::is_atext;
use crate::utils::quoted::{encode_header_value, parse_maybe_rfc_2047, quote_string, take_quoted_string};

/// EmailAddress is a mailbox: optional display name and `local@domain` address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum EmailAddressParseError {
    #[display(fmt = "address is empty")]
    InputEmpty,
    #[display(fmt = "invalid atom")]
    InvalidAtom,
    #[display(fmt = "invalid local@domain address")]
    InvalidAddressSpec,
    #[display(fmt = "invalid quoted string")]
    InvalidQuotedString,
    #[display(fmt = "unexpected data after address")]
    TrailingData,
}

struct AddressParser<'a> {
    address: &'a str,
}

impl<'a> AddressParser<'a> {
    fn new(address: &'a str) -> Self {
        Self {
            address: address.trim(),
        }
    }

    fn take_white_chars(&mut self) {
        self.address = self.address.trim_start();
    }

    fn peek_char(&self) -> Option<char> {
        self.address.chars().next()
    }

    fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.address = &self.address[c.len_utf8()..];
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.address.is_empty()
    }

    /// take_atom takes atom or, when `dot` is set, dot-atom.
    /// Display names may contain loose dots as in `John J. Doe`, so `strict` is off for phrases.
    fn take_atom(&mut self, dot: bool, strict: bool) -> Result<&'a str, EmailAddressParseError> {
        let len = self.address
            .char_indices()
            .find(|(_, c)| !is_atext(*c, dot))
            .map(|(i, _)| i)
            .unwrap_or_else(|| self.address.len());
        let atom = &self.address[..len];
        if atom.is_empty() {
            return Err(EmailAddressParseError::InvalidAtom);
        }
        if strict && (atom.starts_with('.') || atom.ends_with('.') || atom.contains("..")) {
            return Err(EmailAddressParseError::InvalidAtom);
        }
        self.address = &self.address[len..];
        Ok(atom)
    }

    fn take_quoted(&mut self) -> Result<String, EmailAddressParseError> {
        let (res, rest) = take_quoted_string(self.address)
            .map_err(|_| EmailAddressParseError::InvalidQuotedString)?;
        self.address = rest;
        Ok(res)
    }

    fn take_address_spec(&mut self) -> Result<String, EmailAddressParseError> {
        let local = match self.peek_char() {
            Some('"') => quote_string(&self.take_quoted()?),
            _ => self.take_atom(true, true)?.to_string(),
        };
        if !self.consume_char('@') {
            return Err(EmailAddressParseError::InvalidAddressSpec);
        }
        let domain = self.take_atom(true, true).map_err(|_| EmailAddressParseError::InvalidAddressSpec)?;
        Ok(format!("{}@{}", local, domain))
    }

    /// take_phrase takes display name made of atoms, quoted strings and encoded words.
    fn take_phrase(&mut self) -> Result<String, EmailAddressParseError> {
        let mut words: Vec<String> = Vec::new();
        loop {
            self.take_white_chars();
            match self.peek_char() {
                None | Some('<') | Some(',') => break,
                Some('"') => words.push(self.take_quoted()?),
                Some(_) => {
                    let atom = self.take_atom(true, false)?;
                    let word = parse_maybe_rfc_2047(atom)
                        .map_err(|_| EmailAddressParseError::InvalidAtom)?;
                    words.push(word.into_owned());
                }
            }
        }
        Ok(words.join(" "))
    }

    fn take_mailbox(&mut self) -> Result<EmailAddress, EmailAddressParseError> {
        self.take_white_chars();
        if self.is_empty() {
            return Err(EmailAddressParseError::InputEmpty);
        }

        let checkpoint = self.address;
        if let Ok(address) = self.take_address_spec() {
            self.take_white_chars();
            if self.is_empty() || self.peek_char() == Some(',') {
                return Ok(EmailAddress {
                    name: String::new(),
                    address,
                });
            }
        }
        self.address = checkpoint;

        let name = self.take_phrase()?;
        self.take_white_chars();
        if !self.consume_char('<') {
            return Err(EmailAddressParseError::InvalidAddressSpec);
        }
        let address = self.take_address_spec()?;
        if !self.consume_char('>') {
            return Err(EmailAddressParseError::InvalidAddressSpec);
        }
        self.take_white_chars();
        Ok(EmailAddress { name, address })
    }
}

impl EmailAddress {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, address: A) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// parse_single accepts `local@domain`, `<local@domain>` and `Name <local@domain>`.
    pub fn parse_single(text: &str) -> Result<Self, EmailAddressParseError> {
        let mut p = AddressParser::new(text);
        let res = p.take_mailbox()?;
        if !p.is_empty() {
            return Err(EmailAddressParseError::TrailingData);
        }
        Ok(res)
    }

    /// parse_list parses comma separated mailboxes.
    pub fn parse_list(text: &str) -> Result<Vec<Self>, EmailAddressParseError> {
        let mut p = AddressParser::new(text);
        let mut res = Vec::new();
        loop {
            res.push(p.take_mailbox()?);
            p.take_white_chars();
            if p.is_empty() {
                break;
            }
            if !p.consume_char(',') {
                return Err(EmailAddressParseError::TrailingData);
            }
        }
        Ok(res)
    }

    /// to_header renders mailbox for use in header, encoding display name if needed.
    ///
    /// Control characters are dropped from address, so mailbox built with `new` can't break
    /// header line.
    pub fn to_header(&self) -> String {
        let address: String = self.address.chars().filter(|c| !c.is_control()).collect();
        if self.name.is_empty() {
            return address;
        }
        let name = if !self.name.is_ascii() || self.name.chars().any(char::is_control) {
            encode_header_value(&self.name).into_owned()
        } else if self.name.chars().all(|c| c == ' ' || is_atext(c, false)) {
            self.name.clone()
        } else {
            quote_string(&self.name)
        };
        format!("{} <{}>", name, address)
    }

    /// domain returns part of address after last `@`.
    pub fn domain(&self) -> &str {
        self.address.rsplit('@').next().unwrap_or("")
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header())
    }
}

impl FromStr for EmailAddress {
    type Err = EmailAddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_single(s)
    }
}

/// is_valid_address checks if text is a bare `local@domain` address.
pub fn is_valid_address(text: &str) -> bool {
    let mut p = AddressParser { address: text };
    p.take_address_spec().is_ok() && p.is_empty()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_can_parse_single_email_address() {
        for (i, o) in [
            ("", None),
            ("\"", None),
            ("asdf", None),
            ("a@", None),
            ("@x.com", None),
            ("a..b@x.com", None),
            ("a@x.com\r\nRCPT TO:<c@z.com>", None),
            ("asdf@example.com", Some(("", "asdf@example.com"))),
            ("<asdf@example.com>", Some(("", "asdf@example.com"))),
            ("John Doe <asdf@example.com>", Some(("John Doe", "asdf@example.com"))),
            ("John J. Doe <asdf.j.fdsa@example.com>", Some(("John J. Doe", "asdf.j.fdsa@example.com"))),
            ("\"Doe, John\" <asdf@example.com>", Some(("Doe, John", "asdf@example.com"))),
            ("=?UTF-8?B?xYHDs2TFug==?= <lodz@example.com>", Some(("Łódź", "lodz@example.com"))),
            ("\"quoted local\"@example.com", Some(("", "\"quoted local\"@example.com"))),
            ("\"x\\\r\\\nRCPT TO:<evil@attacker.example>\"@y.com", None),
            ("\"v\\\r\\\nBcc: hidden@z.com\"@y.com", None),
        ].iter() {
            match o {
                Some((name, address)) => {
                    let a = EmailAddress::parse_single(i).unwrap();
                    assert_eq!(a, EmailAddress::new(*name, *address), "{:?}", i);
                }
                None => {
                    EmailAddress::parse_single(i).unwrap_err();
                }
            }
        }
    }

    #[test]
    fn test_can_parse_address_list() {
        let l = EmailAddress::parse_list("Jane Doe <jane@example.com>, jdoe@example.org, \"Doe, John\" <john@example.com>").unwrap();
        assert_eq!(l, vec![
            EmailAddress::new("Jane Doe", "jane@example.com"),
            EmailAddress::new("", "jdoe@example.org"),
            EmailAddress::new("Doe, John", "john@example.com"),
        ]);
        EmailAddress::parse_list("a@x.com b@y.com").unwrap_err();
    }

    #[test]
    fn test_valid_address() {
        for (i, o) in [
            ("a@x.com", true),
            ("first.last+tag@sub.example.org", true),
            ("Name <a@x.com>", false),
            ("a@x.com ", false),
            ("ax.com", false),
            ("a@b@c", false),
        ].iter() {
            assert_eq!(is_valid_address(i), *o, "{:?}", i);
        }
    }

    #[test]
    fn test_to_header() {
        for (a, o) in [
            (EmailAddress::new("", "a@x.com"), "a@x.com"),
            (EmailAddress::new("Ann", "a@x.com"), "Ann <a@x.com>"),
            (EmailAddress::new("Doe, Ann", "a@x.com"), "\"Doe, Ann\" <a@x.com>"),
            (EmailAddress::new("Łódź", "a@x.com"), "=?UTF-8?B?xYHDs2TFug==?= <a@x.com>"),
        ].iter() {
            assert_eq!(&a.to_header(), o);
            assert_eq!(&EmailAddress::parse_single(o).unwrap(), a);
        }
    }

    #[test]
    fn test_to_header_never_breaks_line() {
        for a in [
            EmailAddress::new("", "a@x.com\r\nBcc: b@y.com"),
            EmailAddress::new("Ann\r\nBcc: b@y.com", "a@x.com"),
            EmailAddress::new("Ann", "a@x.com\n"),
        ].iter() {
            let h = a.to_header();
            assert!(!h.contains("\r\nBcc") && !h.contains("\nBcc") && !h.ends_with('\n'), "{:?}", h);
        }
    }
}
