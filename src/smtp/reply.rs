use std::io::{self, Read, Write};

use crate::net::LineChannel;

pub type SmtpCode = u16;

#[derive(Debug, Display, From)]
pub enum ReplyError {
    #[display(fmt = "{}", _0)]
    #[from]
    Io(io::Error),
    #[display(fmt = "malformed reply line {:?}", _0)]
    Malformed(String),
    #[display(fmt = "multiline reply changed code from {} to {}", expected, got)]
    InconsistentCode { expected: SmtpCode, got: SmtpCode },
}

/// ReplyLine is single line of server reply: `250-text` or `250 text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine {
    pub code: SmtpCode,
    /// more is set for `-` separator, meaning reply continues on next line.
    pub more: bool,
    pub text: String,
}

impl ReplyLine {
    pub fn parse(line: &str) -> Result<Self, ReplyError> {
        let b = line.as_bytes();
        let malformed = || ReplyError::Malformed(line.to_string());
        if b.len() < 3 || !b[..3].iter().all(u8::is_ascii_digit) || !(b'1'..=b'5').contains(&b[0]) {
            return Err(malformed());
        }
        let code = (b[0] - b'0') as u16 * 100 + (b[1] - b'0') as u16 * 10 + (b[2] - b'0') as u16;
        let (more, text) = match b.get(3) {
            None => (false, ""),
            Some(b' ') => (false, &line[4..]),
            Some(b'-') => (true, &line[4..]),
            Some(_) => return Err(malformed()),
        };
        Ok(Self {
            code,
            more,
            text: text.to_string(),
        })
    }
}

/// Reply is complete, possibly multiline, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: SmtpCode,
    pub lines: Vec<String>,
}

impl Reply {
    /// from_lines assembles reply out of raw lines. Last line must not have continuation mark.
    pub fn from_lines<'a, I: IntoIterator<Item=&'a str>>(lines: I) -> Result<Self, ReplyError> {
        Self::assemble(lines.into_iter().map(ReplyLine::parse))
    }

    /// read drains every line of reply from channel.
    pub fn read<S: Read + Write>(channel: &mut LineChannel<S>) -> Result<Self, ReplyError> {
        // stops pulling lines at the first one without continuation mark
        Self::assemble(std::iter::from_fn(|| {
            Some(channel.read_line().map_err(ReplyError::from).and_then(|l| ReplyLine::parse(&l)))
        }))
    }

    fn assemble<I: Iterator<Item=Result<ReplyLine, ReplyError>>>(lines: I) -> Result<Self, ReplyError> {
        let mut res: Option<Reply> = None;
        for line in lines {
            let line = line?;
            let done = !line.more;
            match res.as_mut() {
                None => {
                    res = Some(Reply {
                        code: line.code,
                        lines: vec![line.text],
                    })
                }
                Some(r) if r.code != line.code => {
                    return Err(ReplyError::InconsistentCode {
                        expected: r.code,
                        got: line.code,
                    });
                }
                Some(r) => r.lines.push(line.text),
            }
            if done {
                return res.ok_or_else(|| ReplyError::Malformed(String::new()));
            }
        }
        Err(ReplyError::Malformed("reply is not terminated".to_string()))
    }

    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    /// text joins all lines with a space.
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    struct ReadOnly(Cursor<Vec<u8>>);

    impl Read for ReadOnly {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for ReadOnly {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_can_parse_reply_line() {
        for (i, o) in [
            ("220 smtp.example.com ESMTP", Some((220, false, "smtp.example.com ESMTP"))),
            ("250-PIPELINING", Some((250, true, "PIPELINING"))),
            ("250", Some((250, false, ""))),
            ("354 ", Some((354, false, ""))),
            ("25", None),
            ("abc ok", None),
            ("650 out of range", None),
            ("250_bad separator", None),
            ("", None),
        ].iter() {
            let res = ReplyLine::parse(i).ok().map(|l| (l.code, l.more, l.text));
            assert_eq!(res, o.map(|(c, m, t)| (c, m, t.to_string())), "{:?}", i);
        }
    }

    #[test]
    fn test_assembles_multiline_reply() {
        let r = Reply::from_lines(vec!["250-mx.example.com", "250-AUTH PLAIN LOGIN", "250 STARTTLS"]).unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines, vec!["mx.example.com", "AUTH PLAIN LOGIN", "STARTTLS"]);
        assert!(r.is_positive_completion());
        assert_eq!(r.text(), "mx.example.com AUTH PLAIN LOGIN STARTTLS");

        match Reply::from_lines(vec!["250-a", "251 b"]) {
            Err(ReplyError::InconsistentCode { expected: 250, got: 251 }) => {}
            r => panic!("unexpected result {:?}", r),
        }
        Reply::from_lines(vec!["250-a"]).unwrap_err();
    }

    #[test]
    fn test_reads_reply_from_channel() {
        for (i, o) in [
            (&b"250-mx\r\n250 SIZE 10\r\n"[..], Some((250, vec!["mx", "SIZE 10"]))),
            (b"221 bye\r\n250 next\r\n", Some((221, vec!["bye"]))),
            (b"250-mx\r\n251 b\r\n", None),
            (b"250-mx\r\n", None),
            (b"hello\r\n", None),
        ].iter() {
            let mut c = LineChannel::new(ReadOnly(Cursor::new(i.to_vec())));
            let res = Reply::read(&mut c).ok().map(|r| (r.code, r.lines));
            let o = o.as_ref().map(|(c, l)| (*c, l.iter().map(|s| s.to_string()).collect::<Vec<_>>()));
            assert_eq!(res, o, "{:?}", i);
        }
    }

    #[test]
    fn test_reply_classes() {
        for (c, o) in [(250, 2), (354, 3), (421, 4), (550, 5)].iter() {
            let r = Reply { code: *c, lines: vec![] };
            let class = [
                r.is_positive_completion(),
                r.is_intermediate(),
                r.is_transient_failure(),
                r.is_permanent_failure(),
            ].iter().position(|x| *x).map(|p| p + 2);
            assert_eq!(class, Some(*o));
        }
    }
}
