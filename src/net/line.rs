use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};

/// MAX_LINE_LENGTH bounds single protocol line, so misbehaving server can't make us buffer forever.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// LineChannel is buffered, line oriented wrapper of a byte stream shared by SMTP and IMAP sessions.
///
/// Lines end with `\n`, preceding `\r` is removed. Writes go directly to the stream and are flushed.
pub struct LineChannel<S> {
    reader: BufReader<S>,
    max_line: usize,
}

impl<S: Read + Write> LineChannel<S> {
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
            max_line: MAX_LINE_LENGTH,
        }
    }

    /// read_line_bytes reads line without its line ending.
    ///
    /// EOF before line end is an `UnexpectedEof` error, even if some data was read.
    pub fn read_line_bytes(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        loop {
            let (found, used) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "connection closed in the middle of line"));
                }
                match buf.iter().position(|b| *b == b'\n') {
                    Some(p) => {
                        line.extend_from_slice(&buf[..p]);
                        (true, p + 1)
                    }
                    None => {
                        line.extend_from_slice(buf);
                        (false, buf.len())
                    }
                }
            };
            self.reader.consume(used);
            if line.len() > self.max_line {
                return Err(io::Error::new(ErrorKind::InvalidData, "line too long"));
            }
            if found {
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(line);
            }
        }
    }

    /// read_line reads line as text. Invalid UTF-8 is replaced.
    pub fn read_line(&mut self) -> io::Result<String> {
        let line = self.read_line_bytes()?;
        Ok(match String::from_utf8(line) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })
    }

    /// read_exact_bytes reads exactly `n` bytes, as needed for IMAP literals.
    pub fn read_exact_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut res = vec![0u8; n];
        self.reader.read_exact(&mut res)?;
        Ok(res)
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data)?;
        stream.flush()
    }

    /// has_buffered tells if data was received but not consumed yet.
    pub fn has_buffered(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// into_inner returns underlying stream. Buffered data is lost, check `has_buffered` first.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }
}
