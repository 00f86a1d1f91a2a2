use std::io::{self, Cursor, Error, ErrorKind, Read, Write};

use crate::encoding::{Decoder, Encoder};
use crate::utils::hex::{decode_hex_digit, encode_hex_char};

/// MAX_ENCODED_LINE is the longest line (soft break marker included) the writer produces.
pub const MAX_ENCODED_LINE: usize = 76;

#[inline]
fn is_literal(b: u8) -> bool {
    (b'!'..=b'~').contains(&b) && b != b'='
}

/// encode_line appends encoded `line` (without line ending) to `out`.
/// Soft line breaks keep every output line within `MAX_ENCODED_LINE` chars.
fn encode_line(line: &[u8], out: &mut Vec<u8>) {
    let mut column = 0;
    for (i, b) in line.iter().copied().enumerate() {
        let is_last = i + 1 == line.len();
        let literal = is_literal(b) || ((b == b' ' || b == b'\t') && !is_last);

        let width = if literal { 1 } else { 3 };
        // last char may take the column reserved for soft break marker
        let limit = if is_last { MAX_ENCODED_LINE } else { MAX_ENCODED_LINE - 1 };
        if column + width > limit {
            out.extend_from_slice(b"=\r\n");
            column = 0;
        }
        if literal {
            out.push(b);
        } else {
            let enc = encode_hex_char(b);
            out.extend_from_slice(&[b'=', enc[0], enc[1]]);
        }
        column += width;
    }
}

/// QuotedPrintableWriter encodes text as quoted printable.
///
/// Input `\r\n` sequences are kept as hard line breaks. Lone `\r` or `\n` are encoded.
/// Data is buffered per line, so `finish` has to be called after the last write.
pub struct QuotedPrintableWriter<W> {
    writer: W,
    line: Vec<u8>,
    encoded: Vec<u8>,
}

impl<W> QuotedPrintableWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: Vec::new(),
            encoded: Vec::new(),
        }
    }
}

impl<W: Write> QuotedPrintableWriter<W> {
    fn write_line(&mut self, hard_break: bool) -> Result<(), Error> {
        self.encoded.clear();
        encode_line(&self.line, &mut self.encoded);
        if hard_break {
            self.encoded.extend_from_slice(b"\r\n");
        }
        self.writer.write_all(&self.encoded)?;
        self.line.clear();
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), Error> {
        if !self.line.is_empty() {
            self.write_line(false)?;
        }
        self.writer.flush()
    }

    pub fn into_inner(mut self) -> Result<W, Error> {
        self.finish()?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for QuotedPrintableWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        for b in buf.iter().copied() {
            if b == b'\n' && self.line.last() == Some(&b'\r') {
                self.line.pop();
                self.write_line(true)?;
            } else {
                self.line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ReaderState {
    Text,
    AfterEquals,
    FirstDigit(u8),
    SoftBreakCr,
}

/// QuotedPrintableReader decodes quoted printable stream.
/// Both `=\r\n` and `=\n` are accepted as soft line breaks.
pub struct QuotedPrintableReader<R> {
    stream: R,
    state: ReaderState,
    is_error: bool,
}

impl<R> QuotedPrintableReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            state: ReaderState::Text,
            is_error: false,
        }
    }

    /// is_ok returns false once invalid escape sequence was found.
    pub fn is_ok(&self) -> bool {
        !self.is_error
    }
}

impl<R: Read> Read for QuotedPrintableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.is_error {
            return Err(Error::new(ErrorKind::InvalidData, "Got invalid character after '=' char"));
        }
        let mut written = 0;
        while written < buf.len() {
            let b = {
                let mut arr = [0u8; 1];
                if self.stream.read(&mut arr)? == 0 {
                    break;
                }
                arr[0]
            };
            self.state = match (self.state, b) {
                (ReaderState::Text, b'=') => ReaderState::AfterEquals,
                (ReaderState::Text, b) => {
                    buf[written] = b;
                    written += 1;
                    ReaderState::Text
                }
                (ReaderState::AfterEquals, b'\n') => ReaderState::Text,
                (ReaderState::AfterEquals, b'\r') => ReaderState::SoftBreakCr,
                (ReaderState::AfterEquals, b) => match decode_hex_digit(b) {
                    Some(d) => ReaderState::FirstDigit(d),
                    None => {
                        self.is_error = true;
                        break;
                    }
                },
                (ReaderState::FirstDigit(high), b) => match decode_hex_digit(b) {
                    Some(low) => {
                        buf[written] = high * 16 + low;
                        written += 1;
                        ReaderState::Text
                    }
                    None => {
                        self.is_error = true;
                        break;
                    }
                },
                // `=\r` not followed by `\n` is tolerated as soft break
                (ReaderState::SoftBreakCr, b'\n') => ReaderState::Text,
                (ReaderState::SoftBreakCr, b'=') => ReaderState::AfterEquals,
                (ReaderState::SoftBreakCr, b) => {
                    buf[written] = b;
                    written += 1;
                    ReaderState::Text
                }
            };
        }
        if self.is_error {
            return Err(Error::new(ErrorKind::InvalidData, "Got invalid character after '=' char"));
        }
        Ok(written)
    }
}

pub struct QuotedPrintableEncoder;

impl Encoder for QuotedPrintableEncoder {
    fn encode_to_string(input: &[u8], res: &mut String) -> usize {
        let mut w = QuotedPrintableWriter::new(Vec::new());
        // writing into vec can't fail
        let encoded = w.write_all(input).and_then(|_| w.into_inner()).unwrap_or_default();
        let encoded = String::from_utf8_lossy(&encoded);
        res.push_str(&encoded);
        encoded.len()
    }
}

pub struct QuotedPrintableDecoder;

impl Decoder for QuotedPrintableDecoder {
    fn decode(input: &[u8]) -> Result<Vec<u8>, io::Error> {
        let mut res = Vec::with_capacity(input.len());
        QuotedPrintableReader::new(Cursor::new(input)).read_to_end(&mut res)?;
        Ok(res)
    }
}
