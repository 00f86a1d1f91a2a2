use std::io::{self, Error, ErrorKind, Read, Write};

use crate::encoding::{Decoder, Encoder};

/// MIME_LINE_LENGTH is the maximum length of base64 line in mail body.
pub const MIME_LINE_LENGTH: usize = 76;

/// Base64Reader decodes base64 stream.
///
/// It does not tolerate whitespace. Wrap source in `SpacelessReader` when reading line-wrapped data.
pub struct Base64Reader<R> {
    reader: R,

    quad: [u8; 4],
    quad_len: usize,

    out: [u8; 3],
    out_pos: usize,
    out_len: usize,

    // set once a quad containing padding was decoded; only EOF may follow
    padded: bool,
}

impl<R> Base64Reader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            quad: [0u8; 4],
            quad_len: 0,
            out: [0u8; 3],
            out_pos: 0,
            out_len: 0,
            padded: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Read for Base64Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut written = 0;
        while written < buf.len() {
            if self.out_pos < self.out_len {
                let n = (self.out_len - self.out_pos).min(buf.len() - written);
                buf[written..written + n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                written += n;
                continue;
            }

            let mut b = [0u8; 1];
            if self.reader.read(&mut b)? == 0 {
                if self.quad_len != 0 {
                    return Err(Error::new(ErrorKind::UnexpectedEof, "Base64 stream ended in the middle of quad"));
                }
                break;
            }
            if self.padded {
                return Err(Error::new(ErrorKind::InvalidData, "Base64 data found after padding"));
            }

            self.quad[self.quad_len] = b[0];
            self.quad_len += 1;
            if self.quad_len < 4 {
                continue;
            }

            self.quad_len = 0;
            self.padded = self.quad.contains(&b'=');
            self.out_len = base64::decode_config_slice(&self.quad, base64::STANDARD, &mut self.out)
                .map_err(|e| Error::new(ErrorKind::InvalidData, format!("Base64 decode error: {}", e)))?;
            self.out_pos = 0;
        }
        Ok(written)
    }
}

/// Base64Writer encodes data written to it and splits output into lines separated with `\r\n`.
///
/// Last line is not terminated. `finish` must be called once all data has been written,
/// otherwise up to two trailing bytes are lost.
pub struct Base64Writer<W> {
    writer: W,
    line_length: Option<usize>,
    column: usize,

    pending: [u8; 3],
    pending_len: usize,

    is_done: bool,
}

impl<W> Base64Writer<W> {
    /// new creates writer which wraps lines at `line_length` chars.
    /// Line length is rounded down to multiple of 4. `None` disables wrapping.
    pub fn new(writer: W, line_length: Option<usize>) -> Self {
        Self {
            writer,
            line_length: line_length.map(|l| (l / 4 * 4).max(4)),
            column: 0,
            pending: [0u8; 3],
            pending_len: 0,
            is_done: false,
        }
    }

    pub fn mime(writer: W) -> Self {
        Self::new(writer, Some(MIME_LINE_LENGTH))
    }

    pub fn is_finished(&self) -> bool {
        self.is_done
    }
}

impl<W: Write> Base64Writer<W> {
    fn emit_group(&mut self, group: &[u8]) -> Result<(), Error> {
        let mut out = [0u8; 4];
        let len = base64::encode_config_slice(group, base64::STANDARD, &mut out);
        debug_assert_eq!(len, 4);
        if let Some(limit) = self.line_length {
            if self.column + len > limit {
                self.writer.write_all(b"\r\n")?;
                self.column = 0;
            }
        }
        self.writer.write_all(&out[..len])?;
        self.column += len;
        Ok(())
    }

    /// finish encodes buffered bytes with padding. Further writes fail.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.is_done {
            return Ok(());
        }
        if self.pending_len > 0 {
            let pending = self.pending;
            self.emit_group(&pending[..self.pending_len])?;
            self.pending_len = 0;
        }
        self.is_done = true;
        self.writer.flush()
    }

    pub fn into_inner(mut self) -> Result<W, Error> {
        self.finish()?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for Base64Writer<W> {
    fn write(&mut self, mut buf: &[u8]) -> Result<usize, Error> {
        if self.is_done {
            return Err(Error::new(ErrorKind::Other, "Can't write any more data. Writer was finished."));
        }
        let original_len = buf.len();

        if self.pending_len > 0 {
            let n = (3 - self.pending_len).min(buf.len());
            self.pending[self.pending_len..self.pending_len + n].copy_from_slice(&buf[..n]);
            self.pending_len += n;
            buf = &buf[n..];
            if self.pending_len < 3 {
                return Ok(original_len);
            }
            let pending = self.pending;
            self.emit_group(&pending)?;
            self.pending_len = 0;
        }

        let mut chunks = buf.chunks_exact(3);
        for group in &mut chunks {
            self.emit_group(group)?;
        }
        let rest = chunks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();

        Ok(original_len)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()
    }
}

pub struct Base64Encoder;

impl Encoder for Base64Encoder {
    fn encode_to_string(input: &[u8], res: &mut String) -> usize {
        let encoded = base64::encode(input);
        res.push_str(&encoded);
        encoded.len()
    }
}

pub struct Base64Decoder;

impl Decoder for Base64Decoder {
    fn decode(input: &[u8]) -> Result<Vec<u8>, io::Error> {
        base64::decode(input).map_err(|_| io::Error::new(ErrorKind::InvalidData, "Invalid base64 input"))
    }
}

/// encode_wrapped encodes data as base64 split into 76 char lines.
pub fn encode_wrapped(data: &[u8]) -> String {
    let mut w = Base64Writer::mime(Vec::with_capacity(data.len() * 4 / 3 + data.len() / 57 * 2 + 4));
    // writes into vec never fail
    let res = w.write_all(data).and_then(|_| w.into_inner());
    match res {
        Ok(v) => String::from_utf8(v).unwrap_or_default(),
        Err(_) => String::new(),
    }
}
