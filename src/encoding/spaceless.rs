//! spaceless defines reader which throws away whitespace.
//! Base64 bodies in mail are wrapped into lines and `Base64Reader` does not tolerate line breaks.

use std::io::{Error, Read};

pub struct SpacelessReader<R> {
    reader: R,
}

impl<R> SpacelessReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[inline]
fn is_space(b: u8) -> bool {
    b == b'\n' || b == b'\r' || b == b' ' || b == b'\t'
}

impl<R: Read> Read for SpacelessReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let sz = self.reader.read(buf)?;
            if sz == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..sz {
                if !is_space(buf[i]) {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            // chunk made of whitespace only must not be reported as EOF
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}
