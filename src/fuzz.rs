//! Entry points for fuzzers. None of them may panic, whatever `data` is.

use std::fmt::Debug;
use std::io::{self, Cursor, Read};

use crate::encoding::base64::Base64Reader;
use crate::encoding::quoted_printable::QuotedPrintableReader;
use crate::encoding::spaceless::SpacelessReader;
use crate::imap::fetch::parse_fetch_items;
use crate::imap::response::{Response, Untagged};
use crate::mail::address::EmailAddress;
use crate::mail::decoder::decode;
use crate::net::LineChannel;
use crate::smtp::reply::Reply;
use crate::utils::quoted::decode_header_value;

fn drain_reader(r: &mut impl io::Read) {
    let mut buf = [0u8; 32];
    loop {
        match r.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// FuzzStream serves fuzzer input and swallows anything written.
struct FuzzStream(Cursor<Vec<u8>>);

impl io::Read for FuzzStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl io::Write for FuzzStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn channel(data: &[u8]) -> LineChannel<FuzzStream> {
    LineChannel::new(FuzzStream(Cursor::new(data.to_vec())))
}

pub fn fuzz_mime_decoder(data: &[u8]) {
    sink(decode(data));
}

pub fn fuzz_smtp_reply(data: &[u8]) {
    let mut c = channel(data);
    while let Ok(r) = Reply::read(&mut c) {
        sink(r.text());
    }
}

pub fn fuzz_imap_response(data: &[u8]) {
    let mut c = channel(data);
    while let Ok(r) = Response::read(&mut c) {
        if let Response::Untagged(Untagged { ref kind, ref text, ref literals, .. }) = r {
            if kind == "FETCH" {
                sink(parse_fetch_items(text, literals));
            }
        }
    }
}

pub fn fuzz_parse_address(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        sink(EmailAddress::parse_list(text));
    }
}

pub fn fuzz_header_value(data: &[u8]) {
    if let Ok(text) = std::str::from_utf8(data) {
        sink(decode_header_value(text));
    }
}

pub fn fuzz_base64_decoder(data: &[u8]) {
    let mut d = Base64Reader::new(SpacelessReader::new(Cursor::new(data)));
    drain_reader(&mut d);
}

pub fn fuzz_quoted_printable_decoder(data: &[u8]) {
    let mut d = QuotedPrintableReader::new(Cursor::new(data));
    drain_reader(&mut d);
}

// base64 crate accepts some inputs which are not multiple of 4 in length,
// this reader does not. Only inputs of valid length are compared.
pub fn fuzz_base64_decoder_gives_same_result(data: &[u8]) {
    if data.len() % 4 != 0 {
        return;
    }
    let (res, is_ok) = {
        let mut d = Base64Reader::new(Cursor::new(data));
        let mut res = Vec::new();
        let is_ok = d.read_to_end(&mut res).is_ok();
        (res, is_ok)
    };
    let ok_res = base64::decode_config(data, base64::STANDARD);
    assert_eq!(ok_res.is_ok(), is_ok);
    if let Ok(ok_res) = ok_res {
        assert_eq!(ok_res, res);
    }
}

#[inline(never)]
fn sink<T: Debug>(_v: T) {}
