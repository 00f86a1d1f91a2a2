use std::io;

pub mod base64;
pub mod multipart;
pub mod quoted_printable;
pub mod spaceless;

pub trait Encoder {
    fn encode(input: &[u8]) -> String {
        let mut s = String::new();
        Self::encode_to_string(input, &mut s);
        s
    }

    /// encode_to_string appends encoded input to `res` and returns number of bytes appended.
    fn encode_to_string(input: &[u8], res: &mut String) -> usize;
}

pub trait Decoder {
    fn decode(input: &[u8]) -> Result<Vec<u8>, io::Error>;

    fn decode_to_string(input: &[u8], res: &mut String) -> Result<usize, io::Error> {
        let decoded = String::from_utf8(Self::decode(input)?)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Decoded data is not valid utf8"))?;
        res.push_str(&decoded);
        Ok(decoded.len())
    }
}
