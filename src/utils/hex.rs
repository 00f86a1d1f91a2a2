#[inline]
pub(crate) fn encode_hex_char(b: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[(b >> 4) as usize], DIGITS[(b & 0x0F) as usize]]
}

/// decode_hex_digit accepts both upper and lowercase digits.
#[inline]
pub(crate) fn decode_hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_can_encode_any_byte() {
        for i in 0..=255u8 {
            assert_eq!(&encode_hex_char(i)[..], format!("{:02X}", i).as_bytes());
        }
    }

    #[test]
    fn test_decode_is_inverse_of_encode() {
        for i in 0..=255u8 {
            let e = encode_hex_char(i);
            let d = decode_hex_digit(e[0]).unwrap() * 16 + decode_hex_digit(e[1]).unwrap();
            assert_eq!(d, i);
        }
        for b in [b'g', b'G', b' ', b'=', b'\n'].iter() {
            assert_eq!(decode_hex_digit(*b), None);
        }
    }
}
