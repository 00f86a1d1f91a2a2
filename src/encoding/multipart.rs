//! Boundary generation and splitting of multipart bodies.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// BOUNDARY_PREFIX can't appear in quoted printable or base64 output.
pub const BOUNDARY_PREFIX: &str = "----=_Part_";
const BOUNDARY_RANDOM_LEN: usize = 24;

/// BoundarySource yields candidate boundary tokens.
/// Encoder asks again whenever candidate collides with message content.
pub trait BoundarySource {
    fn next_boundary(&mut self) -> String;
}

/// RandomBoundary generates boundaries from thread local rng.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBoundary;

impl BoundarySource for RandomBoundary {
    fn next_boundary(&mut self) -> String {
        generate_boundary(&mut rand::thread_rng())
    }
}

pub fn generate_boundary<R: Rng>(rng: &mut R) -> String {
    let mut res = String::with_capacity(BOUNDARY_PREFIX.len() + BOUNDARY_RANDOM_LEN);
    res.push_str(BOUNDARY_PREFIX);
    res.extend(rng.sample_iter(&Alphanumeric).take(BOUNDARY_RANDOM_LEN).map(char::from));
    res
}

/// contains_boundary checks if `boundary` occurs anywhere in `haystack`.
pub fn contains_boundary(haystack: &[u8], boundary: &str) -> bool {
    find_subslice(haystack, boundary.as_bytes(), 0).is_some()
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum MultipartError {
    #[display(fmt = "boundary delimiter not found")]
    MissingBoundary,
    #[display(fmt = "multipart body has no closing delimiter")]
    Unterminated,
}

/// find_delimiter returns offset of first line starting with `delim` at or after `from`.
fn find_delimiter(body: &[u8], delim: &[u8], mut from: usize) -> Option<usize> {
    while let Some(p) = find_subslice(body, delim, from) {
        let at_line_start = p == 0 || body[p - 1] == b'\n';
        // boundary must not be just a prefix of a longer token
        let terminated = match body.get(p + delim.len()) {
            None => true,
            Some(b) => *b == b'-' || *b == b'\r' || *b == b'\n' || *b == b' ' || *b == b'\t',
        };
        if at_line_start && terminated {
            return Some(p);
        }
        from = p + 1;
    }
    None
}

/// split_multipart returns raw parts (headers and body) found between boundary delimiters.
///
/// Preamble and epilogue are dropped. Line break preceding each delimiter belongs to the delimiter,
/// so it is not part of returned slices. Both `\r\n` and bare `\n` line endings are accepted.
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>, MultipartError> {
    let delim = format!("--{}", boundary).into_bytes();
    let mut parts = Vec::new();

    let mut pos = find_delimiter(body, &delim, 0).ok_or(MultipartError::MissingBoundary)?;
    loop {
        let after = pos + delim.len();
        if body[after..].starts_with(b"--") {
            return Ok(parts);
        }
        let start = match find_subslice(body, b"\n", after) {
            Some(nl) => nl + 1,
            None => return Err(MultipartError::Unterminated),
        };
        let next = find_delimiter(body, &delim, start).ok_or(MultipartError::Unterminated)?;

        let mut end = next;
        if end > start && body[end - 1] == b'\n' {
            end -= 1;
            if end > start && body[end - 1] == b'\r' {
                end -= 1;
            }
        }
        parts.push(&body[start..end]);
        pos = next;
    }
}
