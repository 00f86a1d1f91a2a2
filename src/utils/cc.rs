//! Character classes of RFC 5322 used by address parser and quoted-string writer.

/// Specials which may not appear unquoted in atom.
const SPECIALS: &str = "()<>[]:;@\\,\"";

#[inline]
pub fn is_white_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// is_vchar accepts visible ASCII and, as RFC 6532 allows, any non-ASCII character.
#[inline]
pub fn is_vchar(c: char) -> bool {
    c.is_ascii_graphic() || !c.is_ascii()
}

#[inline]
pub fn is_qtext(c: char) -> bool {
    c != '"' && c != '\\' && is_vchar(c)
}

/// is_atext checks atom character. Dot is accepted only when `dot` is set (dot-atom).
#[inline]
pub fn is_atext(c: char, dot: bool) -> bool {
    match c {
        '.' => dot,
        c if SPECIALS.contains(c) => false,
        c => is_vchar(c),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_atext() {
        for (c, dot, o) in [
            ('a', false, true),
            ('+', false, true),
            ('ż', false, true),
            ('.', false, false),
            ('.', true, true),
            ('@', true, false),
            ('<', true, false),
            (' ', true, false),
            ('\u{7f}', true, false),
        ].iter() {
            assert_eq!(is_atext(*c, *dot), *o, "{:?}", c);
        }
    }

    #[test]
    fn test_qtext() {
        assert!(is_qtext('a'));
        assert!(is_qtext('@'));
        assert!(!is_qtext('"'));
        assert!(!is_qtext('\\'));
        assert!(!is_qtext(' '));
    }
}
