//! URL-encoded pairs (`a=1&b=two+words`)

use url::form_urlencoded;

use crate::error::ParseError;

/// Lenient parse: malformed escapes are kept literally. Used for `GET` queries.
pub fn parse_query(raw: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(raw.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Strict parse: rejects `;` separators and malformed `%` escapes.
///
/// Pairs keep their order so callers can apply first-wins.
pub fn parse_form(raw: &str) -> Result<Vec<(String, String)>, ParseError> {
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        if pair.contains(';') {
            return Err(ParseError::Form(format!("invalid semicolon separator in {pair:?}")));
        }
        check_escapes(pair)?;
    }
    Ok(parse_query(raw))
}

fn check_escapes(pair: &str) -> Result<(), ParseError> {
    let bytes = pair.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                let end = (i + 3).min(bytes.len());
                let escape = String::from_utf8_lossy(&bytes[i..end]);
                return Err(ParseError::Form(format!("invalid URL escape {escape:?}")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
