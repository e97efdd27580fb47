//! Minimal HTML entity handling for XML tool-call payloads.
//!
//! Only the five named entities plus numeric references are honoured.
//! There is deliberately no general entity expansion and no external
//! entity resolution.

/// Unescape HTML entities in extracted parameter values.
pub(crate) fn unescape(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match decode_entity(rest) {
            Some((ch, consumed)) => {
                out.push_str(&ch);
                rest = &rest[consumed..];
            },
            None => {
                out.push('&');
                rest = &rest[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

/// Escape `&`, `<`, `>` when serializing parameter values into XML.
pub(crate) fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

/// Decode one entity at the start of `input` (which begins with `&`).
/// Returns the decoded text and the number of bytes consumed.
fn decode_entity(input: &str) -> Option<(String, usize)> {
    let semicolon = input.find(';')?;
    // Entities are short; a distant semicolon means this '&' is literal.
    if semicolon > 10 {
        return None;
    }
    let body = &input[1..semicolon];
    let decoded = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)?
        },
    };
    Some((decoded.to_string(), semicolon + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entities() {
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&lt;tag&gt;"), "<tag>");
        assert_eq!(unescape("&quot;x&quot; &apos;y&apos;"), "\"x\" 'y'");
    }

    #[test]
    fn test_numeric_entities() {
        assert_eq!(unescape("&#65;"), "A");
        assert_eq!(unescape("&#x41;"), "A");
    }

    #[test]
    fn test_literal_ampersand_preserved() {
        assert_eq!(unescape("a & b"), "a & b");
        assert_eq!(unescape("&unknown;"), "&unknown;");
        assert_eq!(unescape("trailing &"), "trailing &");
    }

    #[test]
    fn test_escape_unescape_roundtrip() {
        let original = "if a < b && b > c { \"quote\" }";
        assert_eq!(unescape(&escape(original)), original);
    }
}
