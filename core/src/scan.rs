//! Bracket matching over free text that may embed JSON.

/// Returns the balanced span that opens at byte `start` (which must hold
/// `open`) and closes at the matching `close`, skipping delimiters that occur
/// inside JSON string literals.
pub(crate) fn balanced_span(text: &str, start: usize, open: u8, close: u8) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&open) {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Iterates over every balanced `open ... close` span in `text`, in order of
/// their opening delimiter.
pub(crate) fn balanced_spans(text: &str, open: u8, close: u8) -> impl Iterator<Item = &str> {
    text.bytes()
        .enumerate()
        .filter(move |&(_, b)| b == open)
        .filter_map(move |(i, _)| balanced_span(text, i, open, close))
}

/// Splits `body` on `sep` at nesting depth zero and outside string literals.
pub(crate) fn split_top_level(body: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;

    for (i, byte) in body.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' | b'(' => depth += 1,
            b']' | b'}' | b')' => depth -= 1,
            b if b == sep && depth == 0 => {
                parts.push(&body[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[last..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_span_skips_strings() {
        let text = r#"see [{"a":"]"}] after"#;
        let start = text.find('[').unwrap();
        assert_eq!(balanced_span(text, start, b'[', b']'), Some(r#"[{"a":"]"}]"#));
    }

    #[test]
    fn test_balanced_span_unclosed() {
        assert_eq!(balanced_span("[1, 2", 0, b'[', b']'), None);
    }

    #[test]
    fn test_balanced_spans_in_order() {
        let spans: Vec<&str> = balanced_spans("x [1] y [[2]]", b'[', b']').collect();
        assert_eq!(spans, vec!["[1]", "[[2]]", "[2]"]);
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level(r#""a": 1, "b": "x,y", "c": [1,2]"#, b',');
        assert_eq!(parts, vec![r#""a": 1"#, r#" "b": "x,y""#, r#" "c": [1,2]"#]);
    }
}
