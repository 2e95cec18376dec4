//! Streaming, SAX-style JSON engine (spec.md §4.5): walks a document driven
//! by a [`PointerTrie`], invoking a callback at scalar leaves whose path
//! matches a configured pointer, without ever building a DOM.

use super::trie::PointerTrie;
use crate::value_type::ValueType;
use std::fmt;

/// Malformed input aborts the current document; no state survives to the
/// next call (spec.md §4.5 "Error handling").
#[derive(Debug)]
pub struct JsonError {
    message: String,
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for JsonError {}

/// Parses `input` as a single JSON document, calling `on_leaf(payload, raw,
/// value_type)` for every scalar at a pointer registered in `trie`.
///
/// `raw` is the value's original textual form (the exact source substring for
/// numbers, the unescaped content for strings, `"true"`/`"false"` for
/// booleans); `value_type` tags its parsed shape. `null` leaves are never
/// reported (spec.md §4.5 numeric policy / scalar form coverage).
pub fn parse<P>(
    input: &str,
    trie: &PointerTrie<P>,
    mut on_leaf: impl FnMut(&P, &str, ValueType),
) -> Result<(), JsonError> {
    let mut scanner = Scanner::new(input);
    scanner.skip_ws();
    parse_value(&mut scanner, trie, Some(trie.root()), &mut on_leaf)?;
    scanner.skip_ws();

    if scanner.peek().is_some() {
        return Err(scanner.err("trailing data after top-level value"));
    }

    Ok(())
}

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, b: u8) -> Result<(), JsonError> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", b as char)))
        }
    }

    fn err(&self, message: &str) -> JsonError {
        JsonError {
            message: format!("{message} at byte offset {}", self.pos),
        }
    }

    fn slice_str(&self, start: usize, end: usize) -> &'a str {
        std::str::from_utf8(&self.bytes[start..end]).unwrap_or_default()
    }

    fn read_hex4(&mut self) -> Result<u32, JsonError> {
        if self.pos + 4 > self.bytes.len() {
            return Err(self.err("truncated unicode escape"));
        }

        let hex = std::str::from_utf8(&self.bytes[self.pos..self.pos + 4])
            .map_err(|_| self.err("invalid unicode escape"))?;
        let cp = u32::from_str_radix(hex, 16).map_err(|_| self.err("invalid unicode escape"))?;
        self.pos += 4;
        Ok(cp)
    }
}

fn utf8_len(lead: u8) -> usize {
    if lead & 0b1110_0000 == 0b1100_0000 {
        2
    } else if lead & 0b1111_0000 == 0b1110_0000 {
        3
    } else if lead & 0b1111_1000 == 0b1111_0000 {
        4
    } else {
        1
    }
}

fn emit<P>(trie: &PointerTrie<P>, node: Option<usize>, on_leaf: &mut impl FnMut(&P, &str, ValueType), raw: &str, value_type: ValueType) {
    if let Some(node) = node {
        for payload in trie.payload(node) {
            on_leaf(payload, raw, value_type.clone());
        }
    }
}

fn parse_value<P>(
    s: &mut Scanner<'_>,
    trie: &PointerTrie<P>,
    node: Option<usize>,
    on_leaf: &mut impl FnMut(&P, &str, ValueType),
) -> Result<(), JsonError> {
    s.skip_ws();

    match s.peek() {
        Some(b'{') => parse_object(s, trie, node, on_leaf),
        Some(b'[') => parse_array(s, trie, node, on_leaf),
        Some(b'"') => {
            let text = parse_string(s)?;
            emit(trie, node, on_leaf, &text, ValueType::Str(text.clone()));
            Ok(())
        }
        Some(b't') => {
            parse_literal(s, "true")?;
            emit(trie, node, on_leaf, "true", ValueType::Bool(true));
            Ok(())
        }
        Some(b'f') => {
            parse_literal(s, "false")?;
            emit(trie, node, on_leaf, "false", ValueType::Bool(false));
            Ok(())
        }
        Some(b'n') => {
            parse_literal(s, "null")?;
            Ok(())
        }
        Some(c) if c == b'-' || c.is_ascii_digit() => {
            let (raw, value_type) = parse_number(s)?;
            emit(trie, node, on_leaf, raw, value_type);
            Ok(())
        }
        Some(_) => Err(s.err("unexpected character")),
        None => Err(s.err("unexpected end of input")),
    }
}

fn parse_object<P>(
    s: &mut Scanner<'_>,
    trie: &PointerTrie<P>,
    node: Option<usize>,
    on_leaf: &mut impl FnMut(&P, &str, ValueType),
) -> Result<(), JsonError> {
    s.expect(b'{')?;
    s.skip_ws();

    if s.peek() == Some(b'}') {
        s.pos += 1;
        return Ok(());
    }

    loop {
        s.skip_ws();

        if s.peek() != Some(b'"') {
            return Err(s.err("expected string key"));
        }

        let key = parse_string(s)?;
        s.skip_ws();
        s.expect(b':')?;

        let child = node.and_then(|n| trie.child(n, &key));
        parse_value(s, trie, child, on_leaf)?;
        s.skip_ws();

        match s.bump() {
            Some(b',') => continue,
            Some(b'}') => break,
            _ => return Err(s.err("expected ',' or '}'")),
        }
    }

    Ok(())
}

fn parse_array<P>(
    s: &mut Scanner<'_>,
    trie: &PointerTrie<P>,
    node: Option<usize>,
    on_leaf: &mut impl FnMut(&P, &str, ValueType),
) -> Result<(), JsonError> {
    s.expect(b'[')?;
    s.skip_ws();

    if s.peek() == Some(b']') {
        s.pos += 1;
        return Ok(());
    }

    let mut index = 0usize;

    loop {
        let key = index.to_string();
        let child = node.and_then(|n| trie.child(n, &key));
        parse_value(s, trie, child, on_leaf)?;
        index += 1;
        s.skip_ws();

        match s.bump() {
            Some(b',') => continue,
            Some(b']') => break,
            _ => return Err(s.err("expected ',' or ']'")),
        }
    }

    Ok(())
}

fn parse_string(s: &mut Scanner<'_>) -> Result<String, JsonError> {
    s.expect(b'"')?;
    let mut out = String::new();

    loop {
        match s.bump() {
            None => return Err(s.err("unterminated string")),
            Some(b'"') => break,
            Some(b'\\') => match s.bump() {
                Some(b'"') => out.push('"'),
                Some(b'\\') => out.push('\\'),
                Some(b'/') => out.push('/'),
                Some(b'b') => out.push('\u{0008}'),
                Some(b'f') => out.push('\u{000C}'),
                Some(b'n') => out.push('\n'),
                Some(b'r') => out.push('\r'),
                Some(b't') => out.push('\t'),
                Some(b'u') => {
                    let cp = s.read_hex4()?;

                    let scalar = if (0xD800..=0xDBFF).contains(&cp) {
                        if s.bump() != Some(b'\\') || s.bump() != Some(b'u') {
                            return Err(s.err("expected low surrogate"));
                        }

                        let low = s.read_hex4()?;

                        if !(0xDC00..=0xDFFF).contains(&low) {
                            return Err(s.err("invalid low surrogate"));
                        }

                        0x10000 + ((cp - 0xD800) << 10) + (low - 0xDC00)
                    } else {
                        cp
                    };

                    out.push(char::from_u32(scalar).ok_or_else(|| s.err("invalid unicode scalar"))?);
                }
                _ => return Err(s.err("invalid escape sequence")),
            },
            Some(b) if b < 0x80 => out.push(b as char),
            Some(b) => {
                let len = utf8_len(b);
                let start = s.pos - 1;
                let end = start + len;

                if end > s.bytes.len() {
                    return Err(s.err("truncated utf-8 sequence"));
                }

                out.push_str(s.slice_str(start, end));
                s.pos = end;
            }
        }
    }

    Ok(out)
}

fn parse_literal(s: &mut Scanner<'_>, literal: &str) -> Result<(), JsonError> {
    let bytes = literal.as_bytes();

    if s.pos + bytes.len() > s.bytes.len() || &s.bytes[s.pos..s.pos + bytes.len()] != bytes {
        return Err(s.err(&format!("expected literal `{literal}`")));
    }

    s.pos += bytes.len();
    Ok(())
}

fn parse_number<'a>(s: &mut Scanner<'a>) -> Result<(&'a str, ValueType), JsonError> {
    let start = s.pos;

    if s.peek() == Some(b'-') {
        s.pos += 1;
    }

    match s.peek() {
        Some(b'0') => s.pos += 1,
        Some(c) if c.is_ascii_digit() => {
            while matches!(s.peek(), Some(c) if c.is_ascii_digit()) {
                s.pos += 1;
            }
        }
        _ => return Err(s.err("invalid number")),
    }

    let mut is_float = false;

    if s.peek() == Some(b'.') {
        is_float = true;
        s.pos += 1;

        if !matches!(s.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(s.err("invalid fraction digits"));
        }

        while matches!(s.peek(), Some(c) if c.is_ascii_digit()) {
            s.pos += 1;
        }
    }

    if matches!(s.peek(), Some(b'e') | Some(b'E')) {
        is_float = true;
        s.pos += 1;

        if matches!(s.peek(), Some(b'+') | Some(b'-')) {
            s.pos += 1;
        }

        if !matches!(s.peek(), Some(c) if c.is_ascii_digit()) {
            return Err(s.err("invalid exponent digits"));
        }

        while matches!(s.peek(), Some(c) if c.is_ascii_digit()) {
            s.pos += 1;
        }
    }

    let raw = s.slice_str(start, s.pos);

    let value_type = if is_float {
        ValueType::Double(raw.parse().map_err(|_| s.err("invalid float literal"))?)
    } else if raw.starts_with('-') {
        ValueType::Int64(raw.parse().map_err(|_| s.err("invalid integer literal"))?)
    } else if let Ok(v) = raw.parse::<u64>() {
        ValueType::UInt64(v)
    } else {
        ValueType::Double(raw.parse().map_err(|_| s.err("number out of range"))?)
    };

    Ok((raw, value_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::trie::PointerTrie;

    fn collect(input: &str, pointers: &[&str]) -> Vec<(String, String, ValueType)> {
        let mut trie = PointerTrie::new();
        for (i, p) in pointers.iter().enumerate() {
            trie.add(p, i).unwrap();
        }
        let trie = trie.freeze();

        let mut hits = Vec::new();
        parse(input, &trie, |payload, raw, vt| {
            hits.push((pointers[*payload].to_owned(), raw.to_owned(), vt));
        })
        .unwrap();
        hits
    }

    #[test]
    fn extracts_a_scalar_at_an_array_index_pointer() {
        let hits = collect(
            r#"{"sensors":[{"value":23.5},{"value":24.1}]}"#,
            &["/sensors/0/value"],
        );

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, "23.5");
        assert_eq!(hits[0].2, ValueType::Double(23.5));
    }

    #[test]
    fn does_not_emit_for_interior_nodes_or_unconfigured_paths() {
        let hits = collect(r#"{"a":{"b":1},"c":2}"#, &["/a/b"]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, "1");
    }

    #[test]
    fn tags_integers_unsigned_and_signed_correctly() {
        let hits = collect(r#"{"neg":-5,"pos":5}"#, &["/neg", "/pos"]);
        assert_eq!(hits[0].2, ValueType::Int64(-5));
        assert_eq!(hits[1].2, ValueType::UInt64(5));
    }

    #[test]
    fn null_leaves_emit_nothing() {
        let hits = collect(r#"{"v":null}"#, &["/v"]);
        assert!(hits.is_empty());
    }

    #[test]
    fn strings_are_unescaped() {
        let hits = collect(r#"{"s":"a\nb"}"#, &["/s"]);
        assert_eq!(hits[0].1, "a\nb");
    }

    #[test]
    fn malformed_json_returns_an_error() {
        let trie: PointerTrie<()> = PointerTrie::new().freeze();
        let result = parse(r#"{"a":}"#, &trie, |_, _, _| {});
        assert!(result.is_err());
    }

    #[test]
    fn booleans_are_tagged_and_reported_as_literal_text() {
        let hits = collect(r#"{"b":true}"#, &["/b"]);
        assert_eq!(hits[0].1, "true");
        assert_eq!(hits[0].2, ValueType::Bool(true));
    }
}
