//! RFC 6901 JSON Pointer tokenization.

use crate::error::ConfigError;

/// Splits a JSON Pointer into its unescaped reference tokens.
///
/// The empty string is the pointer to the whole document (zero tokens). Any
/// other pointer must start with `/`; each token has `~1` unescaped to `/`
/// and `~0` unescaped to `~` (in that precedence, per RFC 6901 §4).
pub fn tokenize(pointer: &str) -> Result<Vec<String>, ConfigError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }

    if !pointer.starts_with('/') {
        return Err(ConfigError::InvalidJsonPointer {
            pointer: pointer.to_owned(),
            reason: "pointer must be empty or start with '/'",
        });
    }

    Ok(pointer[1..].split('/').map(unescape_token).collect())
}

fn unescape_token(token: &str) -> String {
    if !token.contains('~') {
        return token.to_owned();
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            Some(other) => {
                out.push('~');
                out.push(other);
            }
            None => out.push('~'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_a_simple_pointer() {
        assert_eq!(
            tokenize("/sensors/0/value").unwrap(),
            vec!["sensors", "0", "value"]
        );
    }

    #[test]
    fn empty_pointer_is_the_whole_document() {
        assert_eq!(tokenize("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unescapes_tilde_and_slash() {
        assert_eq!(tokenize("/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
    }

    #[test]
    fn rejects_pointers_not_starting_with_slash() {
        assert!(tokenize("sensors/0").is_err());
    }
}
