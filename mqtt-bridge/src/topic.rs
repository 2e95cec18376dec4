//! MQTT topic and topic-filter primitives.
//!
//! A topic is a `/`-separated path (`home/kitchen/temp`); a filter is the same
//! shape but may contain `+` (single-level wildcard) and `#` (multi-level,
//! tail-only wildcard). This module only deals with the string-level rules;
//! matching lives in [`crate::topic_automaton`].

use crate::error::ConfigError;

/// Single-level wildcard.
pub const PLUS: &str = "+";
/// Multi-level (tail) wildcard.
pub const HASH: &str = "#";

/// Trims a single trailing `/` from a concrete topic, per spec.
pub fn trim_trailing_slash(topic: &str) -> &str {
    topic.strip_suffix('/').unwrap_or(topic)
}

/// An ordered, borrowed view of a concrete topic's `/`-separated levels.
///
/// Backed by the original topic buffer; the levels never outlive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLevels<'a> {
    levels: Vec<&'a str>,
}

impl<'a> TopicLevels<'a> {
    /// Tokenizes a concrete topic (already trimmed of a trailing slash).
    pub fn tokenize(topic: &'a str) -> Self {
        let levels = if topic.is_empty() {
            Vec::new()
        } else {
            topic.split('/').collect()
        };

        Self { levels }
    }

    /// Returns the level at `index`, or `None` if the topic is shorter.
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.levels.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn as_slice(&self) -> &[&'a str] {
        &self.levels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, &'a str> {
        self.levels.iter()
    }
}

/// Whether a literal topic level names an MQTT system topic (`$SYS`, ...).
///
/// Only meaningful for the first level of a topic.
pub fn is_system_level(level: &str) -> bool {
    level.starts_with('$')
}

/// Splits a filter string into its levels without validating them.
fn filter_levels(filter: &str) -> Vec<&str> {
    if filter.is_empty() {
        Vec::new()
    } else {
        filter.split('/').collect()
    }
}

/// Validates a topic filter per spec: non-empty, `#` only as the final level
/// and alone within it, and no level mixing a wildcard character with literal
/// text (e.g. `foo+` or `a#` are both rejected).
pub fn validate_filter(filter: &str) -> Result<(), ConfigError> {
    if filter.is_empty() {
        return Err(ConfigError::InvalidTopicFilter {
            filter: filter.to_owned(),
            reason: "filter is empty",
        });
    }

    let levels = filter_levels(filter);

    for (idx, level) in levels.iter().enumerate() {
        let is_last = idx + 1 == levels.len();

        if *level == HASH {
            if !is_last {
                return Err(ConfigError::InvalidTopicFilter {
                    filter: filter.to_owned(),
                    reason: "'#' must be the last level",
                });
            }

            continue;
        }

        if *level == PLUS {
            continue;
        }

        if level.contains('+') || level.contains('#') {
            return Err(ConfigError::InvalidTopicFilter {
                filter: filter.to_owned(),
                reason: "a level may not mix a wildcard with literal text",
            });
        }

        if level.is_empty() {
            return Err(ConfigError::InvalidTopicFilter {
                filter: filter.to_owned(),
                reason: "empty topic level",
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_single_trailing_slash() {
        assert_eq!(trim_trailing_slash("home/kitchen/"), "home/kitchen");
        assert_eq!(trim_trailing_slash("home/kitchen"), "home/kitchen");
        assert_eq!(trim_trailing_slash("home/kitchen//"), "home/kitchen/");
    }

    #[test]
    fn tokenizes_levels() {
        let levels = TopicLevels::tokenize("home/kitchen/temp");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels.get(0), Some("home"));
        assert_eq!(levels.get(1), Some("kitchen"));
        assert_eq!(levels.get(2), Some("temp"));
        assert_eq!(levels.get(3), None);
    }

    #[test]
    fn rejects_empty_filter() {
        assert!(validate_filter("").is_err());
    }

    #[test]
    fn rejects_hash_not_at_tail() {
        assert!(validate_filter("home/#/temp").is_err());
        assert!(validate_filter("home/#").is_ok());
    }

    #[test]
    fn rejects_mixed_wildcard_literal() {
        assert!(validate_filter("home/temp+").is_err());
        assert!(validate_filter("home/+temp").is_err());
        assert!(validate_filter("home/a#").is_err());
    }

    #[test]
    fn accepts_plain_wildcards() {
        assert!(validate_filter("home/+/temp").is_ok());
        assert!(validate_filter("home/kitchen/temp").is_ok());
    }

    #[test]
    fn identifies_system_levels() {
        assert!(is_system_level("$SYS"));
        assert!(!is_system_level("home"));
    }
}
