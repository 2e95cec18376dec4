//! Topic-filter automaton (spec.md §4.1): a trie over MQTT topic levels with
//! wildcard edges, mapping a concrete topic to every payload whose filter
//! matches it.
//!
//! The trie is built with an index-based arena — nodes are allocated
//! contiguously in a `Vec` and referenced by index rather than behind
//! `Box`/`Rc` pointers. Since the structure is frozen after configuration and
//! never mutated again, this avoids per-node heap allocation and makes
//! freezing a no-op (the arena already *is* the frozen representation).

use crate::error::ConfigError;
use crate::topic::{self, TopicLevels};
use std::collections::HashMap;

const ROOT: usize = 0;

struct Node<P> {
    literal: HashMap<String, usize>,
    plus: Option<usize>,
    hash: Option<usize>,
    payloads: Vec<P>,
}

impl<P> Node<P> {
    fn new() -> Self {
        Self {
            literal: HashMap::new(),
            plus: None,
            hash: None,
            payloads: Vec::new(),
        }
    }
}

/// A trie over topic levels, mapping concrete topics to the payloads whose
/// filter matches them.
///
/// Built with [`TopicAutomaton::add`], then [`TopicAutomaton::freeze`]d.
/// [`TopicAutomaton::find`] is only meaningful after freezing.
pub struct TopicAutomaton<P> {
    nodes: Vec<Node<P>>,
    frozen: bool,
}

impl<P> Default for TopicAutomaton<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> TopicAutomaton<P> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            frozen: false,
        }
    }

    /// Adds a `(filter, payload)` pair to the automaton.
    ///
    /// Rejects invalid filters (empty, `#` not at tail, mixed wildcard and
    /// literal text in a level) without touching the trie.
    pub fn add(&mut self, filter: &str, payload: P) -> Result<(), ConfigError> {
        assert!(!self.frozen, "cannot add to a frozen TopicAutomaton");

        topic::validate_filter(filter)?;

        let mut node = ROOT;

        for level in filter.split('/') {
            node = match level {
                topic::HASH => match self.nodes[node].hash {
                    Some(idx) => idx,
                    None => {
                        self.nodes.push(Node::new());
                        let idx = self.nodes.len() - 1;
                        self.nodes[node].hash = Some(idx);
                        idx
                    }
                },
                topic::PLUS => match self.nodes[node].plus {
                    Some(idx) => idx,
                    None => {
                        self.nodes.push(Node::new());
                        let idx = self.nodes.len() - 1;
                        self.nodes[node].plus = Some(idx);
                        idx
                    }
                },
                literal => {
                    if let Some(&existing) = self.nodes[node].literal.get(literal) {
                        existing
                    } else {
                        self.nodes.push(Node::new());
                        let idx = self.nodes.len() - 1;
                        self.nodes[node].literal.insert(literal.to_owned(), idx);
                        idx
                    }
                }
            };
        }

        self.nodes[node].payloads.push(payload);

        Ok(())
    }

    /// Freezes the automaton. After this call the structure is read-only;
    /// `add` must not be called again (enforced in debug builds via `assert`).
    pub fn freeze(mut self) -> Self {
        self.frozen = true;
        self
    }

    /// Finds every payload whose filter matches `topic_levels`.
    ///
    /// Returns an empty vector if `topic_levels` itself contains wildcard
    /// characters (querying with a filter is not meaningful) or if nothing
    /// matches. Emission order is depth-first: at each level, a literal-edge
    /// match is visited before the `+` edge, and a `#` edge (if present)
    /// emits immediately after, without descending further along it.
    pub fn find<'q>(&self, topic_levels: &TopicLevels<'q>) -> Vec<&P> {
        let levels = topic_levels.as_slice();

        if levels
            .iter()
            .any(|level| *level == topic::PLUS || *level == topic::HASH)
        {
            return Vec::new();
        }

        let mut out = Vec::new();
        self.collect(ROOT, levels, 0, &mut out);
        out
    }

    fn collect<'s>(&'s self, node_idx: usize, levels: &[&str], depth: usize, out: &mut Vec<&'s P>) {
        let node = &self.nodes[node_idx];

        if depth == levels.len() {
            out.extend(node.payloads.iter());
            return;
        }

        let level = levels[depth];
        let suppress_wildcards = depth == 0 && topic::is_system_level(level);

        if let Some(&child) = node.literal.get(level) {
            self.collect(child, levels, depth + 1, out);
        }

        if !suppress_wildcards {
            if let Some(plus) = node.plus {
                self.collect(plus, levels, depth + 1, out);
            }

            if let Some(hash) = node.hash {
                out.extend(self.nodes[hash].payloads.iter());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(topic: &str) -> TopicLevels<'_> {
        TopicLevels::tokenize(topic)
    }

    #[test]
    fn matches_single_level_wildcard() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("home/+/temp", "h1").unwrap();
        let automaton = automaton.freeze();

        assert_eq!(automaton.find(&levels("home/kitchen/temp")), vec![&"h1"]);
        assert!(automaton
            .find(&levels("home/kitchen/sensor/temp"))
            .is_empty());
    }

    #[test]
    fn system_topics_are_not_matched_by_leading_wildcards() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("+/kitchen/temp", "h1").unwrap();
        automaton.add("#", "h2").unwrap();
        let automaton = automaton.freeze();

        assert!(automaton.find(&levels("$SYS/kitchen/temp")).is_empty());
        assert_eq!(
            automaton.find(&levels("home/kitchen/temp")),
            vec![&"h1", &"h2"]
        );
    }

    #[test]
    fn hash_requires_at_least_one_trailing_level() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("home/#", "h1").unwrap();
        let automaton = automaton.freeze();

        assert!(automaton.find(&levels("home")).is_empty());
        assert_eq!(automaton.find(&levels("home/kitchen")), vec![&"h1"]);
        assert_eq!(automaton.find(&levels("home/kitchen/temp")), vec![&"h1"]);
    }

    #[test]
    fn literal_before_plus_before_hash() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("home/kitchen", "literal").unwrap();
        automaton.add("home/+", "plus").unwrap();
        automaton.add("home/#", "hash").unwrap();
        let automaton = automaton.freeze();

        assert_eq!(
            automaton.find(&levels("home/kitchen")),
            vec![&"literal", &"plus", &"hash"]
        );
    }

    #[test]
    fn rejects_invalid_filters_at_configuration_time() {
        let mut automaton: TopicAutomaton<&str> = TopicAutomaton::new();
        assert!(automaton.add("", "x").is_err());
        assert!(automaton.add("home/#/temp", "x").is_err());
        assert!(automaton.add("home/foo+", "x").is_err());
    }

    #[test]
    fn querying_with_a_wildcard_topic_returns_empty() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("home/+/temp", "h1").unwrap();
        let automaton = automaton.freeze();

        assert!(automaton.find(&levels("home/+/temp")).is_empty());
    }
}
