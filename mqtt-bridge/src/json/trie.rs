//! Pointer trie (spec.md §4.5): an index-based arena trie over JSON Pointer
//! tokens, mirroring [`crate::topic_automaton::TopicAutomaton`]'s build/freeze
//! shape but with exact-token edges only (no wildcards).

use super::pointer;
use crate::error::ConfigError;
use std::collections::HashMap;

const ROOT: usize = 0;

struct Node<P> {
    children: HashMap<String, usize>,
    payload: Vec<P>,
}

impl<P> Node<P> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            payload: Vec::new(),
        }
    }
}

/// Maps JSON Pointers to payloads, navigated token-by-token as a SAX parser
/// descends into a document.
pub struct PointerTrie<P> {
    nodes: Vec<Node<P>>,
    frozen: bool,
}

impl<P> Default for PointerTrie<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PointerTrie<P> {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
            frozen: false,
        }
    }

    /// Registers `payload` at `pointer`. A pointer registered twice collapses
    /// onto the same node, so both payloads accumulate there (spec.md §3's
    /// "a JSON property name occurring twice ... is registered exactly once"
    /// refers to the *handler-id* property name, which callers are expected
    /// to de-duplicate before calling `add` a second time for the same name).
    pub fn add(&mut self, pointer: &str, payload: P) -> Result<(), ConfigError> {
        assert!(!self.frozen, "cannot add to a frozen PointerTrie");

        let tokens = pointer::tokenize(pointer)?;
        let mut node = ROOT;

        for token in tokens {
            node = if let Some(&existing) = self.nodes[node].children.get(&token) {
                existing
            } else {
                self.nodes.push(Node::new());
                let idx = self.nodes.len() - 1;
                self.nodes[node].children.insert(token, idx);
                idx
            };
        }

        self.nodes[node].payload.push(payload);
        Ok(())
    }

    pub fn freeze(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn root(&self) -> usize {
        ROOT
    }

    /// Descends from `node` along `token`, if an edge exists.
    pub fn child(&self, node: usize, token: &str) -> Option<usize> {
        self.nodes[node].children.get(token).copied()
    }

    /// The payloads registered exactly at `node`.
    pub fn payload(&self, node: usize) -> &[P] {
        &self.nodes[node].payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigates_object_and_array_tokens() {
        let mut trie = PointerTrie::new();
        trie.add("/sensors/0/value", "p1").unwrap();
        let trie = trie.freeze();

        let root = trie.root();
        let sensors = trie.child(root, "sensors").unwrap();
        let zero = trie.child(sensors, "0").unwrap();
        let value = trie.child(zero, "value").unwrap();

        assert_eq!(trie.payload(value), &["p1"]);
        assert!(trie.child(root, "missing").is_none());
    }

    #[test]
    fn duplicate_pointer_accumulates_payloads_at_one_node() {
        let mut trie = PointerTrie::new();
        trie.add("/t", "p1").unwrap();
        trie.add("/t", "p2").unwrap();
        let trie = trie.freeze();

        let t = trie.child(trie.root(), "t").unwrap();
        assert_eq!(trie.payload(t), &["p1", "p2"]);
    }

    #[test]
    fn rejects_invalid_pointer_at_configuration_time() {
        let mut trie: PointerTrie<&str> = PointerTrie::new();
        assert!(trie.add("no-leading-slash", "x").is_err());
    }
}
