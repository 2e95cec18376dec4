//! Ordered label set threaded through label actions and metric storage
//! (spec.md §4.3, §4.6).

use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// An insertion-ordered set of label name/value pairs.
///
/// Order matters: it is preserved into the cache key and exposition output,
/// so two metrics with the same labels in a different order are still
/// considered the same series (label actions always apply to topic levels in
/// a fixed, config-derived order, so this never actually diverges in
/// practice — see [`crate::cache::MetricCache`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    entries: IndexMap<String, String>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a label. Later writes for the same name win, but
    /// keep that name's original position in the ordering.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(name)
    }

    /// Empties the label set while preserving its backing capacity.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, String> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Order-independent, matching [`IndexMap`]'s order-independent `PartialEq`:
/// the same label set inserted in a different order must land in the same
/// cache slot.
impl Hash for Labels {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut acc: u64 = 0;

        for entry in &self.entries {
            let mut entry_hasher = std::collections::hash_map::DefaultHasher::new();
            entry.hash(&mut entry_hasher);
            acc ^= entry_hasher.finish();
        }

        acc.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_writes_overwrite_the_value_but_keep_position() {
        let mut labels = Labels::new();
        labels.set("room", "kitchen");
        labels.set("floor", "1");
        labels.set("room", "bath");

        let ordered: Vec<_> = labels.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(ordered, vec![("room", "bath"), ("floor", "1")]);
    }

    #[test]
    fn remove_drops_the_label() {
        let mut labels = Labels::new();
        labels.set("room", "kitchen");
        assert_eq!(labels.remove("room"), Some("kitchen".to_owned()));
        assert!(!labels.contains("room"));
    }

    #[test]
    fn equality_and_hash_are_order_independent() {
        use std::collections::hash_map::DefaultHasher;

        let mut a = Labels::new();
        a.set("room", "kitchen");
        a.set("floor", "1");

        let mut b = Labels::new();
        b.set("floor", "1");
        b.set("room", "kitchen");

        assert_eq!(a, b);

        let hash_of = |l: &Labels| {
            let mut h = DefaultHasher::new();
            l.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash_of(&a), hash_of(&b));
    }
}
