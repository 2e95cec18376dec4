//! Metric cache (spec.md §4.8): a latest-wins store keyed by metric identity
//! plus label set, read by the scrape renderer (C10) and written by the
//! dispatch loop (C9).

use crate::labels::Labels;
use crate::metric::{MetricData, MetricId};
use std::collections::HashMap;

/// Latest-wins store: `(MetricId, Labels) -> MetricData`.
///
/// Concurrent access (spec.md §5) is the caller's responsibility — this type
/// is plain data, wrapped in a lock by [`crate::dispatch`]/[`crate::render`].
#[derive(Default)]
pub struct MetricCache {
    entries: HashMap<(MetricId, Labels), MetricData>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces every entry in `data`, keyed by its own
    /// `(id, labels)`. Later entries in the same call win over earlier ones,
    /// same as a later `add` call winning over an earlier one (P6).
    pub fn add(&mut self, data: impl IntoIterator<Item = MetricData>) {
        for entry in data {
            let key = (entry.id.clone(), entry.labels.clone());
            self.entries.insert(key, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, ordered per spec.md §3: by `(id.name, id.location)`, then
    /// by labels' lexicographic `(name, value)` pairs.
    pub fn ordered_entries(&self) -> Vec<&MetricData> {
        let mut entries: Vec<&MetricData> = self.entries.values().collect();
        entries.sort_by(|a, b| {
            a.id.name
                .cmp(&b.id.name)
                .then_with(|| a.id.location.cmp(&b.id.location))
                .then_with(|| label_sort_key(&a.labels).cmp(&label_sort_key(&b.labels)))
        });
        entries
    }
}

fn label_sort_key(labels: &Labels) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    pairs.sort();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_type::ValueType;

    fn data(name: &str, value: &str, timestamp: i64) -> MetricData {
        MetricData {
            id: MetricId {
                name: name.to_owned(),
                location: None,
            },
            labels: Labels::new(),
            value: value.to_owned(),
            observed_value_type: ValueType::Unknown,
            timestamp,
            ..Default::default()
        }
    }

    #[test]
    fn latest_wins_for_the_same_key() {
        let mut cache = MetricCache::new();
        cache.add(vec![data("m", "1", 100)]);
        cache.add(vec![data("m", "2", 200)]);

        let entries = cache.ordered_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "2");
        assert_eq!(entries[0].timestamp, 200);
    }

    #[test]
    fn entries_sort_by_name_then_location_then_labels() {
        let mut cache = MetricCache::new();
        let mut b = data("b", "1", 0);
        b.labels.set("z", "1");
        let mut a2 = data("a", "1", 0);
        a2.labels.set("a", "1");
        let a1 = data("a", "1", 0);

        // a1 and a2 share the same metric id but different labels, so both
        // survive as distinct keys.
        cache.add(vec![b, a2, a1]);

        let names: Vec<_> = cache.ordered_entries().into_iter().map(|d| d.id.name.clone()).collect();
        assert_eq!(names, vec!["a", "a", "b"]);
    }
}
