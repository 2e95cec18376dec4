//! Dispatch loop (spec.md §4.9): the single path from an incoming MQTT
//! message to writes against the metric cache.

use crate::cache::MetricCache;
use crate::handler::Handler;
use crate::topic::{self, TopicLevels};
use crate::topic_automaton::TopicAutomaton;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Handlers are shared, read-only-after-configuration ownership: the same
/// handler id can be bound to more than one topic filter, so every topic
/// binding holds an `Arc` to it. A `Mutex` gives the one interior-mutable
/// seam `Handler::event` needs (its owned `Metric`s carry reusable scratch
/// buffers) without allowing configuration-time structure to change
/// (spec.md §9 "Shared read-only handlers").
pub type HandlerRef = Arc<Mutex<Handler>>;

/// Runs the dispatch algorithm of spec.md §4.9 against a frozen topic
/// automaton and a shared metric cache.
pub struct Dispatcher {
    automaton: TopicAutomaton<Vec<HandlerRef>>,
    cache: Arc<RwLock<MetricCache>>,
    scratch: Vec<crate::metric::MetricData>,
}

impl Dispatcher {
    pub fn new(automaton: TopicAutomaton<Vec<HandlerRef>>, cache: Arc<RwLock<MetricCache>>) -> Self {
        Self {
            automaton,
            cache,
            scratch: Vec::new(),
        }
    }

    /// Handles one MQTT message. `now_ms` is the millisecond receive
    /// timestamp — injected so tests can fix it (spec.md §4.9 step 4).
    pub fn dispatch(&mut self, topic: &str, payload: &str, now_ms: i64) {
        let topic = topic::trim_trailing_slash(topic);
        let topic_levels = TopicLevels::tokenize(topic);

        let handler_lists = self.automaton.find(&topic_levels);
        if handler_lists.is_empty() {
            return;
        }

        self.scratch.clear();

        for handlers in handler_lists {
            for handler in handlers {
                let additional = handler.lock().metric_count();
                self.scratch.reserve(additional);
                handler.lock().event(payload, topic, &topic_levels, now_ms, &mut self.scratch);
            }
        }

        self.cache.write().add(self.scratch.drain(..));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Metric, MetricId, MetricTimestamp, MetricType, MetricUnit};
    use crate::style::MetricStyle;

    fn gauge_handler(id: &str, metric_name: &str) -> HandlerRef {
        let metric = Metric::new(
            MetricId {
                name: metric_name.to_owned(),
                location: None,
            },
            "p".to_owned(),
            MetricType::Gauge,
            MetricUnit::None,
            MetricTimestamp::On,
            MetricStyle::Prometheus,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        Arc::new(Mutex::new(Handler::value(id.to_owned(), vec![metric])))
    }

    #[test]
    fn matches_and_writes_through_to_the_cache() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("room/+/env", vec![gauge_handler("h1", "temp")]).unwrap();
        let automaton = automaton.freeze();

        let cache = Arc::new(RwLock::new(MetricCache::new()));
        let mut dispatcher = Dispatcher::new(automaton, cache.clone());

        dispatcher.dispatch("room/kitchen/env", "22", 1_000);

        let entries = cache.read().ordered_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "22");
    }

    #[test]
    fn non_matching_topic_writes_nothing() {
        let mut automaton = TopicAutomaton::new();
        automaton.add("room/+/env", vec![gauge_handler("h1", "temp")]).unwrap();
        let automaton = automaton.freeze();

        let cache = Arc::new(RwLock::new(MetricCache::new()));
        let mut dispatcher = Dispatcher::new(automaton, cache.clone());

        dispatcher.dispatch("elsewhere", "22", 1_000);

        assert!(cache.read().is_empty());
    }
}
