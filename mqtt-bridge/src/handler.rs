//! Per-message payload interpreters (spec.md §4.7): a handler turns one MQTT
//! payload into zero or more [`MetricData`] records.

use crate::json::{self, PointerTrie};
use crate::metric::{Metric, MetricData};
use crate::topic::TopicLevels;
use crate::value_type::ValueType;
use foundations::telemetry::log;

enum HandlerKind {
    /// No-op; exists so configuration can declare pass-through handlers.
    Text,
    /// The payload itself is the observed value for every owned metric.
    Value { metrics: Vec<Metric> },
    /// The payload is JSON; `trie` maps configured pointers to the indices
    /// (into `metrics`) of the metrics bound to that property.
    Json {
        metrics: Vec<Metric>,
        trie: PointerTrie<Vec<usize>>,
    },
}

/// A configured MQTT message interpreter, identified by a unique string id.
pub struct Handler {
    pub id: String,
    kind: HandlerKind,
}

impl Handler {
    pub fn text(id: String) -> Self {
        Self {
            id,
            kind: HandlerKind::Text,
        }
    }

    pub fn value(id: String, metrics: Vec<Metric>) -> Self {
        Self {
            id,
            kind: HandlerKind::Value { metrics },
        }
    }

    pub fn json(id: String, metrics: Vec<Metric>, trie: PointerTrie<Vec<usize>>) -> Self {
        Self {
            id,
            kind: HandlerKind::Json { metrics, trie },
        }
    }

    /// Upper bound on the number of [`MetricData`] records one call to
    /// [`Handler::event`] can produce, used by C9 to pre-size its output
    /// buffer. For JSON handlers this undercounts when a configured pointer
    /// lands inside a repeated array element, which is rare enough in
    /// practice not to matter for a capacity hint.
    pub fn metric_count(&self) -> usize {
        match &self.kind {
            HandlerKind::Text => 0,
            HandlerKind::Value { metrics } => metrics.len(),
            HandlerKind::Json { metrics, .. } => metrics.len(),
        }
    }

    pub fn event(&mut self, raw: &str, topic: &str, topic_levels: &TopicLevels<'_>, timestamp: i64, out: &mut Vec<MetricData>) {
        match &mut self.kind {
            HandlerKind::Text => {}
            HandlerKind::Value { metrics } => {
                for metric in metrics.iter_mut() {
                    metric.event(raw, topic, topic_levels, timestamp, ValueType::Unknown, out);
                }
            }
            HandlerKind::Json { metrics, trie } => {
                // Malformed JSON aborts this message only; nothing already
                // pushed onto `out` by a sibling handler is affected.
                if let Err(e) = json::parse(raw, trie, |indices: &Vec<usize>, raw_value, value_type| {
                    for &index in indices {
                        metrics[index].event(raw_value, topic, topic_levels, timestamp, value_type.clone(), out);
                    }
                }) {
                    log::debug!("malformed JSON payload, message dropped"; "handler_id" => self.id.clone(), "topic" => topic.to_owned(), "error" => e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{MetricId, MetricTimestamp, MetricType, MetricUnit};
    use crate::style::MetricStyle;

    fn levels(topic: &str) -> TopicLevels<'_> {
        TopicLevels::tokenize(topic)
    }

    fn gauge(name: &str, property: &str) -> Metric {
        Metric::new(
            MetricId {
                name: name.to_owned(),
                location: None,
            },
            property.to_owned(),
            MetricType::Gauge,
            MetricUnit::None,
            MetricTimestamp::On,
            MetricStyle::Prometheus,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn text_handler_emits_nothing() {
        let mut handler = Handler::text("h".to_owned());
        let mut out = Vec::new();
        handler.event("payload", "t", &levels("t"), 0, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn value_handler_feeds_the_raw_payload_to_every_metric() {
        let mut handler = Handler::value("h".to_owned(), vec![gauge("m1", "p"), gauge("m2", "p")]);
        let mut out = Vec::new();
        handler.event("42", "t", &levels("t"), 0, &mut out);

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|d| d.value == "42"));
    }

    #[test]
    fn json_handler_dispatches_to_the_metric_bound_at_the_matching_pointer() {
        let mut trie = PointerTrie::new();
        trie.add("/t", vec![0usize]).unwrap();
        let trie = trie.freeze();

        let mut handler = Handler::json("h".to_owned(), vec![gauge("temp", "t")], trie);
        let mut out = Vec::new();
        handler.event(r#"{"t":22.5}"#, "room/env", &levels("room/env"), 0, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "22.5");
        assert_eq!(out[0].id.name, "temp");
    }

    #[test]
    fn malformed_json_emits_nothing_and_does_not_error_out_to_the_caller() {
        let mut trie = PointerTrie::new();
        trie.add("/t", vec![0usize]).unwrap();
        let trie = trie.freeze();

        let mut handler = Handler::json("h".to_owned(), vec![gauge("temp", "t")], trie);
        let mut out = Vec::new();
        handler.event("{not json", "room/env", &levels("room/env"), 0, &mut out);

        assert!(out.is_empty());
    }
}
