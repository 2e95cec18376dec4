//! Configuration loader / compiler (spec.md §4.13, C13): turns a parsed
//! [`AppSettings`](crate::settings::AppSettings) document into the frozen,
//! read-only runtime structures described in spec.md §4 — topic automata,
//! handlers, metrics, and their label/value actions.
//!
//! Every malformed entry (duplicate id, invalid filter, unknown action name,
//! a metric missing `property`, ...) is logged at `warn` and dropped; the
//! loader as a whole only fails when the `mqtt` root is missing in a way a
//! default-filled settings document can't otherwise represent (empty
//! `mqtt.host`, see [`compile`]).

use crate::cache::MetricCache;
use crate::dispatch::HandlerRef;
use crate::error::ConfigError;
use crate::handler::Handler;
use crate::json::PointerTrie;
use crate::label_actions::LabelAction;
use crate::metric::{Metric, MetricId, MetricTimestamp, MetricType, MetricUnit};
use crate::replace_format;
use crate::settings::{AppSettings, LabelActionSettings, ValueActionSettings};
use crate::style::MetricStyle;
use crate::topic_automaton::TopicAutomaton;
use crate::value_actions::ValueAction;
use foundations::telemetry::log;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything [`crate::dispatch::Dispatcher`] and the scrape server need to
/// run, produced once at startup and never mutated afterward.
pub struct CompiledConfig {
    pub automaton: TopicAutomaton<Vec<HandlerRef>>,
    pub cache: Arc<RwLock<MetricCache>>,
    pub style: MetricStyle,
    pub exporter_port: u16,
    pub exporter_uri: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    /// Deduplicated filter list gathered from every `mqtt.topics[]` entry,
    /// subscribed as one batch on `CONNACK` (spec.md §4.11).
    pub subscriptions: Vec<String>,
}

/// Compiles `settings` per spec.md §4.13. Fatal only when the `mqtt` root is
/// effectively absent (see the `mqtt_host` check below); every other
/// malformed entry is logged and skipped.
pub fn compile(settings: &AppSettings) -> Result<CompiledConfig, ConfigError> {
    // `#[settings]` gives every section a usable `Default`, so a literally
    // missing `mqtt:` block in the YAML document is indistinguishable from
    // an explicit empty one except by way of the one field with no sensible
    // default: a broker to connect to. Treated as the fatal case spec.md §7
    // calls for; see DESIGN.md for the full reasoning.
    if settings.mqtt.host.is_empty() {
        return Err(ConfigError::MissingSection { section: "mqtt" });
    }

    let style = MetricStyle::from_config_str(&settings.prometheus.metric_style).unwrap_or_else(|| {
        log::warn!("unknown metric_style, defaulting to prometheus"; "metric_style" => settings.prometheus.metric_style.clone());
        MetricStyle::default()
    });

    let handler_metrics = compile_metric_bindings(settings, style);
    let handlers = compile_handlers(settings, handler_metrics);
    let (automaton, subscriptions) = compile_topics(settings, &handlers);

    Ok(CompiledConfig {
        automaton,
        cache: Arc::new(RwLock::new(MetricCache::new())),
        style,
        exporter_port: settings.prometheus.exporter_port,
        exporter_uri: settings.prometheus.exporter_uri.clone(),
        mqtt_host: settings.mqtt.host.clone(),
        mqtt_port: settings.mqtt.port,
        subscriptions,
    })
}

/// Per spec.md §4.13 step 2: one `Metric` per `(metric, handler binding)`
/// pair, grouped by the handler id it attaches to.
fn compile_metric_bindings(settings: &AppSettings, style: MetricStyle) -> HashMap<String, Vec<(String, Metric)>> {
    let mut by_handler: HashMap<String, Vec<(String, Metric)>> = HashMap::new();

    for metric_cfg in &settings.prometheus.metrics {
        let metric_type = MetricType::from_config_str(&metric_cfg.r#type).unwrap_or_else(|| {
            log::warn!("unknown metric type, defaulting to gauge"; "metric" => metric_cfg.metric.clone(), "type" => metric_cfg.r#type.clone());
            MetricType::default()
        });

        let unit = MetricUnit::from_config_str(&metric_cfg.unit).unwrap_or_else(|| {
            if !metric_cfg.unit.is_empty() {
                log::warn!("unknown metric unit, defaulting to none"; "metric" => metric_cfg.metric.clone(), "unit" => metric_cfg.unit.clone());
            }
            MetricUnit::default()
        });

        for binding in &metric_cfg.handlers {
            if binding.property.is_empty() {
                log::warn!("metric is missing a property and was skipped"; "metric" => metric_cfg.metric.clone(), "handler_id" => binding.handler_id.clone());
                continue;
            }

            let timestamp_str = if binding.timestamp.is_empty() {
                settings.prometheus.timestamps.as_str()
            } else {
                binding.timestamp.as_str()
            };

            let timestamp_policy = MetricTimestamp::from_config_str(timestamp_str).unwrap_or_else(|| {
                log::warn!("unknown timestamp policy, defaulting to on"; "metric" => metric_cfg.metric.clone(), "timestamp" => timestamp_str.to_owned());
                MetricTimestamp::default()
            });

            let metric = Metric::new(
                MetricId {
                    name: metric_cfg.metric.clone(),
                    location: None,
                },
                binding.property.clone(),
                metric_type,
                unit,
                timestamp_policy,
                style,
                compile_label_actions(&binding.label_actions),
                compile_value_actions(&binding.value_actions),
                compile_label_actions(&binding.property_actions),
            );

            by_handler
                .entry(binding.handler_id.clone())
                .or_default()
                .push((binding.property.clone(), metric));
        }
    }

    by_handler
}

fn compile_label_actions(rows: &[LabelActionSettings]) -> Vec<LabelAction> {
    let mut actions = Vec::with_capacity(rows.len());

    for row in rows {
        match row.action.as_str() {
            "copy" => actions.push(LabelAction::Copy {
                src: row.source.clone(),
                dst: row.target.clone(),
            }),
            "drop" => actions.push(LabelAction::Drop {
                name: row.target.clone(),
            }),
            "keep" => {
                let name = if row.target.is_empty() { row.source.clone() } else { row.target.clone() };
                actions.push(LabelAction::Keep { name });
            }
            "replace-path" => {
                let mut automaton = TopicAutomaton::new();

                for rule in &row.replace {
                    let formats: Vec<_> = rule
                        .formats
                        .iter()
                        .map(|format| {
                            let outcome = replace_format::compile(format);
                            for warning in outcome.warnings {
                                log::warn!("replacement format warning"; "warning" => warning);
                            }
                            outcome.format
                        })
                        .collect();

                    if let Err(e) = automaton.add(&rule.filter, formats) {
                        log::warn!("invalid replace-path filter, rule skipped"; "filter" => rule.filter.clone(), "error" => e.to_string());
                    }
                }

                actions.push(LabelAction::ReplacePath {
                    dst: row.target.clone(),
                    automaton: automaton.freeze(),
                });
            }
            other => {
                log::warn!("unknown label action, defaulting to keep"; "action" => other.to_owned());
                let name = if row.target.is_empty() { row.source.clone() } else { row.target.clone() };
                actions.push(LabelAction::Keep { name });
            }
        }
    }

    actions
}

fn compile_value_actions(rows: &[ValueActionSettings]) -> Vec<ValueAction> {
    let mut actions = Vec::with_capacity(rows.len());

    for row in rows {
        match row.action.as_str() {
            "keep" => {}
            "switch" => actions.push(ValueAction::Switch {
                default: row.default.clone(),
                mapping: row.mappings.iter().map(|m| (m.from.clone(), m.to.clone())).collect(),
            }),
            other => {
                log::warn!("unknown value action, defaulting to keep"; "action" => other.to_owned());
            }
        }
    }

    actions
}

/// Per spec.md §4.13 steps 1 and 3: builds one [`Handler`] per
/// `mqtt.handlers[]` entry, attaching the metrics gathered for its id.
fn compile_handlers(settings: &AppSettings, mut handler_metrics: HashMap<String, Vec<(String, Metric)>>) -> HashMap<String, HandlerRef> {
    let mut handlers = HashMap::new();
    let mut seen_ids = HashSet::new();

    for h in &settings.mqtt.handlers {
        if !seen_ids.insert(h.id.clone()) {
            log::warn!("duplicate handler id, dropped"; "handler_id" => h.id.clone());
            continue;
        }

        let bindings = handler_metrics.remove(&h.id).unwrap_or_default();

        let handler = match h.r#type.as_str() {
            "text" => Handler::text(h.id.clone()),
            "value" => {
                let metrics = bindings.into_iter().map(|(_, metric)| metric).collect();
                Handler::value(h.id.clone(), metrics)
            }
            "json" => {
                let mut by_property: HashMap<&str, Vec<usize>> = HashMap::new();
                for (index, (property, _)) in bindings.iter().enumerate() {
                    by_property.entry(property.as_str()).or_default().push(index);
                }

                let mut trie = PointerTrie::new();
                let mut seen_properties = HashSet::new();

                for prop in &h.properties {
                    if !seen_properties.insert(prop.id.clone()) {
                        continue;
                    }

                    let Some(indices) = by_property.get(prop.id.as_str()) else {
                        continue;
                    };

                    if let Err(e) = trie.add(&prop.json, indices.clone()) {
                        log::warn!("invalid JSON pointer, property skipped"; "handler_id" => h.id.clone(), "pointer" => prop.json.clone(), "error" => e.to_string());
                    }
                }

                let metrics = bindings.into_iter().map(|(_, metric)| metric).collect();
                Handler::json(h.id.clone(), metrics, trie.freeze())
            }
            other => {
                log::warn!("unknown handler type, defaulting to text"; "handler_id" => h.id.clone(), "type" => other.to_owned());
                Handler::text(h.id.clone())
            }
        };

        handlers.insert(h.id.clone(), Arc::new(Mutex::new(handler)));
    }

    for unused_id in handler_metrics.keys() {
        log::warn!("metric binding references an unknown handler id"; "handler_id" => unused_id.clone());
    }

    handlers
}

/// Per spec.md §4.13 step 4: one topic-filter automaton entry per
/// `(filter, handler list)` pair gathered from `mqtt.topics[]`.
fn compile_topics(settings: &AppSettings, handlers: &HashMap<String, HandlerRef>) -> (TopicAutomaton<Vec<HandlerRef>>, Vec<String>) {
    let mut automaton = TopicAutomaton::new();
    let mut subscriptions = Vec::new();
    let mut seen_filters = HashSet::new();

    for topic in &settings.mqtt.topics {
        let mut refs = Vec::with_capacity(topic.handlers.len());

        for id in &topic.handlers {
            match handlers.get(id) {
                Some(handler) => refs.push(Arc::clone(handler)),
                None => log::warn!("topic binding references an unknown handler id"; "handler_id" => id.clone()),
            }
        }

        if refs.is_empty() {
            continue;
        }

        for filter in &topic.subscriptions {
            if let Err(e) = automaton.add(filter, refs.clone()) {
                log::warn!("invalid topic filter, subscription skipped"; "filter" => filter.clone(), "error" => e.to_string());
                continue;
            }

            if seen_filters.insert(filter.clone()) {
                subscriptions.push(filter.clone());
            }
        }
    }

    (automaton.freeze(), subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{JsonPropertySettings, MetricHandlerBindingSettings, MetricSettings, MqttHandlerSettings, MqttTopicSettings};

    fn base_settings() -> AppSettings {
        let mut settings = AppSettings::default();
        settings.mqtt.host = "broker.local".to_owned();
        settings
    }

    #[test]
    fn missing_mqtt_host_is_fatal() {
        let settings = AppSettings::default();
        assert!(matches!(compile(&settings), Err(ConfigError::MissingSection { section: "mqtt" })));
    }

    #[test]
    fn end_to_end_gauge_configuration_matches_and_renders() {
        let mut settings = base_settings();

        settings.mqtt.handlers.push(MqttHandlerSettings {
            id: "t1".to_owned(),
            r#type: "json".to_owned(),
            properties: vec![JsonPropertySettings {
                id: "t".to_owned(),
                json: "/t".to_owned(),
            }],
        });

        settings.mqtt.topics.push(MqttTopicSettings {
            handlers: vec!["t1".to_owned()],
            subscriptions: vec!["room/+/env".to_owned()],
        });

        let mut metric = MetricSettings {
            metric: "temp_c".to_owned(),
            r#type: "gauge".to_owned(),
            unit: "celsius".to_owned(),
            handlers: Vec::new(),
        };
        metric.handlers.push(MetricHandlerBindingSettings {
            handler_id: "t1".to_owned(),
            property: "t".to_owned(),
            timestamp: String::new(),
            property_actions: Vec::new(),
            label_actions: Vec::new(),
            value_actions: Vec::new(),
        });
        settings.prometheus.metrics.push(metric);

        let compiled = compile(&settings).unwrap();
        assert_eq!(compiled.subscriptions, vec!["room/+/env".to_owned()]);

        let topic_levels = crate::topic::TopicLevels::tokenize("room/kitchen/env");
        let handler_lists = compiled.automaton.find(&topic_levels);
        assert_eq!(handler_lists.len(), 1);

        let mut out = Vec::new();
        for handler in handler_lists[0] {
            handler.lock().event(r#"{"t":22}"#, "room/kitchen/env", &topic_levels, 1_000, &mut out);
        }

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id.name, "temp_c");
        assert_eq!(out[0].value, "22");
    }

    #[test]
    fn duplicate_handler_id_is_dropped() {
        let mut settings = base_settings();
        settings.mqtt.handlers.push(MqttHandlerSettings {
            id: "dup".to_owned(),
            r#type: "text".to_owned(),
            properties: Vec::new(),
        });
        settings.mqtt.handlers.push(MqttHandlerSettings {
            id: "dup".to_owned(),
            r#type: "text".to_owned(),
            properties: Vec::new(),
        });
        settings.mqtt.topics.push(MqttTopicSettings {
            handlers: vec!["dup".to_owned()],
            subscriptions: vec!["a".to_owned()],
        });

        let compiled = compile(&settings).unwrap();
        // Both `mqtt.handlers[]` entries share an id; only the first survives,
        // so a topic binding naming it still resolves to exactly one handler.
        let levels = crate::topic::TopicLevels::tokenize("a");
        let handler_lists = compiled.automaton.find(&levels);
        assert_eq!(handler_lists.len(), 1);
        assert_eq!(handler_lists[0].len(), 1);
    }

    #[test]
    fn metric_without_property_is_skipped() {
        let mut settings = base_settings();
        let mut metric = MetricSettings {
            metric: "m".to_owned(),
            r#type: "gauge".to_owned(),
            unit: String::new(),
            handlers: Vec::new(),
        };
        metric.handlers.push(MetricHandlerBindingSettings {
            handler_id: "h".to_owned(),
            property: String::new(),
            timestamp: String::new(),
            property_actions: Vec::new(),
            label_actions: Vec::new(),
            value_actions: Vec::new(),
        });
        settings.prometheus.metrics.push(metric);

        let by_handler = compile_metric_bindings(&settings, MetricStyle::default());
        assert!(by_handler.is_empty());
    }
}
