//! YAML-serializable bridge configuration (spec.md §6), built on
//! `foundations::settings`. This module only describes the document shape;
//! [`crate::config`] is what compiles it into the frozen runtime structures
//! of spec.md §4.

use foundations::settings::settings;

/// Top-level document: `mqtt_bridge`, `prometheus`, `mqtt` (spec.md §6).
#[settings]
pub struct AppSettings {
    /// Bridge-wide settings not specific to either side of the pipeline.
    pub mqtt_bridge: BridgeSettings,
    /// Scrape endpoint and metric configuration.
    pub prometheus: PrometheusSettings,
    /// Broker connection and handler/subscription configuration.
    pub mqtt: MqttSettings,
}

/// A `filename`/`level` logging sink, reused for both the main bridge log
/// and the scrape server's access log (spec.md §6 `mqtt_bridge.logging`,
/// `prometheus.access_log`).
#[settings]
pub struct FileLoggingSettings {
    /// Path of the log file. Empty means "log to the terminal" (see
    /// [`crate::config`]'s translation into `foundations`' `LoggingSettings`).
    pub filename: String,
    /// Minimum level logged: trace/debug/info/warn/error/critical/off.
    #[serde(default = "FileLoggingSettings::default_level")]
    pub level: String,
}

impl FileLoggingSettings {
    fn default_level() -> String {
        "info".to_owned()
    }
}

#[settings]
pub struct BridgeSettings {
    /// Main bridge log (dispatch loop, configuration warnings).
    pub logging: FileLoggingSettings,
}

#[settings]
pub struct PrometheusSettings {
    /// TCP port the scrape HTTP server listens on.
    #[serde(default = "PrometheusSettings::default_exporter_port")]
    pub exporter_port: u16,
    /// URL path serving the Prometheus/OpenMetrics exposition text.
    #[serde(default = "PrometheusSettings::default_exporter_uri")]
    pub exporter_uri: String,
    /// `prometheus` or `openmetric` (spec.md §4.10).
    #[serde(default = "PrometheusSettings::default_metric_style")]
    pub metric_style: String,
    /// Default per-metric timestamp policy (`on`/`off`) applied when a
    /// handler binding doesn't set its own `timestamp`.
    #[serde(default = "PrometheusSettings::default_timestamps")]
    pub timestamps: String,
    /// Independent access log for the scrape server (spec.md §4.12).
    pub access_log: FileLoggingSettings,
    /// Configured metrics, each bound to one or more handlers.
    pub metrics: Vec<MetricSettings>,
}

impl PrometheusSettings {
    fn default_exporter_port() -> u16 {
        9100
    }

    fn default_exporter_uri() -> String {
        "/metrics".to_owned()
    }

    fn default_metric_style() -> String {
        "prometheus".to_owned()
    }

    fn default_timestamps() -> String {
        "on".to_owned()
    }
}

#[settings]
pub struct MetricSettings {
    /// Metric name (the Prometheus series name).
    pub metric: String,
    /// gauge/counter/histogram/summary/info (spec.md §3; only gauge is
    /// presently meaningful).
    #[serde(default = "MetricSettings::default_type")]
    pub r#type: String,
    /// OpenMetrics unit name, or empty/`none`.
    #[serde(default)]
    pub unit: String,
    /// One entry per handler this metric is bound to.
    pub handlers: Vec<MetricHandlerBindingSettings>,
}

impl MetricSettings {
    fn default_type() -> String {
        "gauge".to_owned()
    }
}

#[settings]
pub struct MetricHandlerBindingSettings {
    /// The `mqtt.handlers[].id` this binding attaches to.
    pub handler_id: String,
    /// The property name read from the handler's payload: the raw value for
    /// a `value` handler, or the `json` property id for a `json` handler.
    pub property: String,
    /// Whether observations carry an exposition timestamp; falls back to
    /// `prometheus.timestamps` when left at the default empty string.
    #[serde(default)]
    pub timestamp: String,
    /// Derives the `location` label from the topic path ahead of
    /// `label_actions` (spec.md §4.6 step 4). Not part of the distilled
    /// spec's configuration surface; see DESIGN.md for why it is exposed
    /// here rather than folded into `label_actions`.
    #[serde(default)]
    pub property_actions: Vec<LabelActionSettings>,
    /// Label transformations applied in order (spec.md §4.3).
    #[serde(default)]
    pub label_actions: Vec<LabelActionSettings>,
    /// Value transformations applied in order (spec.md §4.4).
    #[serde(default)]
    pub value_actions: Vec<ValueActionSettings>,
}

#[settings]
pub struct LabelActionSettings {
    /// copy/drop/keep/replace-path (spec.md §4.3). Unknown values default to
    /// `keep` with a warning (spec.md §7).
    #[serde(default = "LabelActionSettings::default_action")]
    pub action: String,
    /// `copy`/`keep` source label name.
    #[serde(default)]
    pub source: String,
    /// `copy`/`drop`/`keep`/`replace-path` destination label name.
    #[serde(default)]
    pub target: String,
    /// `replace-path` rules: one topic filter per entry, each with its own
    /// list of replacement formats (spec.md §4.2, §4.3).
    #[serde(default)]
    pub replace: Vec<ReplaceRuleSettings>,
}

impl LabelActionSettings {
    fn default_action() -> String {
        "keep".to_owned()
    }
}

#[settings]
pub struct ReplaceRuleSettings {
    /// A topic filter (same grammar as `mqtt.topics[].subscriptions[]`).
    pub filter: String,
    /// One or more `\N`-placeholder format strings evaluated, in order,
    /// against the topic that matched `filter` (spec.md §4.2).
    pub formats: Vec<String>,
}

#[settings]
pub struct ValueActionSettings {
    /// keep/switch (spec.md §4.4). Unknown values default to `keep`.
    #[serde(default = "ValueActionSettings::default_action")]
    pub action: String,
    /// `switch`'s fallback value when the input isn't in `mappings`.
    #[serde(default)]
    pub default: String,
    /// `switch`'s input -> output value table.
    #[serde(default)]
    pub mappings: Vec<MappingEntrySettings>,
}

impl ValueActionSettings {
    fn default_action() -> String {
        "keep".to_owned()
    }
}

#[settings]
pub struct MappingEntrySettings {
    pub from: String,
    pub to: String,
}

#[settings]
pub struct MqttSettings {
    /// Broker hostname or address.
    pub host: String,
    /// Broker TCP port.
    #[serde(default = "MqttSettings::default_port")]
    pub port: u16,
    /// Payload interpreters, identified by `id`.
    pub handlers: Vec<MqttHandlerSettings>,
    /// Subscription bindings tying handlers to topic filters.
    pub topics: Vec<MqttTopicSettings>,
}

impl MqttSettings {
    fn default_port() -> u16 {
        1883
    }
}

#[settings]
pub struct MqttHandlerSettings {
    /// Unique handler id, referenced by `prometheus.metrics[].handlers[].handler_id`
    /// and `mqtt.topics[].handlers[]`.
    pub id: String,
    /// json/text/value (spec.md §4.7).
    #[serde(default = "MqttHandlerSettings::default_type")]
    pub r#type: String,
    /// For a `json` handler: the JSON Pointer bound to each metric property
    /// name (spec.md §4.5).
    #[serde(default)]
    pub properties: Vec<JsonPropertySettings>,
}

impl MqttHandlerSettings {
    fn default_type() -> String {
        "text".to_owned()
    }
}

#[settings]
pub struct JsonPropertySettings {
    /// The metric property name this pointer feeds.
    pub id: String,
    /// An RFC 6901 JSON Pointer into the handler's payload.
    pub json: String,
}

#[settings]
pub struct MqttTopicSettings {
    /// `mqtt.handlers[].id` values bound to `subscriptions`.
    pub handlers: Vec<String>,
    /// Topic filters subscribed on `CONNACK` and dispatched through
    /// `handlers` (spec.md §4.1, §4.9).
    pub subscriptions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let settings = PrometheusSettings::default();
        assert_eq!(settings.exporter_port, 9100);
        assert_eq!(settings.exporter_uri, "/metrics");
        assert_eq!(settings.metric_style, "prometheus");

        let mqtt = MqttSettings::default();
        assert_eq!(mqtt.port, 1883);
    }
}
