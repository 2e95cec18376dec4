//! Metric identity and the per-observation record (spec.md §3, §4.6).

use crate::label_actions::LabelAction;
use crate::labels::Labels;
use crate::style::MetricStyle;
use crate::topic::TopicLevels;
use crate::value_actions::ValueAction;
use crate::value_type::ValueType;

/// Structured metric identifier. Equality (and the cache key) considers both
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct MetricId {
    pub name: String,
    pub location: Option<String>,
}

/// Metric kind. Only `Gauge` is presently meaningful; the rest are reserved
/// per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    #[default]
    Gauge,
    Counter,
    Histogram,
    Summary,
    Info,
}

impl MetricType {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "gauge" => Some(Self::Gauge),
            "counter" => Some(Self::Counter),
            "histogram" => Some(Self::Histogram),
            "summary" => Some(Self::Summary),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Info => "info",
        }
    }
}

/// Metric unit, drawn from the OpenMetrics standard unit set plus `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricUnit {
    #[default]
    None,
    Seconds,
    Bytes,
    Celsius,
    Percent,
    Ratio,
    Volts,
    Amperes,
    Joules,
    Grams,
    Meters,
    Hertz,
}

impl MetricUnit {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "none" | "" => Some(Self::None),
            "seconds" => Some(Self::Seconds),
            "bytes" => Some(Self::Bytes),
            "celsius" => Some(Self::Celsius),
            "percent" => Some(Self::Percent),
            "ratio" => Some(Self::Ratio),
            "volts" => Some(Self::Volts),
            "amperes" => Some(Self::Amperes),
            "joules" => Some(Self::Joules),
            "grams" => Some(Self::Grams),
            "meters" => Some(Self::Meters),
            "hertz" => Some(Self::Hertz),
            _ => None,
        }
    }

    /// Empty for `None` (suppresses the `# UNIT` header line, spec.md §4.10).
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::None => "",
            MetricUnit::Seconds => "seconds",
            MetricUnit::Bytes => "bytes",
            MetricUnit::Celsius => "celsius",
            MetricUnit::Percent => "percent",
            MetricUnit::Ratio => "ratio",
            MetricUnit::Volts => "volts",
            MetricUnit::Amperes => "amperes",
            MetricUnit::Joules => "joules",
            MetricUnit::Grams => "grams",
            MetricUnit::Meters => "meters",
            MetricUnit::Hertz => "hertz",
        }
    }
}

/// Whether a record carries an exposition timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricTimestamp {
    #[default]
    On,
    Off,
}

impl MetricTimestamp {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }
}

/// The per-observation record written to the cache and rendered by C10.
#[derive(Debug, Clone, Default)]
pub struct MetricData {
    pub id: MetricId,
    pub labels: Labels,
    pub value: String,
    pub metric_type: MetricType,
    pub unit: MetricUnit,
    pub timestamp_policy: MetricTimestamp,
    pub metric_style: MetricStyle,
    pub observed_value_type: ValueType,
    pub timestamp: i64,
}

impl MetricData {
    fn reset(&mut self) {
        self.id = MetricId::default();
        self.labels.clear();
        self.value.clear();
        self.observed_value_type = ValueType::Unknown;
    }
}

/// A configured observation shape: identity, the property to read, and the
/// transformations applied to every observation (spec.md §4.6).
pub struct Metric {
    pub id: MetricId,
    pub property: String,
    pub metric_type: MetricType,
    pub unit: MetricUnit,
    pub timestamp_policy: MetricTimestamp,
    pub metric_style: MetricStyle,
    pub label_actions: Vec<LabelAction>,
    pub value_actions: Vec<ValueAction>,
    /// Derives the `location` label from the topic path, ahead of the main
    /// label action list (spec.md §4.6 step 4).
    pub property_actions: Vec<LabelAction>,
    property_labels: Labels,
    data: MetricData,
}

impl Metric {
    pub fn new(
        id: MetricId,
        property: String,
        metric_type: MetricType,
        unit: MetricUnit,
        timestamp_policy: MetricTimestamp,
        metric_style: MetricStyle,
        label_actions: Vec<LabelAction>,
        value_actions: Vec<ValueAction>,
        property_actions: Vec<LabelAction>,
    ) -> Self {
        Self {
            id,
            property,
            metric_type,
            unit,
            timestamp_policy,
            metric_style,
            label_actions,
            value_actions,
            property_actions,
            property_labels: Labels::new(),
            data: MetricData::default(),
        }
    }

    /// Runs the full per-observation pipeline (spec.md §4.6 steps 1-9) and
    /// pushes the resulting [`MetricData`] onto `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn event(
        &mut self,
        value: &str,
        topic: &str,
        topic_levels: &TopicLevels<'_>,
        timestamp: i64,
        observed_type: ValueType,
        out: &mut Vec<MetricData>,
    ) {
        self.data.reset();
        self.data.id = self.id.clone();
        self.data.metric_type = self.metric_type;
        self.data.unit = self.unit;
        self.data.timestamp_policy = self.timestamp_policy;
        self.data.metric_style = self.metric_style;
        self.data.value = value.to_owned();
        self.data.observed_value_type = observed_type.clone();
        self.data.timestamp = timestamp;

        self.property_labels.clear();
        self.property_labels.set("topic", topic);

        for action in &self.property_actions {
            let snapshot = self.property_labels.clone();
            action.apply(&snapshot, topic_levels, &mut self.property_labels);
        }

        self.data.id.location = self.property_labels.get("location").map(str::to_owned);

        self.data.labels.clear();
        if let Some(location) = &self.data.id.location {
            self.data.labels.set("location", location.clone());
        }
        self.data.labels.set("topic", topic);

        for action in &self.label_actions {
            let output = &mut self.data.labels;
            action.apply(&self.property_labels, topic_levels, output);
        }

        for action in &self.value_actions {
            action.apply(&mut self.data, &observed_type);
        }

        out.push(self.data.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(topic: &str) -> TopicLevels<'_> {
        TopicLevels::tokenize(topic)
    }

    #[test]
    fn event_populates_identity_and_default_labels() {
        let mut metric = Metric::new(
            MetricId {
                name: "temp_c".to_owned(),
                location: None,
            },
            "t".to_owned(),
            MetricType::Gauge,
            MetricUnit::Celsius,
            MetricTimestamp::On,
            MetricStyle::Prometheus,
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );

        let mut out = Vec::new();
        let topic_levels = levels("room/kitchen/env");
        metric.event("22", "room/kitchen/env", &topic_levels, 1_000, ValueType::Int64(22), &mut out);

        assert_eq!(out.len(), 1);
        let data = &out[0];
        assert_eq!(data.id.name, "temp_c");
        assert_eq!(data.value, "22");
        assert_eq!(data.labels.get("topic"), Some("room/kitchen/env"));
        assert_eq!(data.timestamp, 1_000);
    }

    #[test]
    fn property_actions_derive_the_location_label() {
        let property_actions = vec![LabelAction::Copy {
            src: "topic".to_owned(),
            dst: "location".to_owned(),
        }];

        let mut metric = Metric::new(
            MetricId {
                name: "m".to_owned(),
                location: None,
            },
            "p".to_owned(),
            MetricType::Gauge,
            MetricUnit::None,
            MetricTimestamp::Off,
            MetricStyle::Prometheus,
            Vec::new(),
            Vec::new(),
            property_actions,
        );

        let mut out = Vec::new();
        let topic_levels = levels("a/b");
        metric.event("1", "a/b", &topic_levels, 0, ValueType::Unknown, &mut out);

        assert_eq!(out[0].id.location.as_deref(), Some("a/b"));
        assert_eq!(out[0].labels.get("location"), Some("a/b"));
    }

    #[test]
    fn buffers_are_reset_between_events() {
        let mut metric = Metric::new(
            MetricId {
                name: "m".to_owned(),
                location: None,
            },
            "p".to_owned(),
            MetricType::Gauge,
            MetricUnit::None,
            MetricTimestamp::On,
            MetricStyle::Prometheus,
            vec![LabelAction::Copy {
                src: "extra".to_owned(),
                dst: "extra".to_owned(),
            }],
            Vec::new(),
            Vec::new(),
        );

        let mut out = Vec::new();
        let topic_levels = levels("a");

        // first event never had `extra` available via property_labels, so it
        // never appears; re-running confirms no stale state leaks forward.
        metric.event("1", "a", &topic_levels, 0, ValueType::Unknown, &mut out);
        metric.event("2", "a", &topic_levels, 1, ValueType::Unknown, &mut out);

        assert!(!out[0].labels.contains("extra"));
        assert!(!out[1].labels.contains("extra"));
    }
}
