//! Scrape renderer (spec.md §4.10): turns the metric cache's stable iteration
//! order into Prometheus/OpenMetrics exposition text.

use crate::cache::MetricCache;
use crate::metric::{MetricType, MetricUnit};
use crate::style::MetricStyle;

/// Renders every cache entry as Prometheus/OpenMetrics text, per
/// `style` (spec.md §4.10 "Metric-style selection").
pub fn render(cache: &MetricCache, style: MetricStyle) -> String {
    let mut out = String::new();
    let mut header: Option<(String, MetricType, MetricUnit)> = None;

    for data in cache.ordered_entries() {
        let key = (data.id.name.clone(), data.metric_type, data.unit);

        if header.as_ref() != Some(&key) {
            write_header(&mut out, &data.id.name, data.metric_type, data.unit);
            header = Some(key);
        }

        write_sample(&mut out, data, style);
    }

    if style == MetricStyle::OpenMetric {
        out.push_str("# EOF\n");
    }

    out
}

fn write_header(out: &mut String, name: &str, metric_type: MetricType, unit: MetricUnit) {
    out.push_str(&format!("# HELP {name} {name}\n"));
    out.push_str(&format!("# TYPE {name} {}\n", metric_type.as_str()));

    if unit != MetricUnit::None {
        out.push_str(&format!("# UNIT {name} {}\n", unit.as_str()));
    }
}

fn write_sample(out: &mut String, data: &crate::metric::MetricData, style: MetricStyle) {
    out.push_str(&data.id.name);

    if !data.labels.is_empty() {
        out.push('{');

        for (i, (name, value)) in data.labels.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }

            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_label_value(value));
            out.push('"');
        }

        out.push('}');
    }

    out.push(' ');
    out.push_str(&data.value);

    if data.timestamp_policy == crate::metric::MetricTimestamp::On {
        out.push(' ');
        out.push_str(&style.format_timestamp(data.timestamp).to_string());
    }

    out.push('\n');
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Labels;
    use crate::metric::{MetricData, MetricId, MetricTimestamp};
    use crate::value_type::ValueType;

    fn sample(name: &str, value: &str, unit: MetricUnit, labels: &[(&str, &str)]) -> MetricData {
        let mut l = Labels::new();
        for (k, v) in labels {
            l.set(*k, *v);
        }

        MetricData {
            id: MetricId {
                name: name.to_owned(),
                location: None,
            },
            labels: l,
            value: value.to_owned(),
            metric_type: MetricType::Gauge,
            unit,
            timestamp_policy: MetricTimestamp::On,
            metric_style: MetricStyle::Prometheus,
            observed_value_type: ValueType::Unknown,
            timestamp: 1_000,
        }
    }

    #[test]
    fn renders_header_block_and_sample_line() {
        let mut cache = MetricCache::new();
        cache.add(vec![sample("temp_c", "22", MetricUnit::Celsius, &[("topic", "room/kitchen/env")])]);

        let body = render(&cache, MetricStyle::Prometheus);
        assert!(body.contains("# HELP temp_c temp_c\n"));
        assert!(body.contains("# TYPE temp_c gauge\n"));
        assert!(body.contains("# UNIT temp_c celsius\n"));
        assert!(body.contains(r#"temp_c{topic="room/kitchen/env"} 22 1000"#));
    }

    #[test]
    fn suppresses_unit_line_when_unit_is_none() {
        let mut cache = MetricCache::new();
        cache.add(vec![sample("m", "1", MetricUnit::None, &[])]);
        let body = render(&cache, MetricStyle::Prometheus);
        assert!(!body.contains("# UNIT"));
    }

    #[test]
    fn openmetric_style_uses_microsecond_timestamps_and_trailing_eof() {
        let mut cache = MetricCache::new();
        cache.add(vec![sample("m", "1", MetricUnit::None, &[])]);
        let body = render(&cache, MetricStyle::OpenMetric);
        assert!(body.contains(" 1000000\n"));
        assert!(body.trim_end().ends_with("# EOF"));
    }

    #[test]
    fn escapes_backslash_quote_and_newline_in_label_values() {
        let mut cache = MetricCache::new();
        cache.add(vec![sample("m", "1", MetricUnit::None, &[("l", "a\\b\"c\nd")])]);
        let body = render(&cache, MetricStyle::Prometheus);
        assert!(body.contains(r#"l="a\\b\"c\nd""#));
    }

    #[test]
    fn shares_one_header_block_across_consecutive_same_identity_samples() {
        let mut cache = MetricCache::new();
        cache.add(vec![
            sample("m", "1", MetricUnit::None, &[("a", "1")]),
            sample("m", "2", MetricUnit::None, &[("a", "2")]),
        ]);

        let body = render(&cache, MetricStyle::Prometheus);
        assert_eq!(body.matches("# HELP m").count(), 1);
    }
}
