//! Global metric exposition style (spec.md §4.10, §9 "Global metric style").
//!
//! Fixed once at process start from `prometheus.metric_style` and never
//! reassigned afterward. Tests inject a style explicitly rather than relying
//! on process-wide state.

use std::fmt;

/// Which text-exposition dialect [`crate::render`] emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricStyle {
    /// Millisecond-resolution timestamps, no trailing `# EOF`.
    #[default]
    Prometheus,
    /// Microsecond-resolution timestamps, trailing `# EOF` marker.
    OpenMetric,
}

impl MetricStyle {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "prometheus" => Some(Self::Prometheus),
            "openmetric" => Some(Self::OpenMetric),
            _ => None,
        }
    }

    /// Converts a millisecond timestamp into this style's exposition
    /// resolution (Prometheus: milliseconds; OpenMetrics: microseconds).
    pub fn format_timestamp(&self, timestamp_ms: i64) -> i64 {
        match self {
            MetricStyle::Prometheus => timestamp_ms,
            MetricStyle::OpenMetric => timestamp_ms * 1_000,
        }
    }
}

impl fmt::Display for MetricStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricStyle::Prometheus => write!(f, "prometheus"),
            MetricStyle::OpenMetric => write!(f, "openmetric"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openmetric_style_uses_microsecond_timestamps() {
        assert_eq!(MetricStyle::Prometheus.format_timestamp(1_000), 1_000);
        assert_eq!(MetricStyle::OpenMetric.format_timestamp(1_000), 1_000_000);
    }

    #[test]
    fn parses_known_style_names_only() {
        assert_eq!(MetricStyle::from_config_str("prometheus"), Some(MetricStyle::Prometheus));
        assert_eq!(MetricStyle::from_config_str("openmetric"), Some(MetricStyle::OpenMetric));
        assert_eq!(MetricStyle::from_config_str("bogus"), None);
    }
}
