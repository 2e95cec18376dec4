//! Value actions (spec.md §4.4): transformations over an observation's
//! rendered value string, applied in configured order after label actions.

use crate::metric::MetricData;
use crate::value_type::ValueType;
use indexmap::IndexMap;

/// One value transformation.
///
/// `Keep` (identity) is never stored — configuration collapses it away, since
/// an explicit no-op action has no observable effect (spec.md §4.4).
pub enum ValueAction {
    /// If `mapping[metric_data.value]` exists, replace `metric_data.value`
    /// with the mapped string; otherwise replace it with `default`.
    Switch {
        default: String,
        mapping: IndexMap<String, String>,
    },
}

impl ValueAction {
    pub fn apply(&self, metric_data: &mut MetricData, _observed_value_type: &ValueType) {
        match self {
            ValueAction::Switch { default, mapping } => {
                metric_data.value = mapping
                    .get(&metric_data.value)
                    .cloned()
                    .unwrap_or_else(|| default.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricData;

    fn switch(default: &str, pairs: &[(&str, &str)]) -> ValueAction {
        ValueAction::Switch {
            default: default.to_owned(),
            mapping: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn switch_maps_known_values_and_falls_back_to_default() {
        let action = switch("-1", &[("on", "1"), ("off", "0")]);

        for (input, expected) in [("on", "1"), ("off", "0"), ("maybe", "-1")] {
            let mut data = MetricData::default();
            data.value = input.to_owned();
            action.apply(&mut data, &ValueType::Str(input.to_owned()));
            assert_eq!(data.value, expected);
        }
    }

    #[test]
    fn later_actions_see_earlier_outputs() {
        let first = switch("unset", &[("raw", "mid")]);
        let second = switch("unset", &[("mid", "final")]);

        let mut data = MetricData::default();
        data.value = "raw".to_owned();
        first.apply(&mut data, &ValueType::Str("raw".to_owned()));
        second.apply(&mut data, &ValueType::Str("raw".to_owned()));

        assert_eq!(data.value, "final");
    }
}
