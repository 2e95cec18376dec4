//! The tagged value produced while walking JSON (spec.md §4.5) and carried
//! through label/value actions and into metric storage.

/// A single scalar value extracted from MQTT payload text or JSON, tagged
/// with its source type.
///
/// String variants own their data; numeric/bool variants are copied inline.
/// `Metric` storage and rendering only ever need the string form, produced by
/// [`ValueType::as_str_value`] / [`ValueType::into_string`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValueType {
    /// No type information observed yet (e.g. a `Value` handler, which never
    /// parses the payload — spec.md §4.7).
    #[default]
    Unknown,
    Str(String),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Bool(bool),
}

impl ValueType {
    /// Renders the value as it should appear as a label value or a sample
    /// value in exposition text.
    pub fn render(&self) -> String {
        match self {
            ValueType::Unknown => String::new(),
            ValueType::Str(s) => s.clone(),
            ValueType::Int64(v) => v.to_string(),
            ValueType::UInt64(v) => v.to_string(),
            ValueType::Double(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    format!("{v:.0}")
                } else {
                    v.to_string()
                }
            }
            ValueType::Bool(v) => v.to_string(),
        }
    }

    /// Parses this value as an `f64`, as required to store it as a sample.
    ///
    /// `Str` attempts a numeric parse (metric payloads are frequently plain
    /// numeric text); a non-numeric string has no sensible sample value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ValueType::Unknown => None,
            ValueType::Str(s) => s.trim().parse::<f64>().ok(),
            ValueType::Int64(v) => Some(*v as f64),
            ValueType::UInt64(v) => Some(*v as f64),
            ValueType::Double(v) => Some(*v),
            ValueType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        }
    }

    pub fn is_str(&self) -> bool {
        matches!(self, ValueType::Str(_))
    }
}

impl From<&str> for ValueType {
    fn from(s: &str) -> Self {
        ValueType::Str(s.to_owned())
    }
}

impl From<String> for ValueType {
    fn from(s: String) -> Self {
        ValueType::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_whole_doubles_without_a_decimal_point() {
        assert_eq!(ValueType::Double(42.0).render(), "42");
        assert_eq!(ValueType::Double(42.5).render(), "42.5");
    }

    #[test]
    fn numeric_strings_parse_as_f64() {
        assert_eq!(ValueType::Str(" 3.5 ".to_owned()).as_f64(), Some(3.5));
        assert_eq!(ValueType::Str("on".to_owned()).as_f64(), None);
    }

    #[test]
    fn bool_as_f64_is_zero_or_one() {
        assert_eq!(ValueType::Bool(true).as_f64(), Some(1.0));
        assert_eq!(ValueType::Bool(false).as_f64(), Some(0.0));
    }
}
