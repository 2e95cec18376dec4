//! Error types for configuration loading and top-level bootstrap.
//!
//! Hot-path errors (malformed JSON, label lookup misses) never reach these
//! types — they are handled inline per spec and never cross a component
//! boundary as a `Result::Err`.

use thiserror::Error;

/// Errors raised while compiling YAML configuration into runtime structures.
///
/// Only [`ConfigError::MissingSection`] is treated as fatal by the loader;
/// every other variant is logged at `warn` and the offending entry is
/// dropped (see spec.md §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required top-level section `{section}` is missing from the configuration")]
    MissingSection { section: &'static str },

    #[error("invalid topic filter `{filter}`: {reason}")]
    InvalidTopicFilter {
        filter: String,
        reason: &'static str,
    },

    #[error("duplicate handler id `{id}`")]
    DuplicateHandlerId { id: String },

    #[error("handler `{handler_id}` references unknown metric property `{property}`")]
    UnknownProperty {
        handler_id: String,
        property: String,
    },

    #[error("metric `{metric}` is missing a `property` and was skipped")]
    MetricMissingProperty { metric: String },

    #[error("topic binding references unknown handler id `{id}`")]
    UnknownHandlerId { id: String },

    #[error("unknown label action `{action}`, defaulting to `keep`")]
    UnknownLabelAction { action: String },

    #[error("unknown value action `{action}`, defaulting to `keep`")]
    UnknownValueAction { action: String },

    #[error("unknown metric type `{ty}`")]
    UnknownMetricType { ty: String },

    #[error("unknown metric unit `{unit}`")]
    UnknownMetricUnit { unit: String },

    #[error("invalid JSON pointer `{pointer}`: {reason}")]
    InvalidJsonPointer {
        pointer: String,
        reason: &'static str,
    },

    #[error("invalid replacement format `{format}`: {reason}")]
    InvalidReplacementFormat {
        format: String,
        reason: &'static str,
    },
}

/// Top-level bootstrap error, surfaced from `main` as a non-zero exit.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to load settings: {0}")]
    Settings(#[from] anyhow::Error),
}
