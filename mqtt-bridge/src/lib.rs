//! Bridges MQTT telemetry into a Prometheus/OpenMetrics scrape endpoint.
//!
//! See spec.md §4 for the pipeline this crate implements: an MQTT payload
//! flows through a topic automaton (§4.1) to one or more handlers (§4.7),
//! which turn it into metric observations (§4.6) written to a cache (§4.8)
//! that the scrape server (§4.12) renders on demand (§4.10).

pub mod access_log;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod json;
pub mod label_actions;
pub mod labels;
pub mod metric;
pub mod mqtt;
pub mod render;
pub mod replace_format;
pub mod server;
pub mod settings;
pub mod style;
pub mod topic;
pub mod topic_automaton;
pub mod value_actions;
pub mod value_type;
