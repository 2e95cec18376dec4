//! Independent access log for the scrape HTTP server (spec.md §4.12): one
//! line per request, on its own sink, deliberately kept outside the process's
//! single `foundations::telemetry::log` harness (see DESIGN.md).

use crate::settings::FileLoggingSettings;
use slog::Drain;
use std::fs::File;
use std::io;

/// Builds the access log drain from `settings`. An empty `filename` logs to
/// the terminal, matching `mqtt_bridge.logging`'s own convention.
pub fn build(settings: &FileLoggingSettings) -> io::Result<slog::Logger> {
    let level = parse_level(&settings.level);

    let logger = if settings.filename.is_empty() {
        let decorator = slog_term::TermDecorator::new().stdout().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog::o!())
    } else {
        let file = File::create(&settings.filename)?;
        let decorator = slog_term::PlainDecorator::new(file);
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog::LevelFilter::new(drain, level).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog::o!())
    };

    Ok(logger)
}

fn parse_level(level: &str) -> slog::Level {
    match level {
        "critical" => slog::Level::Critical,
        "error" => slog::Level::Error,
        "warning" | "warn" => slog::Level::Warning,
        "debug" => slog::Level::Debug,
        "trace" => slog::Level::Trace,
        _ => slog::Level::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_defaults_to_info() {
        assert_eq!(parse_level("nonsense"), slog::Level::Info);
    }

    #[test]
    fn terminal_sink_builds_without_a_filename() {
        let settings = FileLoggingSettings {
            filename: String::new(),
            level: "info".to_owned(),
        };
        assert!(build(&settings).is_ok());
    }
}
