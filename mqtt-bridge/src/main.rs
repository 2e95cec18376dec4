//! Bootstrap: CLI parsing, configuration loading, and wiring the MQTT
//! adapter (C11), dispatch loop (C9), and scrape server (C12) together under
//! a single Tokio runtime (spec.md §5, §6).

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use foundations::telemetry::log;
use foundations::telemetry::settings::{LogOutput, LogVerbosity, LoggingSettings, TelemetrySettings};
use foundations::telemetry::{self, TelemetryConfig};
use mqtt_bridge::config::{self, CompiledConfig};
use mqtt_bridge::dispatch::Dispatcher;
use mqtt_bridge::error::BridgeError;
use mqtt_bridge::settings::{AppSettings, FileLoggingSettings};
use mqtt_bridge::{access_log, mqtt, server};
use std::process::ExitCode;

const DEFAULT_CONF_PATH: &str = "mqtt_bridge.yaml";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BridgeError> {
    let service_info = foundations::service_info!();
    let matches = parse_cli(&service_info)?;

    let conf_path = matches.get_one::<String>("conf").cloned().unwrap_or_else(|| DEFAULT_CONF_PATH.to_owned());
    let log_override = matches.get_one::<String>("log").cloned();
    let no_run = matches.get_flag("no-run");

    let mut settings: AppSettings = foundations::settings::from_file(&conf_path).map_err(BridgeError::Settings)?;

    if let Some(path) = log_override {
        settings.mqtt_bridge.logging.filename = path;
    }

    let compiled = config::compile(&settings)?;

    if no_run {
        return Ok(());
    }

    telemetry::init(TelemetryConfig {
        service_info: &service_info,
        settings: &TelemetrySettings {
            logging: to_logging_settings(&settings.mqtt_bridge.logging),
        },
    })
    .map_err(BridgeError::Settings)?;

    log::info!("mqtt-bridge starting"; "conf" => conf_path, "mqtt_host" => compiled.mqtt_host.clone(), "mqtt_port" => compiled.mqtt_port);

    // `level: off` is how a document opts out of the access log entirely,
    // matching the main bridge log's own off-means-silent convention.
    let access_log = if settings.prometheus.access_log.level == "off" {
        None
    } else {
        Some(access_log::build(&settings.prometheus.access_log)?)
    };

    run_bridge(compiled, access_log).await
}

async fn run_bridge(compiled: CompiledConfig, access_log: Option<slog::Logger>) -> Result<(), BridgeError> {
    let CompiledConfig {
        automaton,
        cache,
        style,
        exporter_port,
        exporter_uri,
        mqtt_host,
        mqtt_port,
        subscriptions,
    } = compiled;

    let (mqtt_client, mut messages) = mqtt::spawn(mqtt_host, mqtt_port, subscriptions);

    let mut dispatcher = Dispatcher::new(automaton, cache.clone());
    let dispatch_task = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            dispatcher.dispatch(&message.topic, &message.payload, message.timestamp_ms);
        }
    });

    let server_task = tokio::spawn(server::serve(exporter_port, exporter_uri, cache, style, access_log));

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => log::info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => log::info!("received SIGTERM, shutting down"),
        r = dispatch_task => {
            r.map_err(|e| BridgeError::Settings(e.into()))?;
            return Ok(());
        }
        r = server_task => {
            r.map_err(|e| BridgeError::Settings(e.into()))??;
            return Ok(());
        }
    }

    // Send a proper MQTT DISCONNECT instead of just dropping the socket.
    if let Err(e) = mqtt_client.disconnect().await {
        log::debug!("MQTT disconnect failed"; "error" => e.to_string());
    }

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        () = tokio::time::sleep(std::time::Duration::from_secs(5)) => {}
    }

    // A second signal (or the grace period elapsing) is a forced exit: skip
    // waiting any further on in-flight scrape responses (spec.md §4.14).
    std::process::exit(0);
}

fn parse_cli(service_info: &foundations::ServiceInfo) -> Result<ArgMatches, BridgeError> {
    let cmd = Command::new(service_info.name)
        .version(service_info.version)
        .author(service_info.author)
        .about(service_info.description)
        .arg(
            Arg::new("conf")
                .short('f')
                .long("conf")
                .action(ArgAction::Set)
                .help("Config file path"),
        )
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .action(ArgAction::Set)
                .help("Override the configured log file path"),
        )
        .arg(
            Arg::new("no-run")
                .short('n')
                .long("no-run")
                .action(ArgAction::SetTrue)
                .help("Validate configuration and exit"),
        );

    match cmd.try_get_matches_from(std::env::args_os()) {
        Ok(matches) => Ok(matches),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => Err(BridgeError::Settings(anyhow::anyhow!(e))),
    }
}

/// Translates the bridge's `filename`/`level` pair into `foundations`'
/// `LoggingSettings`. `level: off` has no direct `LogVerbosity` counterpart
/// (the enum's strictest variant, `Critical`, still emits critical-level
/// records); it is approximated by `Critical`, the closest available
/// verbosity (see DESIGN.md).
fn to_logging_settings(cfg: &FileLoggingSettings) -> LoggingSettings {
    let mut settings = LoggingSettings::default();
    settings.output = if cfg.filename.is_empty() {
        LogOutput::Terminal
    } else {
        LogOutput::File(cfg.filename.clone().into())
    };
    settings.verbosity = parse_verbosity(&cfg.level);
    settings
}

fn parse_verbosity(level: &str) -> LogVerbosity {
    match level {
        "off" | "critical" => LogVerbosity::Critical,
        "error" => LogVerbosity::Error,
        "warning" | "warn" => LogVerbosity::Warning,
        "debug" => LogVerbosity::Debug,
        "trace" => LogVerbosity::Trace,
        _ => LogVerbosity::Info,
    }
}
