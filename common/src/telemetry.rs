// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::models::{DependencyDescriptor, MacroState, TriggerEvent};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over `log_level`. With `json` set, log lines
/// are emitted as JSON objects carrying span context; otherwise the
/// human-readable formatter is used.
pub fn init_logging(log_level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let registry = tracing_subscriber::registry();

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(env_filter);
        registry
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        let human_layer = fmt::layer().with_target(false).with_filter(env_filter);
        registry
            .with(human_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(log_level = log_level, json = json, "Structured logging initialized");

    Ok(())
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - trigger_notifications_total: notifications emitted by the trigger registry
/// - trigger_dispatch_errors_total: registrations that failed during dispatch
/// - macro_transitions_total: scheduler state transitions
/// - dependency_validation_failures_total: failed dependency validations
/// - macros_running: macros currently in the running state
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "trigger_notifications_total",
        "Total number of notifications emitted by the trigger registry"
    );
    describe_counter!(
        "trigger_dispatch_errors_total",
        "Total number of trigger registrations that failed during dispatch"
    );
    describe_counter!(
        "macro_transitions_total",
        "Total number of macro state transitions"
    );
    describe_counter!(
        "dependency_validation_failures_total",
        "Total number of failed dependency validations"
    );
    describe_gauge!("macros_running", "Current number of running macros");

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Notification kind label: a whole macro or one of its functions
#[derive(Debug, Clone, Copy)]
pub enum NotificationKind {
    Macro,
    Function,
}

impl NotificationKind {
    fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Macro => "macro",
            NotificationKind::Function => "function",
        }
    }
}

#[inline]
pub fn record_trigger_notification(event: TriggerEvent, kind: NotificationKind) {
    counter!(
        "trigger_notifications_total",
        "event" => event.as_str(),
        "kind" => kind.as_str()
    )
    .increment(1);
}

#[inline]
pub fn record_dispatch_error(event: TriggerEvent) {
    counter!("trigger_dispatch_errors_total", "event" => event.as_str()).increment(1);
}

#[inline]
pub fn record_transition(to: MacroState) {
    counter!("macro_transitions_total", "to" => to.to_string()).increment(1);
}

#[inline]
pub fn record_dependency_failure(descriptor: &DependencyDescriptor) {
    let dependency_type = match descriptor {
        DependencyDescriptor::Remote { .. } => "remote",
        DependencyDescriptor::Plugin { .. } => "plugin",
        DependencyDescriptor::Local { .. } => "local",
    };
    counter!("dependency_validation_failures_total", "type" => dependency_type).increment(1);
}

#[inline]
pub fn update_running_macros(count: usize) {
    gauge!("macros_running").set(count as f64);
}
