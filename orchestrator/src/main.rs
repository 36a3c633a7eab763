// Orchestrator binary entry point

mod command;

use anyhow::{Context, Result};
use command::{parse_command, Command, MacroStatus, Response};
use common::bootstrap;
use common::config::Settings;
use common::executor::LogExecutor;
use common::orchestration::Orchestrator;
use common::scheduler::StartOutcome;
use common::telemetry;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    telemetry::init_logging(
        &settings.observability.log_level,
        settings.observability.json_logs,
    )?;
    if let Some(port) = settings.observability.metrics_port {
        telemetry::init_metrics(port)?;
    }

    info!("Starting macro orchestrator");

    let plugins = bootstrap::init_plugin_host(&settings);
    let orchestrator =
        bootstrap::init_orchestrator(&settings, Arc::new(LogExecutor::new()), plugins)?;

    let definitions =
        bootstrap::load_macro_definitions(Path::new(&settings.macros.directory)).await?;
    for definition in definitions {
        orchestrator.load_macro(Arc::new(definition.macro_def), &definition.functions);
    }

    let listener = orchestrator.spawn_listener();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Received Ctrl+C signal, initiating graceful shutdown");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    let response = handle_line(&orchestrator, &line).await;
                    match serde_json::to_string(&response) {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!(error = %e, "Failed to serialize response"),
                    }
                }
                Ok(None) => {
                    info!("Input closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    break;
                }
            }
        }
    }

    orchestrator.shutdown().await;
    if let Err(e) = listener.await {
        error!(error = %e, "Notification listener terminated abnormally");
    }

    info!("Macro orchestrator stopped");
    Ok(())
}

async fn handle_line(orchestrator: &Orchestrator, line: &str) -> Response {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Invalid command");
            return Response::error(format!("Invalid command: {}", e));
        }
    };

    let scheduler = orchestrator.scheduler();
    match command {
        Command::Event { event, data } => {
            let report = orchestrator.raise(event, &data);
            info!(
                event = %event,
                matched = report.matched,
                notified = report.notified,
                errors = report.errors.len(),
                "Event dispatched"
            );
            Response::ok(format!(
                "{}: {} matched, {} notified, {} error(s)",
                event,
                report.matched,
                report.notified,
                report.errors.len()
            ))
        }
        Command::Start { macro_id } => match orchestrator.start_macro(&macro_id).await {
            None => Response::error(format!("Unknown macro: {}", macro_id)),
            Some(Ok(StartOutcome::Started)) => Response::ok(format!("{} started", macro_id)),
            Some(Ok(StartOutcome::AlreadyActive(state))) => {
                Response::ok(format!("{} already {}", macro_id, state))
            }
            Some(Err(e)) => Response::error(e.to_string()),
        },
        Command::Pause { macro_id } => {
            transition_response(&macro_id, "paused", scheduler.pause_macro(&macro_id).await)
        }
        Command::Resume { macro_id } => {
            transition_response(&macro_id, "resumed", scheduler.resume_macro(&macro_id).await)
        }
        Command::Stop { macro_id } => {
            transition_response(&macro_id, "stopped", scheduler.stop_macro(&macro_id).await)
        }
        Command::Finished { macro_id } => {
            if scheduler.mark_finished(&macro_id) {
                Response::ok(format!("{} finished", macro_id))
            } else {
                Response::ok(format!("{} was not active", macro_id))
            }
        }
        Command::Status => Response::status(
            scheduler
                .get_macros()
                .into_iter()
                .map(|(id, state)| MacroStatus { id, state })
                .collect(),
        ),
    }
}

fn transition_response<E: std::fmt::Display>(
    macro_id: &str,
    verb: &str,
    result: std::result::Result<bool, E>,
) -> Response {
    match result {
        Ok(true) => Response::ok(format!("{} {}", macro_id, verb)),
        Ok(false) => Response::ok(format!("{} unchanged", macro_id)),
        Err(e) => Response::error(e.to_string()),
    }
}
