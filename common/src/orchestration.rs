// Orchestrator wiring
// Owns the registry, the scheduler and the loaded macros for the lifetime of the engine

use crate::config::Settings;
use crate::dependency::{build_http_client, DependencyResolver};
use crate::errors::{DependencyError, SchedulerError};
use crate::executor::MacroExecutor;
use crate::models::{EventData, Macro, TriggerEvent};
use crate::plugin::PluginHost;
use crate::scheduler::{MacroScheduler, SchedulerConfig, StartOutcome};
use crate::trigger::{
    BroadcastSink, DispatchReport, FunctionExecutionRequest, TriggerNotification, TriggerRegistry,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type LoadedMacros = RwLock<HashMap<String, Arc<Macro>>>;

pub struct Orchestrator {
    registry: Arc<TriggerRegistry>,
    scheduler: Arc<MacroScheduler>,
    sink: BroadcastSink,
    macros: Arc<LoadedMacros>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Build the engine from settings and the two external collaborators
    pub fn new(
        settings: &Settings,
        executor: Arc<dyn MacroExecutor>,
        plugins: Arc<dyn PluginHost>,
    ) -> Result<Self, DependencyError> {
        let client = build_http_client(
            settings.dependencies.http_timeout_seconds,
            &settings.dependencies.user_agent,
        )?;
        let resolver = Arc::new(DependencyResolver::new(client, Arc::clone(&plugins)));
        let scheduler = Arc::new(MacroScheduler::new(
            SchedulerConfig {
                dependency_timeout: Duration::from_secs(settings.scheduler.dependency_timeout_seconds),
            },
            resolver,
            plugins,
            executor,
        ));
        let sink = BroadcastSink::new(settings.triggers.notification_capacity);
        let registry = Arc::new(TriggerRegistry::new(Arc::new(sink.clone())));

        Ok(Self::from_parts(registry, scheduler, sink))
    }

    /// The registry must publish into `sink` for the listener to see its notifications
    pub fn from_parts(
        registry: Arc<TriggerRegistry>,
        scheduler: Arc<MacroScheduler>,
        sink: BroadcastSink,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registry,
            scheduler,
            sink,
            macros: Arc::new(RwLock::new(HashMap::new())),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Arc<TriggerRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<MacroScheduler> {
        &self.scheduler
    }

    pub fn sink(&self) -> &BroadcastSink {
        &self.sink
    }

    /// Track a macro and register its metadata triggers and the named functions.
    ///
    /// Loading an id that is already loaded replaces its registrations.
    /// Returns the number of registrations added.
    pub fn load_macro(&self, macro_ref: Arc<Macro>, function_names: &[String]) -> usize {
        let replaced = self.registry.unregister_all_triggers(&macro_ref.id);
        if replaced > 0 {
            debug!(
                macro_id = %macro_ref.id,
                replaced = replaced,
                "Replacing registrations of reloaded macro"
            );
        }

        let mut added = self.registry.register_macro(&macro_ref);
        for function in function_names {
            if self.registry.register_function_trigger(&macro_ref, function) {
                added += 1;
            }
        }

        info!(
            macro_id = %macro_ref.id,
            macro_name = %macro_ref.name,
            registrations = added,
            "Macro loaded"
        );
        self.macros
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(macro_ref.id.clone(), macro_ref);
        added
    }

    /// Drop a macro's registrations and stop it if it is running
    pub async fn unload_macro(&self, macro_id: &str) -> Result<bool, SchedulerError> {
        let known = self
            .macros
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(macro_id)
            .is_some();
        self.registry.unregister_all_triggers(macro_id);
        self.scheduler.stop_macro(macro_id).await?;
        Ok(known)
    }

    pub fn get_macro(&self, macro_id: &str) -> Option<Arc<Macro>> {
        loaded_macro(&self.macros, macro_id)
    }

    /// Loaded macro ids, sorted
    pub fn macro_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .macros
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Manual start of a loaded macro, bypassing the registry.
    ///
    /// Returns None when no macro with that id is loaded.
    pub async fn start_macro(
        &self,
        macro_id: &str,
    ) -> Option<Result<StartOutcome, SchedulerError>> {
        let macro_ref = self.get_macro(macro_id)?;
        Some(self.scheduler.start_macro(macro_ref).await)
    }

    pub fn raise(&self, event: TriggerEvent, data: &EventData) -> DispatchReport {
        self.registry.raise_trigger_event(event, data)
    }

    /// Feed registry notifications into the scheduler until shutdown.
    ///
    /// Subscriptions are taken before returning, so events raised after this
    /// call are never missed. Each notification is handled on its own task.
    pub fn spawn_listener(&self) -> JoinHandle<()> {
        let mut triggers = self.sink.subscribe_triggers();
        let mut functions = self.sink.subscribe_function_requests();
        let mut shutdown = self.shutdown_tx.subscribe();
        let scheduler = Arc::clone(&self.scheduler);
        let macros = Arc::clone(&self.macros);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        debug!("Notification listener shutting down");
                        break;
                    }
                    received = triggers.recv() => match received {
                        Ok(notification) => {
                            let scheduler = Arc::clone(&scheduler);
                            let macros = Arc::clone(&macros);
                            tokio::spawn(async move {
                                dispatch_trigger(&scheduler, &macros, notification).await;
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Trigger listener lagged, notifications dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    received = functions.recv() => match received {
                        Ok(request) => {
                            let scheduler = Arc::clone(&scheduler);
                            let macros = Arc::clone(&macros);
                            tokio::spawn(async move {
                                dispatch_function(&scheduler, &macros, request).await;
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped = skipped, "Function listener lagged, requests dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    /// Stop every macro and drop all registrations and state
    pub async fn shutdown(&self) {
        let stopped = self.scheduler.stop_all().await;
        self.registry.clear();
        self.scheduler.clear();
        self.macros
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        // No listener is not an error
        let _ = self.shutdown_tx.send(());
        info!(stopped = stopped, "Orchestrator shut down");
    }
}

fn loaded_macro(macros: &LoadedMacros, macro_id: &str) -> Option<Arc<Macro>> {
    macros
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(macro_id)
        .cloned()
}

/// Start or resume the currently loaded definition of a triggered macro.
///
/// Notifications for unloaded macros are dropped, and a run that started
/// while its macro was being unloaded is stopped again.
async fn dispatch_trigger(
    scheduler: &MacroScheduler,
    macros: &LoadedMacros,
    notification: TriggerNotification,
) {
    let macro_id = notification.macro_ref.id.as_str();
    let Some(current) = loaded_macro(macros, macro_id) else {
        debug!(
            macro_id = %macro_id,
            event = %notification.event,
            "Trigger for unloaded macro dropped"
        );
        return;
    };

    match scheduler.handle_trigger(current, notification.event).await {
        Ok(true) if loaded_macro(macros, macro_id).is_none() => {
            info!(macro_id = %macro_id, "Macro unloaded while starting, stopping it");
            if let Err(e) = scheduler.stop_macro(macro_id).await {
                warn!(macro_id = %macro_id, error = %e, "Failed to stop unloaded macro");
            }
        }
        Ok(_) => {}
        Err(e) => {
            warn!(
                macro_id = %macro_id,
                event = %notification.event,
                error = %e,
                "Triggered macro could not be started"
            );
        }
    }
}

async fn dispatch_function(
    scheduler: &MacroScheduler,
    macros: &LoadedMacros,
    request: FunctionExecutionRequest,
) {
    if loaded_macro(macros, &request.macro_id).is_none() {
        debug!(
            macro_id = %request.macro_id,
            function = %request.function_name,
            "Function request for unloaded macro dropped"
        );
        return;
    }

    if let Err(e) = scheduler
        .request_function(
            &request.macro_id,
            &request.function_name,
            request.event,
            request.data,
        )
        .await
    {
        warn!(
            macro_id = %request.macro_id,
            function = %request.function_name,
            error = %e,
            "Function execution request failed"
        );
    }
}
