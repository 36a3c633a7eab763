// Macro scheduler engine
// Owns the per-macro state machine and gates starts on plugin and dependency checks

use crate::dependency::DependencyResolver;
use crate::errors::SchedulerError;
use crate::executor::MacroExecutor;
use crate::models::{EventData, Macro, MacroState, TriggerEvent};
use crate::plugin::PluginHost;
use crate::telemetry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on dependency validation for one start request
    pub dependency_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dependency_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a start request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// The macro already had a live instance, nothing was started
    AlreadyActive(MacroState),
}

/// Main scheduler engine implementation.
///
/// Locks are held only for map reads and writes, never across an await.
pub struct MacroScheduler {
    config: SchedulerConfig,
    states: RwLock<HashMap<String, MacroState>>,
    starting: Mutex<HashSet<String>>,
    plugin_holds: Mutex<PluginHolds>,
    resolver: Arc<DependencyResolver>,
    plugins: Arc<dyn PluginHost>,
    executor: Arc<dyn MacroExecutor>,
}

/// Plugins disabled on behalf of macro runs.
///
/// A plugin shared by several runs is enabled again only when its last holder releases it.
#[derive(Debug, Default)]
struct PluginHolds {
    by_macro: HashMap<String, Vec<String>>,
    holders: HashMap<String, usize>,
}

/// Marks a macro id as starting; an uncommitted drop undoes plugin changes
struct StartGuard<'a> {
    scheduler: &'a MacroScheduler,
    macro_id: String,
    committed: bool,
}

impl<'a> StartGuard<'a> {
    fn acquire(scheduler: &'a MacroScheduler, macro_id: &str) -> Option<Self> {
        let mut starting = scheduler
            .starting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !starting.insert(macro_id.to_string()) {
            return None;
        }
        Some(Self {
            scheduler,
            macro_id: macro_id.to_string(),
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.scheduler.restore_plugins(&self.macro_id);
        }
        let mut starting = self
            .scheduler
            .starting
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        starting.remove(&self.macro_id);
    }
}

impl MacroScheduler {
    /// Create a new scheduler
    pub fn new(
        config: SchedulerConfig,
        resolver: Arc<DependencyResolver>,
        plugins: Arc<dyn PluginHost>,
        executor: Arc<dyn MacroExecutor>,
    ) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
            starting: Mutex::new(HashSet::new()),
            plugin_holds: Mutex::new(PluginHolds::default()),
            resolver,
            plugins,
            executor,
        }
    }

    /// Start a macro.
    ///
    /// A running or paused macro is left alone. On any failure, including the
    /// future being dropped mid-way, the previous state is kept and plugins
    /// disabled for the run are enabled again.
    #[instrument(skip(self, macro_ref), fields(macro_id = %macro_ref.id, macro_name = %macro_ref.name))]
    pub async fn start_macro(&self, macro_ref: Arc<Macro>) -> Result<StartOutcome, SchedulerError> {
        let macro_id = macro_ref.id.clone();

        let current = self.get_macro_state(&macro_id);
        if current.is_active() {
            debug!(state = %current, "Macro already active, start ignored");
            return Ok(StartOutcome::AlreadyActive(current));
        }

        let guard = StartGuard::acquire(self, &macro_id)
            .ok_or_else(|| SchedulerError::StartInProgress(macro_id.clone()))?;

        // Another start may have finished between the first check and the guard
        let current = self.get_macro_state(&macro_id);
        if current.is_active() {
            return Ok(StartOutcome::AlreadyActive(current));
        }

        self.check_required_plugins(&macro_ref)?;
        self.check_dependencies(&macro_ref).await?;

        self.disable_plugins(&macro_ref);

        if let Err(e) = self.executor.start(Arc::clone(&macro_ref)).await {
            error!(error = %e, "Executor refused to start macro");
            return Err(e.into());
        }

        let previous = self.set_state(&macro_id, MacroState::Running);
        guard.commit();

        info!(previous = %previous, "Macro started");
        Ok(StartOutcome::Started)
    }

    fn check_required_plugins(&self, macro_ref: &Macro) -> Result<(), SchedulerError> {
        for plugin in &macro_ref.metadata.plugin_dependencies {
            if !self.plugins.is_loaded(plugin) {
                warn!(plugin = %plugin, "Required plugin not loaded");
                return Err(SchedulerError::PluginNotLoaded {
                    macro_name: macro_ref.name.clone(),
                    plugin: plugin.clone(),
                });
            }
        }
        Ok(())
    }

    async fn check_dependencies(&self, macro_ref: &Macro) -> Result<(), SchedulerError> {
        let dependencies = &macro_ref.metadata.dependencies;
        if dependencies.is_empty() {
            return Ok(());
        }

        match timeout(
            self.config.dependency_timeout,
            self.resolver.validate_all(dependencies),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(SchedulerError::DependencyFailed {
                macro_name: macro_ref.name.clone(),
                dependency: failure.name,
                reason: failure.reason,
            }),
            Err(_) => {
                warn!(
                    timeout_ms = self.config.dependency_timeout.as_millis() as u64,
                    "Dependency validation timed out"
                );
                Err(SchedulerError::DependencyTimeout {
                    macro_name: macro_ref.name.clone(),
                    timeout: self.config.dependency_timeout,
                })
            }
        }
    }

    fn disable_plugins(&self, macro_ref: &Macro) {
        let to_disable = &macro_ref.metadata.plugins_to_disable;
        if to_disable.is_empty() {
            return;
        }

        let mut holds = self
            .plugin_holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut held = Vec::with_capacity(to_disable.len());
        for plugin in to_disable {
            let count = holds.holders.get(plugin).copied().unwrap_or(0);
            if count == 0 && !self.plugins.set_enabled(plugin, false) {
                continue;
            }
            holds.holders.insert(plugin.clone(), count + 1);
            held.push(plugin.clone());
        }
        debug!(plugins = ?held, "Plugins disabled for macro run");
        holds
            .by_macro
            .entry(macro_ref.id.clone())
            .or_default()
            .extend(held);
    }

    fn restore_plugins(&self, macro_id: &str) {
        let mut holds = self
            .plugin_holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(held) = holds.by_macro.remove(macro_id) else {
            return;
        };
        for plugin in held {
            let remaining = match holds.holders.get_mut(&plugin) {
                Some(count) => {
                    *count = count.saturating_sub(1);
                    *count
                }
                None => 0,
            };
            if remaining > 0 {
                debug!(
                    macro_id = macro_id,
                    plugin = %plugin,
                    holders = remaining,
                    "Plugin still held by another macro"
                );
                continue;
            }
            holds.holders.remove(&plugin);
            if !self.plugins.set_enabled(&plugin, true) {
                warn!(macro_id = macro_id, plugin = %plugin, "Failed to re-enable plugin");
            }
        }
    }

    /// Write a new state, returning the previous one
    fn set_state(&self, macro_id: &str, to: MacroState) -> MacroState {
        let (previous, running) = {
            let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
            let previous = states.insert(macro_id.to_string(), to).unwrap_or_default();
            let running = states.values().filter(|s| **s == MacroState::Running).count();
            (previous, running)
        };
        telemetry::record_transition(to);
        telemetry::update_running_macros(running);
        previous
    }

    /// Move from `from` to `to` only when the current state is `from`
    fn transition(&self, macro_id: &str, from: MacroState, to: MacroState) -> bool {
        let running = {
            let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
            match states.get_mut(macro_id) {
                Some(state) if *state == from => *state = to,
                _ => return false,
            }
            states.values().filter(|s| **s == MacroState::Running).count()
        };
        telemetry::record_transition(to);
        telemetry::update_running_macros(running);
        true
    }

    /// Stop if active, returning the state the macro was in
    fn transition_to_stopped(&self, macro_id: &str) -> Option<MacroState> {
        let (previous, running) = {
            let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
            let state = states.get_mut(macro_id)?;
            if !state.is_active() {
                return None;
            }
            let previous = *state;
            *state = MacroState::Stopped;
            let running = states.values().filter(|s| **s == MacroState::Running).count();
            (previous, running)
        };
        telemetry::record_transition(MacroState::Stopped);
        telemetry::update_running_macros(running);
        Some(previous)
    }

    /// Pause a running macro; anything else is a no-op
    #[instrument(skip(self))]
    pub async fn pause_macro(&self, macro_id: &str) -> Result<bool, SchedulerError> {
        if !self.transition(macro_id, MacroState::Running, MacroState::Paused) {
            debug!("Pause ignored, macro not running");
            return Ok(false);
        }

        if let Err(e) = self.executor.pause(macro_id).await {
            error!(error = %e, "Executor failed to pause macro");
            self.transition(macro_id, MacroState::Paused, MacroState::Running);
            return Err(e.into());
        }

        info!("Macro paused");
        Ok(true)
    }

    /// Resume a paused macro; anything else is a no-op
    #[instrument(skip(self))]
    pub async fn resume_macro(&self, macro_id: &str) -> Result<bool, SchedulerError> {
        if !self.transition(macro_id, MacroState::Paused, MacroState::Running) {
            debug!("Resume ignored, macro not paused");
            return Ok(false);
        }

        if let Err(e) = self.executor.resume(macro_id).await {
            error!(error = %e, "Executor failed to resume macro");
            self.transition(macro_id, MacroState::Running, MacroState::Paused);
            return Err(e.into());
        }

        info!("Macro resumed");
        Ok(true)
    }

    /// Stop a running or paused macro.
    ///
    /// The macro ends up stopped even when the executor reports an error.
    #[instrument(skip(self))]
    pub async fn stop_macro(&self, macro_id: &str) -> Result<bool, SchedulerError> {
        let Some(previous) = self.transition_to_stopped(macro_id) else {
            debug!("Stop ignored, macro not active");
            return Ok(false);
        };

        self.restore_plugins(macro_id);

        if let Err(e) = self.executor.stop(macro_id).await {
            error!(error = %e, "Executor failed to stop macro");
            return Err(e.into());
        }

        info!(previous = %previous, "Macro stopped");
        Ok(true)
    }

    /// Stop every active macro, returning how many were stopped
    pub async fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for macro_id in self.active_macros() {
            match self.stop_macro(&macro_id).await {
                Ok(true) => stopped += 1,
                Ok(false) => {}
                Err(e) => {
                    // Still counted: the state is Stopped regardless
                    warn!(macro_id = %macro_id, error = %e, "Error while stopping macro");
                    stopped += 1;
                }
            }
        }
        stopped
    }

    /// The executor finished a run on its own
    pub fn mark_finished(&self, macro_id: &str) -> bool {
        if self.transition_to_stopped(macro_id).is_none() {
            return false;
        }
        self.restore_plugins(macro_id);
        info!(macro_id = macro_id, "Macro finished");
        true
    }

    /// Forward a function-level trigger to the executor.
    ///
    /// Refused while the macro is paused.
    #[instrument(skip(self, data))]
    pub async fn request_function(
        &self,
        macro_id: &str,
        function_name: &str,
        event: TriggerEvent,
        data: EventData,
    ) -> Result<bool, SchedulerError> {
        if self.get_macro_state(macro_id) == MacroState::Paused {
            debug!("Function request ignored, macro paused");
            return Ok(false);
        }

        self.executor
            .execute_function(macro_id, function_name, event, data)
            .await?;
        Ok(true)
    }

    /// Handle a macro-level trigger the same way as a manual request:
    /// a paused macro is resumed, anything else is started.
    pub async fn handle_trigger(
        &self,
        macro_ref: Arc<Macro>,
        event: TriggerEvent,
    ) -> Result<bool, SchedulerError> {
        debug!(macro_id = %macro_ref.id, event = %event, "Handling trigger");
        if self.get_macro_state(&macro_ref.id) == MacroState::Paused {
            return self.resume_macro(&macro_ref.id).await;
        }
        match self.start_macro(macro_ref).await? {
            StartOutcome::Started => Ok(true),
            StartOutcome::AlreadyActive(_) => Ok(false),
        }
    }

    pub fn get_macro_state(&self, macro_id: &str) -> MacroState {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(macro_id).copied().unwrap_or_default()
    }

    /// Every macro id with a non-idle state, sorted by id
    pub fn get_macros(&self) -> Vec<(String, MacroState)> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let mut macros: Vec<(String, MacroState)> = states
            .iter()
            .filter(|(_, state)| **state != MacroState::Idle)
            .map(|(id, state)| (id.clone(), *state))
            .collect();
        macros.sort_by(|a, b| a.0.cmp(&b.0));
        macros
    }

    /// Running or paused macro ids, sorted
    pub fn active_macros(&self) -> Vec<String> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = states
            .iter()
            .filter(|(_, state)| state.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Forget all state; plugins still disabled are re-enabled
    pub fn clear(&self) {
        let ids: Vec<String> = {
            let holds = self
                .plugin_holds
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            holds.by_macro.keys().cloned().collect()
        };
        for id in ids {
            self.restore_plugins(&id);
        }
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        telemetry::update_running_macros(0);
    }
}
