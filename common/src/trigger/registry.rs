// Trigger registry
// Maps event kinds to registrations and turns raised events into notifications

use crate::errors::TriggerError;
use crate::models::{EventData, Macro, TriggerEvent, ADDON_EVENT_TYPE_KEY, ADDON_NAME_KEY};
use crate::telemetry::{self, NotificationKind};
use crate::trigger::filter::{matches_chat_message_filter, ChatFilter};
use crate::trigger::function::{infer_event, AddonTrigger, TriggerFunction};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// A macro-level trigger fired for `macro_ref`
#[derive(Debug, Clone)]
pub struct TriggerNotification {
    pub macro_ref: Arc<Macro>,
    pub event: TriggerEvent,
    pub data: EventData,
    pub raised_at: DateTime<Utc>,
}

/// A function-level trigger fired, asking the executor to run one function
#[derive(Debug, Clone)]
pub struct FunctionExecutionRequest {
    pub macro_id: String,
    pub function_name: String,
    pub event: TriggerEvent,
    pub data: EventData,
    pub raised_at: DateTime<Utc>,
}

/// NotificationSink receives the registry's two one-way notification streams.
///
/// A panicking sink fails only the registration being dispatched.
pub trait NotificationSink: Send + Sync {
    fn trigger_occurred(&self, notification: TriggerNotification);

    fn function_execution_requested(&self, request: FunctionExecutionRequest);
}

/// BroadcastSink fans notifications out over tokio broadcast channels
#[derive(Clone)]
pub struct BroadcastSink {
    triggers: broadcast::Sender<TriggerNotification>,
    functions: broadcast::Sender<FunctionExecutionRequest>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (triggers, _) = broadcast::channel(capacity);
        let (functions, _) = broadcast::channel(capacity);
        Self {
            triggers,
            functions,
        }
    }

    pub fn subscribe_triggers(&self) -> broadcast::Receiver<TriggerNotification> {
        self.triggers.subscribe()
    }

    pub fn subscribe_function_requests(&self) -> broadcast::Receiver<FunctionExecutionRequest> {
        self.functions.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn trigger_occurred(&self, notification: TriggerNotification) {
        let macro_id = notification.macro_ref.id.clone();
        if self.triggers.send(notification).is_err() {
            tracing::debug!(macro_id = %macro_id, "No subscribers for trigger notification");
        }
    }

    fn function_execution_requested(&self, request: FunctionExecutionRequest) {
        let macro_id = request.macro_id.clone();
        if self.functions.send(request).is_err() {
            tracing::debug!(macro_id = %macro_id, "No subscribers for function execution request");
        }
    }
}

/// Summary of one dispatch pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: TriggerEvent,
    /// Registrations that passed addon and chat matching
    pub matched: usize,
    /// Notifications emitted
    pub notified: usize,
    pub errors: Vec<TriggerError>,
}

impl DispatchReport {
    fn empty(event: TriggerEvent) -> Self {
        Self {
            event,
            matched: 0,
            notified: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// TriggerRegistry owns the event → registrations mapping
pub struct TriggerRegistry {
    registrations: RwLock<HashMap<TriggerEvent, Vec<TriggerFunction>>>,
    sink: Arc<dyn NotificationSink>,
}

impl TriggerRegistry {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            registrations: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Insert unless an equal registration already sits in the bucket
    fn insert(&self, trigger: TriggerFunction) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let bucket = registrations.entry(trigger.event).or_default();
        if bucket.contains(&trigger) {
            return false;
        }
        tracing::debug!(
            macro_id = trigger.macro_id(),
            function = %trigger.function_name,
            event = %trigger.event,
            "Trigger registered"
        );
        bucket.push(trigger);
        true
    }

    fn remove(&self, event: TriggerEvent, macro_id: &str, function_name: &str) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(bucket) = registrations.get_mut(&event) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|t| !t.same_identity(macro_id, function_name));
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            registrations.remove(&event);
        }
        removed
    }

    /// Register the whole macro for `event`.
    ///
    /// Chat triggers pick up the macro-level chat filter; addon triggers pick
    /// up the configured addon name and phase.
    pub fn register_trigger(&self, macro_ref: &Arc<Macro>, event: TriggerEvent) -> bool {
        if event == TriggerEvent::None {
            return false;
        }

        let metadata = &macro_ref.metadata;
        let chat_filter = match event {
            TriggerEvent::OnChatMessage => metadata.chat_message_filter.as_ref().map(ChatFilter::compile),
            _ => None,
        };
        let addon = match event {
            TriggerEvent::OnAddonEvent => metadata.addon_event_config.as_ref().map(AddonTrigger::from),
            _ => None,
        };

        self.insert(
            TriggerFunction::new(Arc::clone(macro_ref), "", event)
                .with_chat_filter(chat_filter)
                .with_addon(addon),
        )
    }

    /// Register one function of a macro, inferring the event kind from its name.
    ///
    /// Returns false when the name matches no event kind or the registration
    /// already exists.
    pub fn register_function_trigger(&self, macro_ref: &Arc<Macro>, function_name: &str) -> bool {
        let Some((event, addon)) = infer_event(function_name) else {
            tracing::trace!(
                macro_id = %macro_ref.id,
                function = function_name,
                "Function name matches no trigger event"
            );
            return false;
        };

        let chat_filter = match event {
            TriggerEvent::OnChatMessage => macro_ref
                .metadata
                .function_chat_filters
                .get(function_name)
                .map(ChatFilter::compile),
            _ => None,
        };

        self.insert(
            TriggerFunction::new(Arc::clone(macro_ref), function_name, event)
                .with_chat_filter(chat_filter)
                .with_addon(addon),
        )
    }

    /// Register every event listed in the macro's metadata
    pub fn register_macro(&self, macro_ref: &Arc<Macro>) -> usize {
        macro_ref
            .metadata
            .trigger_events
            .iter()
            .filter(|event| self.register_trigger(macro_ref, **event))
            .count()
    }

    pub fn unregister_trigger(&self, macro_ref: &Macro, event: TriggerEvent) -> bool {
        self.remove(event, &macro_ref.id, "")
    }

    pub fn unregister_function_trigger(&self, macro_ref: &Macro, function_name: &str) -> bool {
        match infer_event(function_name) {
            Some((event, _)) => self.remove(event, &macro_ref.id, function_name),
            None => false,
        }
    }

    /// Remove every registration of the macro across all event kinds
    pub fn unregister_all_triggers(&self, macro_id: &str) -> usize {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;
        for bucket in registrations.values_mut() {
            let before = bucket.len();
            bucket.retain(|t| t.macro_id() != macro_id);
            removed += before - bucket.len();
        }
        registrations.retain(|_, bucket| !bucket.is_empty());
        if removed > 0 {
            tracing::debug!(macro_id = macro_id, removed = removed, "Triggers unregistered");
        }
        removed
    }

    /// Snapshot of the registrations for one event kind
    pub fn registrations(&self, event: TriggerEvent) -> Vec<TriggerFunction> {
        let registrations = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registrations.get(&event).cloned().unwrap_or_default()
    }

    pub fn registration_count(&self) -> usize {
        let registrations = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registrations.values().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registrations.clear();
    }

    /// Raise `event` and notify every matching registration.
    ///
    /// Iterates over a snapshot, so registrations changed by subscribers
    /// during the pass take effect from the next raise on.
    #[tracing::instrument(skip(self, data), fields(event = %event))]
    pub fn raise_trigger_event(&self, event: TriggerEvent, data: &EventData) -> DispatchReport {
        let mut report = DispatchReport::empty(event);

        let snapshot = self.registrations(event);
        if snapshot.is_empty() {
            return report;
        }

        let raised_at = Utc::now();
        for trigger in &snapshot {
            if !Self::matches(trigger, event, data) {
                continue;
            }
            report.matched += 1;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.notify(trigger, event, data, raised_at)
            }))
            .unwrap_or_else(|_| {
                Err(TriggerError::SinkPanicked {
                    macro_name: trigger.macro_ref.name.clone(),
                    function_name: trigger.function_name.clone(),
                })
            });
            match outcome {
                Ok(()) => report.notified += 1,
                Err(e) => {
                    tracing::error!(
                        macro_id = trigger.macro_id(),
                        macro_name = %trigger.macro_ref.name,
                        function = %trigger.function_name,
                        error = %e,
                        "Trigger dispatch failed"
                    );
                    telemetry::record_dispatch_error(event);
                    report.errors.push(e);
                }
            }
        }

        report
    }

    fn matches(trigger: &TriggerFunction, event: TriggerEvent, data: &EventData) -> bool {
        match event {
            TriggerEvent::OnAddonEvent => {
                let Some(addon) = &trigger.addon else {
                    return false;
                };
                data.get_str(ADDON_NAME_KEY) == Some(addon.addon_name.as_str())
                    && data.get_str(ADDON_EVENT_TYPE_KEY) == Some(addon.event_type.as_str())
            }
            TriggerEvent::OnChatMessage => {
                matches_chat_message_filter(data, trigger.chat_filter.as_ref())
            }
            _ => true,
        }
    }

    fn notify(
        &self,
        trigger: &TriggerFunction,
        event: TriggerEvent,
        data: &EventData,
        raised_at: DateTime<Utc>,
    ) -> Result<(), TriggerError> {
        if trigger.is_macro_level() {
            self.sink.trigger_occurred(TriggerNotification {
                macro_ref: Arc::clone(&trigger.macro_ref),
                event,
                data: data.clone(),
                raised_at,
            });
            telemetry::record_trigger_notification(event, NotificationKind::Macro);
            return Ok(());
        }

        let macro_type = trigger.macro_ref.macro_type;
        if !macro_type.supports_function_triggers() {
            return Err(TriggerError::UnsupportedMacroType {
                macro_name: trigger.macro_ref.name.clone(),
                macro_type,
                function_name: trigger.function_name.clone(),
            });
        }

        self.sink.function_execution_requested(FunctionExecutionRequest {
            macro_id: trigger.macro_ref.id.clone(),
            function_name: trigger.function_name.clone(),
            event,
            data: data.clone(),
            raised_at,
        });
        telemetry::record_trigger_notification(event, NotificationKind::Function);
        Ok(())
    }
}
