// Property-based tests for the trigger registry

use common::models::{EventData, Macro, MacroType, TriggerEvent};
use common::trigger::{
    parse_addon_trigger, FunctionExecutionRequest, NotificationSink, TriggerNotification,
    TriggerRegistry,
};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

/// Sink that records macro ids and function names it is notified about
#[derive(Default)]
struct RecordingSink {
    macros: Mutex<Vec<String>>,
    functions: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    fn notified_macros(&self) -> Vec<String> {
        let mut ids = self.macros.lock().unwrap().clone();
        ids.extend(self.functions.lock().unwrap().iter().map(|(id, _)| id.clone()));
        ids
    }
}

impl NotificationSink for RecordingSink {
    fn trigger_occurred(&self, notification: TriggerNotification) {
        self.macros
            .lock()
            .unwrap()
            .push(notification.macro_ref.id.clone());
    }

    fn function_execution_requested(&self, request: FunctionExecutionRequest) {
        self.functions
            .lock()
            .unwrap()
            .push((request.macro_id, request.function_name));
    }
}

fn registrable_event() -> impl Strategy<Value = TriggerEvent> {
    prop::sample::select(TriggerEvent::registrable().collect::<Vec<_>>())
}

/// Function names built from an event name plus a suffix, in random case
fn prefixed_function_name() -> impl Strategy<Value = (TriggerEvent, String)> {
    (registrable_event(), "[A-Za-z0-9]{0,12}", any::<bool>()).prop_map(|(event, suffix, upper)| {
        let base = if upper {
            event.as_str().to_uppercase()
        } else {
            event.as_str().to_lowercase()
        };
        (event, format!("{}{}", base, suffix))
    })
}

fn lua(id: &str) -> Arc<Macro> {
    Arc::new(Macro::new(id, id, MacroType::Lua, ""))
}

/// **Property: Registration idempotency**
///
/// *For any* macro and sequence of registrations, registering the same
/// (macro id, function name) pair more than once stores exactly one registration.
#[test]
fn property_registration_idempotency() {
    proptest!(|(
        events in prop::collection::vec(registrable_event(), 1..12),
        functions in prop::collection::vec(prefixed_function_name(), 0..8),
        repeats in 2usize..4
    )| {
        let registry = TriggerRegistry::new(Arc::new(RecordingSink::default()));
        let m = lua("m1");

        for _ in 0..repeats {
            for event in &events {
                registry.register_trigger(&m, *event);
            }
            for (_, name) in &functions {
                registry.register_function_trigger(&m, name);
            }
        }

        let mut unique_events = events.clone();
        unique_events.sort_by_key(|e| e.as_str());
        unique_events.dedup();
        let mut unique_functions: Vec<&String> = functions.iter().map(|(_, n)| n).collect();
        unique_functions.sort();
        unique_functions.dedup();

        prop_assert_eq!(
            registry.registration_count(),
            unique_events.len() + unique_functions.len()
        );
    });
}

/// **Property: Prefix inference is case-insensitive and stable**
///
/// *For any* function name that starts with an event name in any case, the
/// registration lands in the bucket of the first event kind in enumeration
/// order whose name prefixes it, and unregistering by the same name removes it.
#[test]
fn property_function_prefix_inference() {
    proptest!(|((_, name) in prefixed_function_name())| {
        let registry = TriggerRegistry::new(Arc::new(RecordingSink::default()));
        let m = lua("m1");

        let expected = if parse_addon_trigger(&name).is_some() {
            TriggerEvent::OnAddonEvent
        } else {
            TriggerEvent::from_function_prefix(&name).unwrap()
        };

        prop_assert!(registry.register_function_trigger(&m, &name));
        prop_assert_eq!(registry.registrations(expected).len(), 1);

        prop_assert!(registry.unregister_function_trigger(&m, &name));
        prop_assert_eq!(registry.registration_count(), 0);
    });
}

/// **Property: Unregistered macros are never notified**
///
/// *For any* set of macros registered against random events,
/// unregister_all_triggers(m) followed by raising every event kind never
/// notifies m, while other macros keep receiving notifications.
#[test]
fn property_unregister_all_silences_macro() {
    proptest!(|(
        registrations in prop::collection::vec((0usize..4, registrable_event()), 1..20),
        victim in 0usize..4
    )| {
        let sink = Arc::new(RecordingSink::default());
        let registry = TriggerRegistry::new(sink.clone());
        let macros: Vec<Arc<Macro>> = (0..4).map(|i| lua(&format!("m{}", i))).collect();

        for (index, event) in &registrations {
            registry.register_trigger(&macros[*index], *event);
            registry.register_function_trigger(&macros[*index], &format!("{}Handler", event));
        }

        let victim_id = macros[victim].id.clone();
        registry.unregister_all_triggers(&victim_id);

        for event in TriggerEvent::ALL {
            registry.raise_trigger_event(event, &EventData::new());
        }

        let notified = sink.notified_macros();
        prop_assert!(!notified.contains(&victim_id));

        let survivors = registrations.iter().filter(|(i, e)| {
            *i != victim && *e != TriggerEvent::OnAddonEvent && *e != TriggerEvent::OnChatMessage
        });
        for (index, _) in survivors {
            prop_assert!(notified.contains(&macros[*index].id));
        }
    });
}

/// **Property: Addon handler names round-trip through dispatch**
///
/// *For any* addon name and phase without underscores, a handler named
/// OnAddonEvent_<addon>_<phase>[_suffix] fires only for that exact pair.
#[test]
fn property_addon_dispatch_matches_exact_pair() {
    proptest!(|(
        addon in "[A-Za-z][A-Za-z0-9]{0,10}",
        phase in "[A-Za-z][A-Za-z0-9]{0,10}",
        other in "[A-Za-z][A-Za-z0-9]{0,10}",
        suffix in prop::option::of("[A-Za-z0-9]{1,6}")
    )| {
        let sink = Arc::new(RecordingSink::default());
        let registry = TriggerRegistry::new(sink.clone());

        let name = match &suffix {
            Some(s) => format!("OnAddonEvent_{}_{}_{}", addon, phase, s),
            None => format!("OnAddonEvent_{}_{}", addon, phase),
        };
        prop_assert!(registry.register_function_trigger(&lua("m1"), &name));

        if other != addon {
            registry.raise_trigger_event(TriggerEvent::OnAddonEvent, &EventData::addon(other.as_str(), phase.as_str()));
        }
        if other != phase {
            registry.raise_trigger_event(TriggerEvent::OnAddonEvent, &EventData::addon(addon.as_str(), other.as_str()));
        }
        prop_assert!(sink.functions.lock().unwrap().is_empty());

        let report = registry.raise_trigger_event(
            TriggerEvent::OnAddonEvent,
            &EventData::addon(addon.as_str(), phase.as_str()),
        );
        prop_assert_eq!(report.notified, 1);
        prop_assert_eq!(sink.functions.lock().unwrap()[0].1.clone(), name);
    });
}

/// **Property: Empty dispatch is silent**
///
/// *For any* event kind, raising it with nothing registered returns a clean
/// report and emits no notification.
#[test]
fn property_empty_dispatch_is_silent() {
    proptest!(|(event in prop::sample::select(TriggerEvent::ALL.to_vec()))| {
        let sink = Arc::new(RecordingSink::default());
        let registry = TriggerRegistry::new(sink.clone());

        let report = registry.raise_trigger_event(event, &EventData::new().with("k", "v"));
        prop_assert_eq!(report.matched, 0);
        prop_assert_eq!(report.notified, 0);
        prop_assert!(report.is_clean());
        prop_assert!(sink.notified_macros().is_empty());
    });
}
