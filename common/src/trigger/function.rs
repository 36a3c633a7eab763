// Trigger registration records and function-name parsing

use crate::models::{AddonEventConfig, Macro, TriggerEvent};
use crate::trigger::filter::ChatFilter;
use std::sync::Arc;

/// Function names starting with this prefix handle addon lifecycle events
pub const ADDON_EVENT_PREFIX: &str = "OnAddonEvent_";

/// Addon name and lifecycle phase encoded in an addon handler's name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddonTrigger {
    pub addon_name: String,
    pub event_type: String,
}

impl From<&AddonEventConfig> for AddonTrigger {
    fn from(config: &AddonEventConfig) -> Self {
        Self {
            addon_name: config.addon_name.clone(),
            event_type: config.event_type.to_string(),
        }
    }
}

/// Parse `OnAddonEvent_<AddonName>_<EventType>[_...]`.
///
/// Returns None unless the name has the exact prefix and at least three
/// underscore-separated segments. Segments after the third are ignored.
pub fn parse_addon_trigger(function_name: &str) -> Option<AddonTrigger> {
    if !function_name.starts_with(ADDON_EVENT_PREFIX) {
        return None;
    }

    let mut parts = function_name.split('_');
    let _prefix = parts.next()?;
    let addon_name = parts.next()?;
    let event_type = parts.next()?;

    Some(AddonTrigger {
        addon_name: addon_name.to_string(),
        event_type: event_type.to_string(),
    })
}

/// Event kind a function name registers against, plus addon details when it
/// is an addon handler. None when the name matches no known kind.
pub fn infer_event(function_name: &str) -> Option<(TriggerEvent, Option<AddonTrigger>)> {
    if let Some(addon) = parse_addon_trigger(function_name) {
        return Some((TriggerEvent::OnAddonEvent, Some(addon)));
    }
    TriggerEvent::from_function_prefix(function_name).map(|event| (event, None))
}

/// TriggerFunction is one registration held by the trigger registry.
///
/// An empty function name stands for the whole macro. Two registrations are
/// equal when they share macro id and function name.
#[derive(Debug, Clone)]
pub struct TriggerFunction {
    pub macro_ref: Arc<Macro>,
    pub function_name: String,
    pub event: TriggerEvent,
    pub chat_filter: Option<ChatFilter>,
    pub addon: Option<AddonTrigger>,
}

impl TriggerFunction {
    pub fn new(macro_ref: Arc<Macro>, function_name: impl Into<String>, event: TriggerEvent) -> Self {
        Self {
            macro_ref,
            function_name: function_name.into(),
            event,
            chat_filter: None,
            addon: None,
        }
    }

    pub fn with_chat_filter(mut self, filter: Option<ChatFilter>) -> Self {
        self.chat_filter = filter;
        self
    }

    pub fn with_addon(mut self, addon: Option<AddonTrigger>) -> Self {
        self.addon = addon;
        self
    }

    pub fn macro_id(&self) -> &str {
        &self.macro_ref.id
    }

    pub fn is_macro_level(&self) -> bool {
        self.function_name.is_empty()
    }

    pub fn addon_name(&self) -> Option<&str> {
        self.addon.as_ref().map(|a| a.addon_name.as_str())
    }

    pub fn addon_event_type(&self) -> Option<&str> {
        self.addon.as_ref().map(|a| a.event_type.as_str())
    }

    pub fn same_identity(&self, macro_id: &str, function_name: &str) -> bool {
        self.macro_ref.id == macro_id && self.function_name == function_name
    }
}

impl PartialEq for TriggerFunction {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(&other.macro_ref.id, &other.function_name)
    }
}

impl Eq for TriggerFunction {}
