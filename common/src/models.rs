use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Trigger Events
// ============================================================================

/// TriggerEvent names an external occurrence that can start a macro or invoke
/// one of its functions.
///
/// Declaration order matters: function names are matched against these names
/// by case-insensitive prefix, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerEvent {
    /// Sentinel, never registered
    None,
    OnUpdate,
    OnConditionChange,
    OnTerritoryChange,
    OnChatMessage,
    OnAddonEvent,
    OnCraftingLoop,
    OnAutoRetainerCharacterPostProcess,
    OnMacroStart,
    OnMacroStop,
}

impl TriggerEvent {
    /// Every event kind in declaration order, sentinel included
    pub const ALL: [TriggerEvent; 10] = [
        TriggerEvent::None,
        TriggerEvent::OnUpdate,
        TriggerEvent::OnConditionChange,
        TriggerEvent::OnTerritoryChange,
        TriggerEvent::OnChatMessage,
        TriggerEvent::OnAddonEvent,
        TriggerEvent::OnCraftingLoop,
        TriggerEvent::OnAutoRetainerCharacterPostProcess,
        TriggerEvent::OnMacroStart,
        TriggerEvent::OnMacroStop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::OnUpdate => "OnUpdate",
            Self::OnConditionChange => "OnConditionChange",
            Self::OnTerritoryChange => "OnTerritoryChange",
            Self::OnChatMessage => "OnChatMessage",
            Self::OnAddonEvent => "OnAddonEvent",
            Self::OnCraftingLoop => "OnCraftingLoop",
            Self::OnAutoRetainerCharacterPostProcess => "OnAutoRetainerCharacterPostProcess",
            Self::OnMacroStart => "OnMacroStart",
            Self::OnMacroStop => "OnMacroStop",
        }
    }

    /// Event kinds that can carry registrations (everything but the sentinel)
    pub fn registrable() -> impl Iterator<Item = TriggerEvent> {
        Self::ALL
            .into_iter()
            .filter(|event| *event != TriggerEvent::None)
    }

    /// Find the first registrable event whose name is a case-insensitive
    /// prefix of `function_name`.
    pub fn from_function_prefix(function_name: &str) -> Option<TriggerEvent> {
        Self::registrable().find(|event| {
            let name = event.as_str();
            function_name.len() >= name.len()
                && function_name.as_bytes()[..name.len()].eq_ignore_ascii_case(name.as_bytes())
        })
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown trigger event: {}", s))
    }
}

// ============================================================================
// Macro Models
// ============================================================================

/// MacroType identifies the script language a macro body is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroType {
    Native,
    Lua,
}

impl MacroType {
    /// Only Lua macros expose callable functions to function-level triggers
    pub fn supports_function_triggers(&self) -> bool {
        matches!(self, MacroType::Lua)
    }
}

impl fmt::Display for MacroType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroType::Native => f.write_str("Native"),
            MacroType::Lua => f.write_str("Lua"),
        }
    }
}

/// Macro is a user-authored automation script plus its metadata.
///
/// Macros are owned by the storage layer; the engine only keeps shared
/// references and reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Macro {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub macro_type: MacroType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: MacroMetadata,
}

impl Macro {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        macro_type: MacroType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            macro_type,
            content: content.into(),
            metadata: MacroMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: MacroMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// MacroMetadata is the declarative configuration attached to a macro
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroMetadata {
    pub trigger_events: Vec<TriggerEvent>,
    pub crafting_loop: bool,
    pub craft_loop_count: i32,
    pub description: String,
    pub author: String,
    pub version: String,
    pub last_modified: DateTime<Utc>,
    pub additional_data: HashMap<String, String>,
    pub configs: HashMap<String, MacroConfigItem>,
    pub addon_event_config: Option<AddonEventConfig>,
    /// Internal names of plugins that must be loaded before the macro starts
    pub plugin_dependencies: Vec<String>,
    /// Internal names of plugins disabled while the macro runs
    pub plugins_to_disable: Vec<String>,
    pub dependencies: Vec<DependencyDescriptor>,
    /// Filter applied to macro-level OnChatMessage triggers
    pub chat_message_filter: Option<ChatMessageFilterConfig>,
    /// Filters applied to function-level triggers, keyed by function name
    pub function_chat_filters: HashMap<String, ChatMessageFilterConfig>,
}

impl Default for MacroMetadata {
    fn default() -> Self {
        Self {
            trigger_events: Vec::new(),
            crafting_loop: false,
            craft_loop_count: 0,
            description: String::new(),
            author: String::new(),
            version: "1.0.0".to_string(),
            last_modified: Utc::now(),
            additional_data: HashMap::new(),
            configs: HashMap::new(),
            addon_event_config: None,
            plugin_dependencies: Vec::new(),
            plugins_to_disable: Vec::new(),
            dependencies: Vec::new(),
            chat_message_filter: None,
            function_chat_filters: HashMap::new(),
        }
    }
}

/// ConfigValue is a typed value of a macro configuration item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
}

/// MacroConfigItem is a user-tunable setting declared by a macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroConfigItem {
    #[serde(default)]
    pub value: Option<ConfigValue>,
    pub default_value: ConfigValue,
    #[serde(default)]
    pub description: Option<String>,
}

impl MacroConfigItem {
    pub fn new(default_value: ConfigValue) -> Self {
        Self {
            value: None,
            default_value,
            description: None,
        }
    }

    /// The configured value, or the default when none was set
    pub fn effective(&self) -> &ConfigValue {
        self.value.as_ref().unwrap_or(&self.default_value)
    }
}

// ============================================================================
// Chat & Addon Filters
// ============================================================================

/// ChatType is the channel a chat line was received on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChatType {
    Say,
    Shout,
    TellOutgoing,
    TellIncoming,
    Party,
    Alliance,
    Linkshell,
    FreeCompany,
    Yell,
    Echo,
    SystemMessage,
    Other(u16),
}

impl ChatType {
    const NAMED: [(ChatType, &'static str, u16); 11] = [
        (ChatType::Say, "Say", 10),
        (ChatType::Shout, "Shout", 11),
        (ChatType::TellOutgoing, "TellOutgoing", 12),
        (ChatType::TellIncoming, "TellIncoming", 13),
        (ChatType::Party, "Party", 14),
        (ChatType::Alliance, "Alliance", 15),
        (ChatType::Linkshell, "Linkshell", 16),
        (ChatType::FreeCompany, "FreeCompany", 24),
        (ChatType::Yell, "Yell", 30),
        (ChatType::Echo, "Echo", 56),
        (ChatType::SystemMessage, "SystemMessage", 57),
    ];

    /// Numeric channel code used by the host client
    pub fn code(&self) -> u16 {
        match self {
            ChatType::Other(code) => *code,
            named => Self::NAMED
                .iter()
                .find(|(chat_type, _, _)| chat_type == named)
                .map(|(_, _, code)| *code)
                .unwrap_or_default(),
        }
    }

    pub fn from_code(code: u16) -> ChatType {
        Self::NAMED
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(chat_type, _, _)| *chat_type)
            .unwrap_or(ChatType::Other(code))
    }

    /// Read a channel out of an event payload value (name or numeric code)
    pub fn from_value(value: &Value) -> Option<ChatType> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n
                .as_u64()
                .and_then(|code| u16::try_from(code).ok())
                .map(ChatType::from_code),
            _ => None,
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatType::Other(code) => write!(f, "{}", code),
            named => {
                let name = Self::NAMED
                    .iter()
                    .find(|(chat_type, _, _)| chat_type == named)
                    .map(|(_, name, _)| *name)
                    .unwrap_or("Unknown");
                f.write_str(name)
            }
        }
    }
}

impl FromStr for ChatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.trim().parse::<u16>() {
            return Ok(ChatType::from_code(code));
        }
        Self::NAMED
            .iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(chat_type, _, _)| *chat_type)
            .ok_or_else(|| format!("Unknown chat type: {}", s))
    }
}

impl TryFrom<String> for ChatType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChatType> for String {
    fn from(value: ChatType) -> Self {
        value.to_string()
    }
}

/// ChatMessageFilterConfig narrows which chat lines fire an OnChatMessage trigger.
///
/// All configured conditions must hold; absent or empty ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatMessageFilterConfig {
    /// Allowed channels, None or empty allows all
    pub channels: Option<Vec<ChatType>>,
    pub message_contains: Option<String>,
    pub sender_contains: Option<String>,
    pub message_regex: Option<String>,
}

/// AddonEventType is the lifecycle phase of a UI addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AddonEventType {
    PreSetup,
    #[default]
    PostSetup,
    PreUpdate,
    PostUpdate,
    PreDraw,
    PostDraw,
    PreFinalize,
    PreRequestedUpdate,
    PostRequestedUpdate,
    PreRefresh,
    PostRefresh,
    PreReceiveEvent,
    PostReceiveEvent,
}

impl AddonEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreSetup => "PreSetup",
            Self::PostSetup => "PostSetup",
            Self::PreUpdate => "PreUpdate",
            Self::PostUpdate => "PostUpdate",
            Self::PreDraw => "PreDraw",
            Self::PostDraw => "PostDraw",
            Self::PreFinalize => "PreFinalize",
            Self::PreRequestedUpdate => "PreRequestedUpdate",
            Self::PostRequestedUpdate => "PostRequestedUpdate",
            Self::PreRefresh => "PreRefresh",
            Self::PostRefresh => "PostRefresh",
            Self::PreReceiveEvent => "PreReceiveEvent",
            Self::PostReceiveEvent => "PostReceiveEvent",
        }
    }
}

impl fmt::Display for AddonEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AddonEventConfig selects the addon and phase a macro-level trigger watches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonEventConfig {
    pub addon_name: String,
    #[serde(default)]
    pub event_type: AddonEventType,
}

// ============================================================================
// Dependencies
// ============================================================================

/// DependencyDescriptor declares an external resource a macro needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyDescriptor {
    /// File fetched over HTTP(S)
    Remote { name: String, url: String },
    /// Resource published by another loaded plugin
    Plugin {
        name: String,
        plugin: String,
        resource: String,
    },
    /// File on the local filesystem
    Local { name: String, path: String },
}

impl DependencyDescriptor {
    pub fn name(&self) -> &str {
        match self {
            DependencyDescriptor::Remote { name, .. }
            | DependencyDescriptor::Plugin { name, .. }
            | DependencyDescriptor::Local { name, .. } => name,
        }
    }
}

// ============================================================================
// Run State
// ============================================================================

/// MacroState is the scheduler-owned lifecycle state of one macro id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MacroState {
    /// Never started, or unknown to the scheduler
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl MacroState {
    /// Running or paused, i.e. an instance exists
    pub fn is_active(&self) -> bool {
        matches!(self, MacroState::Running | MacroState::Paused)
    }
}

impl fmt::Display for MacroState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MacroState::Idle => "idle",
            MacroState::Running => "running",
            MacroState::Paused => "paused",
            MacroState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Event Payloads
// ============================================================================

pub const ADDON_NAME_KEY: &str = "AddonName";
pub const ADDON_EVENT_TYPE_KEY: &str = "EventType";
pub const CHAT_TYPE_KEY: &str = "type";
pub const CHAT_MESSAGE_KEY: &str = "message";
pub const CHAT_SENDER_KEY: &str = "sender";

/// EventData is the key/value bag carried with a raised trigger event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(HashMap<String, Value>);

impl EventData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the bag
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Payload of an OnChatMessage event
    pub fn chat(channel: ChatType, sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new()
            .with(CHAT_TYPE_KEY, channel.to_string())
            .with(CHAT_SENDER_KEY, sender.into())
            .with(CHAT_MESSAGE_KEY, message.into())
    }

    /// Payload of an OnAddonEvent event
    pub fn addon(addon_name: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self::new()
            .with(ADDON_NAME_KEY, addon_name.into())
            .with(ADDON_EVENT_TYPE_KEY, event_type.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String entry, None when missing or not a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<HashMap<String, Value>> for EventData {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}
