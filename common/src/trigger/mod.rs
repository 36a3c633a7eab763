// Trigger module
// Registers macros and functions against event kinds and dispatches raised events

pub mod filter;
pub mod function;
pub mod registry;

pub use filter::{matches_chat_message_filter, ChatFilter};
pub use function::{infer_event, parse_addon_trigger, AddonTrigger, TriggerFunction};
pub use registry::{
    BroadcastSink, DispatchReport, FunctionExecutionRequest, NotificationSink, TriggerNotification,
    TriggerRegistry,
};
