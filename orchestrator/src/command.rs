// Newline-delimited JSON commands read from stdin

use common::models::{EventData, MacroState, TriggerEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Raise a trigger event through the registry
    Event {
        event: TriggerEvent,
        #[serde(default)]
        data: EventData,
    },
    Start { macro_id: String },
    Pause { macro_id: String },
    Resume { macro_id: String },
    Stop { macro_id: String },
    /// The script runtime finished a macro on its own
    Finished { macro_id: String },
    Status,
}

pub fn parse_command(line: &str) -> Result<Command, serde_json::Error> {
    serde_json::from_str(line)
}

/// One line written back to stdout per command
#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<Vec<MacroStatus>>,
}

#[derive(Debug, Serialize)]
pub struct MacroStatus {
    pub id: String,
    pub state: MacroState,
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            macros: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            macros: None,
        }
    }

    pub fn status(macros: Vec<MacroStatus>) -> Self {
        Self {
            ok: true,
            message: format!("{} macro(s) tracked", macros.len()),
            macros: Some(macros),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{ADDON_EVENT_TYPE_KEY, ADDON_NAME_KEY};

    #[test]
    fn test_parse_event_command() {
        let command = parse_command(
            r#"{"command":"event","event":"OnAddonEvent","data":{"AddonName":"Talk","EventType":"PostSetup"}}"#,
        )
        .unwrap();
        match command {
            Command::Event { event, data } => {
                assert_eq!(event, TriggerEvent::OnAddonEvent);
                assert_eq!(data.get_str(ADDON_NAME_KEY), Some("Talk"));
                assert_eq!(data.get_str(ADDON_EVENT_TYPE_KEY), Some("PostSetup"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_event_without_data() {
        let command = parse_command(r#"{"command":"event","event":"OnUpdate"}"#).unwrap();
        assert_eq!(
            command,
            Command::Event {
                event: TriggerEvent::OnUpdate,
                data: EventData::new(),
            }
        );
    }

    #[test]
    fn test_parse_lifecycle_commands() {
        assert_eq!(
            parse_command(r#"{"command":"start","macro_id":"m1"}"#).unwrap(),
            Command::Start {
                macro_id: "m1".to_string()
            }
        );
        assert_eq!(
            parse_command(r#"{"command":"status"}"#).unwrap(),
            Command::Status
        );
        assert!(parse_command(r#"{"command":"launch","macro_id":"m1"}"#).is_err());
        assert!(parse_command("not json").is_err());
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_value(Response::status(vec![MacroStatus {
            id: "m1".to_string(),
            state: MacroState::Paused,
        }]))
        .unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["macros"][0]["state"], "paused");

        let json = serde_json::to_value(Response::error("nope")).unwrap();
        assert!(json.get("macros").is_none());
    }
}
