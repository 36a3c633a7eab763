// Chat message filtering for OnChatMessage triggers

use crate::models::{
    ChatMessageFilterConfig, ChatType, EventData, CHAT_MESSAGE_KEY, CHAT_SENDER_KEY, CHAT_TYPE_KEY,
};
use regex::{Regex, RegexBuilder};

/// Compiled form of a [`ChatMessageFilterConfig`].
///
/// Empty strings and empty channel lists are normalized away so that an
/// absent or empty condition always holds.
#[derive(Debug, Clone)]
pub struct ChatFilter {
    channels: Option<Vec<ChatType>>,
    message_contains: Option<String>,
    sender_contains: Option<String>,
    message_regex: Option<MessagePattern>,
}

#[derive(Debug, Clone)]
enum MessagePattern {
    Valid(Regex),
    /// Never matches
    Invalid,
}

impl ChatFilter {
    pub fn compile(config: &ChatMessageFilterConfig) -> Self {
        let channels = config
            .channels
            .as_ref()
            .filter(|channels| !channels.is_empty())
            .cloned();

        let message_contains = non_empty(&config.message_contains).map(str::to_lowercase);
        let sender_contains = non_empty(&config.sender_contains).map(str::to_lowercase);

        let message_regex = non_empty(&config.message_regex).map(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => MessagePattern::Valid(regex),
                Err(e) => {
                    tracing::warn!(
                        pattern = pattern,
                        error = %e,
                        "Invalid chat filter regex, filter will reject every message"
                    );
                    MessagePattern::Invalid
                }
            }
        });

        Self {
            channels,
            message_contains,
            sender_contains,
            message_regex,
        }
    }

    /// True when no condition is configured
    pub fn is_empty(&self) -> bool {
        self.channels.is_none()
            && self.message_contains.is_none()
            && self.sender_contains.is_none()
            && self.message_regex.is_none()
    }

    pub fn matches(&self, data: &EventData) -> bool {
        if let Some(channels) = &self.channels {
            let channel = match data.get(CHAT_TYPE_KEY).and_then(ChatType::from_value) {
                Some(channel) => channel,
                None => return false,
            };
            if !channels.contains(&channel) {
                return false;
            }
        }

        if let Some(needle) = &self.message_contains {
            match data.get_str(CHAT_MESSAGE_KEY) {
                Some(message) if message.to_lowercase().contains(needle.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(needle) = &self.sender_contains {
            match data.get_str(CHAT_SENDER_KEY) {
                Some(sender) if sender.to_lowercase().contains(needle.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(pattern) = &self.message_regex {
            let regex = match pattern {
                MessagePattern::Valid(regex) => regex,
                MessagePattern::Invalid => return false,
            };
            match data.get_str(CHAT_MESSAGE_KEY) {
                Some(message) if regex.is_match(message) => {}
                _ => return false,
            }
        }

        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Evaluate an optional chat filter against an event payload.
///
/// An absent filter always matches.
pub fn matches_chat_message_filter(data: &EventData, filter: Option<&ChatFilter>) -> bool {
    filter.map_or(true, |filter| filter.matches(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(config: ChatMessageFilterConfig) -> ChatFilter {
        ChatFilter::compile(&config)
    }

    #[test]
    fn test_absent_filter_matches_everything() {
        assert!(matches_chat_message_filter(&EventData::new(), None));
    }

    #[test]
    fn test_channel_and_substring_compose() {
        let f = filter(ChatMessageFilterConfig {
            channels: Some(vec![ChatType::Say]),
            message_contains: Some("help".to_string()),
            ..Default::default()
        });

        assert!(f.matches(&EventData::chat(ChatType::Say, "Alice", "I need help")));
        assert!(!f.matches(&EventData::chat(ChatType::Party, "Alice", "I need help")));
        assert!(!f.matches(&EventData::chat(ChatType::Say, "Alice", "no keyword")));
    }

    #[test]
    fn test_substring_checks_ignore_case() {
        let f = filter(ChatMessageFilterConfig {
            message_contains: Some("HELP".to_string()),
            sender_contains: Some("ali".to_string()),
            ..Default::default()
        });
        assert!(f.matches(&EventData::chat(ChatType::Say, "ALICE", "please Help")));
        assert!(!f.matches(&EventData::chat(ChatType::Say, "Bob", "please Help")));
    }

    #[test]
    fn test_missing_key_fails_configured_condition() {
        let f = filter(ChatMessageFilterConfig {
            sender_contains: Some("a".to_string()),
            ..Default::default()
        });
        let data = EventData::new().with(CHAT_MESSAGE_KEY, "hello");
        assert!(!f.matches(&data));
    }

    #[test]
    fn test_channel_accepts_numeric_code() {
        let f = filter(ChatMessageFilterConfig {
            channels: Some(vec![ChatType::Party]),
            ..Default::default()
        });
        let data = EventData::new()
            .with(CHAT_TYPE_KEY, 14)
            .with(CHAT_MESSAGE_KEY, "pull");
        assert!(f.matches(&data));
    }

    #[test]
    fn test_empty_conditions_are_ignored() {
        let f = filter(ChatMessageFilterConfig {
            channels: Some(vec![]),
            message_contains: Some(String::new()),
            sender_contains: None,
            message_regex: Some(String::new()),
        });
        assert!(f.is_empty());
        assert!(f.matches(&EventData::new()));
    }

    #[test]
    fn test_regex_is_case_insensitive() {
        let f = filter(ChatMessageFilterConfig {
            message_regex: Some(r"^ready\s+check".to_string()),
            ..Default::default()
        });
        assert!(f.matches(&EventData::chat(ChatType::Party, "Bob", "READY   check now")));
        assert!(!f.matches(&EventData::chat(ChatType::Party, "Bob", "not ready check")));
    }

    #[test]
    fn test_invalid_regex_rejects_everything() {
        let f = filter(ChatMessageFilterConfig {
            message_regex: Some("(unbalanced".to_string()),
            ..Default::default()
        });
        assert!(!f.is_empty());
        assert!(!f.matches(&EventData::chat(ChatType::Say, "Alice", "(unbalanced")));
        assert!(!f.matches(&EventData::chat(ChatType::Say, "Alice", "anything")));
    }
}
