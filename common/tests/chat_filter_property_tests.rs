// Property-based tests for chat message filtering

use common::models::{ChatMessageFilterConfig, ChatType, EventData, CHAT_MESSAGE_KEY};
use common::trigger::{matches_chat_message_filter, ChatFilter};
use proptest::prelude::*;

fn chat_type() -> impl Strategy<Value = ChatType> {
    prop_oneof![
        Just(ChatType::Say),
        Just(ChatType::Shout),
        Just(ChatType::Party),
        Just(ChatType::Alliance),
        Just(ChatType::FreeCompany),
        Just(ChatType::TellIncoming),
        Just(ChatType::Echo),
        (100u16..200).prop_map(ChatType::Other),
    ]
}

/// **Property: Absent filter always matches**
///
/// *For any* payload, evaluating no filter matches.
#[test]
fn property_absent_filter_matches() {
    proptest!(|(
        channel in chat_type(),
        sender in ".{0,20}",
        message in ".{0,40}"
    )| {
        let data = EventData::chat(channel, sender, message);
        prop_assert!(matches_chat_message_filter(&data, None));
    });
}

/// **Property: Channel membership**
///
/// *For any* allowed channel set and message channel, the filter matches
/// exactly when the channel is in the set.
#[test]
fn property_channel_membership() {
    proptest!(|(
        allowed in prop::collection::vec(chat_type(), 1..5),
        channel in chat_type(),
        message in "[a-z ]{0,30}"
    )| {
        let filter = ChatFilter::compile(&ChatMessageFilterConfig {
            channels: Some(allowed.clone()),
            ..Default::default()
        });
        let data = EventData::chat(channel, "someone", message);
        prop_assert_eq!(filter.matches(&data), allowed.contains(&channel));
    });
}

/// **Property: Substring conditions are case-insensitive**
///
/// *For any* message containing the needle in any case, message_contains
/// matches; removing the needle from the message makes it fail.
#[test]
fn property_message_contains_ignores_case() {
    proptest!(|(
        prefix in "[a-z ]{0,10}",
        needle in "[a-z]{1,8}",
        suffix in "[a-z ]{0,10}",
        upper in any::<bool>()
    )| {
        let filter = ChatFilter::compile(&ChatMessageFilterConfig {
            message_contains: Some(needle.clone()),
            ..Default::default()
        });

        let shown = if upper { needle.to_uppercase() } else { needle.clone() };
        let message = format!("{}{}{}", prefix, shown, suffix);
        prop_assert!(filter.matches(&EventData::chat(ChatType::Say, "a", message)));

        let stripped = format!("{}{}", prefix, suffix);
        let expected = stripped.contains(&needle);
        prop_assert_eq!(filter.matches(&EventData::chat(ChatType::Say, "a", stripped)), expected);
    });
}

/// **Property: Conditions compose with logical AND**
///
/// *For any* combination of channel and sender conditions, the filter matches
/// exactly when both individual filters match.
#[test]
fn property_conditions_compose_with_and() {
    proptest!(|(
        allowed in prop::collection::vec(chat_type(), 1..4),
        sender_needle in "[a-z]{1,4}",
        channel in chat_type(),
        sender in "[a-z]{0,10}"
    )| {
        let channel_only = ChatFilter::compile(&ChatMessageFilterConfig {
            channels: Some(allowed.clone()),
            ..Default::default()
        });
        let sender_only = ChatFilter::compile(&ChatMessageFilterConfig {
            sender_contains: Some(sender_needle.clone()),
            ..Default::default()
        });
        let both = ChatFilter::compile(&ChatMessageFilterConfig {
            channels: Some(allowed),
            sender_contains: Some(sender_needle),
            ..Default::default()
        });

        let data = EventData::chat(channel, sender, "text");
        prop_assert_eq!(
            both.matches(&data),
            channel_only.matches(&data) && sender_only.matches(&data)
        );
    });
}

/// **Property: Missing data never satisfies a condition**
///
/// *For any* configured sender condition, a payload without a sender fails.
#[test]
fn property_missing_key_fails() {
    proptest!(|(needle in "[a-z]{1,6}", message in "[a-z ]{0,20}")| {
        let filter = ChatFilter::compile(&ChatMessageFilterConfig {
            sender_contains: Some(needle),
            ..Default::default()
        });
        let data = EventData::new().with(CHAT_MESSAGE_KEY, message);
        prop_assert!(!filter.matches(&data));
    });
}

/// **Property: Invalid regex rejects everything**
///
/// *For any* message, a filter with an unbalanced pattern never matches and
/// never panics.
#[test]
fn property_invalid_regex_rejects_all() {
    proptest!(|(
        channel in chat_type(),
        message in ".{0,40}",
        pattern_prefix in "[a-z]{0,5}"
    )| {
        let filter = ChatFilter::compile(&ChatMessageFilterConfig {
            message_regex: Some(format!("{}(", pattern_prefix)),
            ..Default::default()
        });
        prop_assert!(!filter.matches(&EventData::chat(channel, "a", message)));
    });
}
