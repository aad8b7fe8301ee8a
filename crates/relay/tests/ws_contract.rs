// Wire contract the relay must keep stable across builds: frame tags,
// default listen port, and the presence policy the UI derives status
// from. Client and relay builds are version-pinned to this contract
// (the frame format intentionally carries no version byte).

use std::time::Duration;

use coedit_common::{AwarenessUpdate, AwarenessUpdateEntry, ClientState, Message, SyncMessage};
use coedit_presence::{reduce, status_at, PresencePolicy, PresenceStatus, PresenceUser};

const RELAY_CONFIG_SOURCE: &str = include_str!("../src/config.rs");

#[test]
fn relay_default_port_is_1234() {
    assert!(
        RELAY_CONFIG_SOURCE.contains(".unwrap_or(1234)"),
        "default listen port must stay 1234, editor clients hardcode it as a fallback",
    );
}

#[test]
fn frame_kind_tags_are_stable() {
    assert_eq!(Message::Sync(SyncMessage::Step1(vec![])).encode()[0], 0);
    assert_eq!(Message::Awareness(vec![]).encode()[0], 1);
}

#[test]
fn sync_step_tags_are_stable() {
    assert_eq!(Message::Sync(SyncMessage::Step1(vec![])).encode()[1], 0);
    assert_eq!(Message::Sync(SyncMessage::Step2(vec![])).encode()[1], 1);
    assert_eq!(Message::Sync(SyncMessage::Update(vec![])).encode()[1], 2);
}

#[test]
fn awareness_state_uses_camel_case_field_names() {
    let state = ClientState {
        name: "Ann".into(),
        color: "#FF6B6B".into(),
        last_seen: 1_700_000_000_000,
        is_typing: true,
        focus_mode: false,
    };
    let json = serde_json::to_value(&state).unwrap();
    for field in ["name", "color", "lastSeen", "isTyping", "focusMode"] {
        assert!(json.get(field).is_some(), "missing wire field {field}");
    }
}

#[test]
fn awareness_removal_is_the_json_null_literal() {
    let update = AwarenessUpdate {
        entries: vec![AwarenessUpdateEntry { client_id: 1, clock: 2, state: None }],
    };
    let bytes = update.encode();
    let tail = &bytes[bytes.len() - 5..];
    assert_eq!(tail, [4, b'n', b'u', b'l', b'l']);
}

#[test]
fn presence_policy_defaults_match_client_expectations() {
    let policy = PresencePolicy::default();
    assert_eq!(policy.online_within, Duration::from_secs(120));
    assert_eq!(policy.away_within, Duration::from_secs(600));
    assert_eq!(policy.heartbeat_interval, Duration::from_secs(30));
}

#[test]
fn presence_status_at_literal_timestamps() {
    let now: i64 = 1_700_000_000_000;
    let policy = PresencePolicy::default();
    assert_eq!(status_at(now - 3 * 60_000, now, &policy), PresenceStatus::Away);
    assert_eq!(status_at(now - 90_000, now, &policy), PresenceStatus::Online);
    assert_eq!(status_at(now - 11 * 60_000, now, &policy), PresenceStatus::Offline);
}

#[test]
fn multi_tab_entries_reduce_to_one_account() {
    let now: i64 = 1_700_000_000_000;
    let t1 = now - 60_000;
    let t2 = now - 1_000;
    let raw = vec![
        PresenceUser {
            client_id: 1,
            name: "Ann".into(),
            color: "#FF6B6B".into(),
            last_seen: t1,
            is_typing: false,
        },
        PresenceUser {
            client_id: 2,
            name: "Ann".into(),
            color: "#4ECDC4".into(),
            last_seen: t2,
            is_typing: false,
        },
    ];
    let accounts = reduce(&raw, now, &PresencePolicy::default());
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].name, "Ann");
    assert_eq!(accounts[0].last_seen, t2);
}
