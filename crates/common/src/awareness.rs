// Awareness-protocol payload: ephemeral per-client presence state.
//
// Wire layout (inside a frame's awareness payload):
//
//   [varuint entry count]
//   per entry: [varuint client id][varuint clock][varstring json state]
//
// A JSON state of `null` announces removal of that client id. The state
// blob itself is the typed [`ClientState`]; decoding is lenient so that
// older or newer client builds still interoperate: missing fields take
// defaults and unknown fields are dropped.

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, Decoder, Encoder};

/// Ephemeral presence state one client publishes about itself.
///
/// `last_seen` is a millisecond epoch timestamp refreshed by the
/// client's heartbeat; it is what drives online/away/offline status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientState {
    pub name: String,
    pub color: String,
    pub last_seen: i64,
    pub is_typing: bool,
    pub focus_mode: bool,
}

/// One client's slot in an awareness update.
///
/// `state == None` means the client id is being removed (its connection
/// closed or it went intentionally silent).
#[derive(Debug, Clone, PartialEq)]
pub struct AwarenessUpdateEntry {
    pub client_id: u64,
    pub clock: u64,
    pub state: Option<ClientState>,
}

/// A batch of awareness changes, as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AwarenessUpdate {
    pub entries: Vec<AwarenessUpdateEntry>,
}

impl AwarenessUpdate {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_var_uint(self.entries.len() as u64);
        for entry in &self.entries {
            encoder.write_var_uint(entry.client_id);
            encoder.write_var_uint(entry.clock);
            let json = match &entry.state {
                // ClientState has no map keys or non-finite numbers, so
                // serialization cannot fail.
                Some(state) => serde_json::to_string(state).unwrap_or_else(|_| "null".into()),
                None => "null".to_string(),
            };
            encoder.write_var_string(&json);
        }
        encoder.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(bytes);
        let count = decoder.read_var_uint()?;
        let mut entries = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let client_id = decoder.read_var_uint()?;
            let clock = decoder.read_var_uint()?;
            let json = decoder.read_var_string()?;
            let state = match serde_json::from_str::<serde_json::Value>(json) {
                Ok(serde_json::Value::Null) | Err(_) => None,
                Ok(value) => {
                    // Lenient: a malformed state blob degrades to defaults
                    // rather than poisoning the whole update.
                    Some(serde_json::from_value(value).unwrap_or_default())
                }
            };
            entries.push(AwarenessUpdateEntry { client_id, clock, state });
        }
        Ok(Self { entries })
    }
}
