// Frame layer: one binary message per WebSocket frame.
//
// Wire layout is `[varuint kind][payload]` with two kinds shared by
// every client build and the relay:
//
//   0 = sync      payload: [varuint step][varuint-length bytes]
//   1 = awareness payload: [varuint-length bytes]
//
// Sync step payloads are the CRDT library's native v1 encodings
// (state vector for step 1, update for step 2 / update). There is no
// protocol version byte; client and relay builds are version-pinned.

use crate::codec::{CodecError, Decoder, Encoder};

const MESSAGE_SYNC: u64 = 0;
const MESSAGE_AWARENESS: u64 = 1;

const SYNC_STEP_1: u64 = 0;
const SYNC_STEP_2: u64 = 1;
const SYNC_UPDATE: u64 = 2;

/// A decoded sync-protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// "Here is what I have": an encoded state vector.
    Step1(Vec<u8>),
    /// "Here is what you are missing": an encoded update.
    Step2(Vec<u8>),
    /// An incremental update to relay.
    Update(Vec<u8>),
}

/// A decoded top-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Sync(SyncMessage),
    /// Opaque awareness-protocol payload (see [`crate::awareness`]).
    Awareness(Vec<u8>),
}

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        match self {
            Self::Sync(sync) => {
                encoder.write_var_uint(MESSAGE_SYNC);
                let (step, payload) = match sync {
                    SyncMessage::Step1(payload) => (SYNC_STEP_1, payload),
                    SyncMessage::Step2(payload) => (SYNC_STEP_2, payload),
                    SyncMessage::Update(payload) => (SYNC_UPDATE, payload),
                };
                encoder.write_var_uint(step);
                encoder.write_var_bytes(payload);
            }
            Self::Awareness(payload) => {
                encoder.write_var_uint(MESSAGE_AWARENESS);
                encoder.write_var_bytes(payload);
            }
        }
        encoder.into_bytes()
    }

    /// Decode one frame. Trailing bytes after a complete message are
    /// ignored rather than rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut decoder = Decoder::new(bytes);
        match decoder.read_var_uint()? {
            MESSAGE_SYNC => {
                let step = decoder.read_var_uint()?;
                let payload = decoder.read_var_bytes()?.to_vec();
                let sync = match step {
                    SYNC_STEP_1 => SyncMessage::Step1(payload),
                    SYNC_STEP_2 => SyncMessage::Step2(payload),
                    SYNC_UPDATE => SyncMessage::Update(payload),
                    other => return Err(CodecError::UnknownTag(other)),
                };
                Ok(Self::Sync(sync))
            }
            MESSAGE_AWARENESS => Ok(Self::Awareness(decoder.read_var_bytes()?.to_vec())),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_step1_roundtrip() {
        let message = Message::Sync(SyncMessage::Step1(vec![0x01, 0x02, 0x03]));
        let bytes = message.encode();
        assert_eq!(bytes[0], 0x00, "sync kind tag");
        assert_eq!(bytes[1], 0x00, "step 1 tag");
        assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn sync_update_roundtrip() {
        let message = Message::Sync(SyncMessage::Update(vec![0xaa; 200]));
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn awareness_roundtrip() {
        let message = Message::Awareness(vec![0x05, 0x00, 0x07]);
        let bytes = message.encode();
        assert_eq!(bytes[0], 0x01, "awareness kind tag");
        assert_eq!(Message::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn unknown_message_kind_is_rejected() {
        assert_eq!(Message::decode(&[0x09]), Err(CodecError::UnknownTag(9)));
    }

    #[test]
    fn unknown_sync_step_is_rejected() {
        assert_eq!(Message::decode(&[0x00, 0x07, 0x00]), Err(CodecError::UnknownTag(7)));
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = Message::Sync(SyncMessage::Step2(vec![1, 2, 3, 4])).encode();
        assert!(Message::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(Message::decode(&[]).is_err());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = Message::Awareness(vec![0x01]).encode();
        bytes.extend_from_slice(&[0xde, 0xad]);
        assert_eq!(Message::decode(&bytes).unwrap(), Message::Awareness(vec![0x01]));
    }
}
