// coedit-common: wire protocol shared by the relay and client builds

pub mod awareness;
pub mod codec;
pub mod frame;

pub use awareness::{AwarenessUpdate, AwarenessUpdateEntry, ClientState};
pub use codec::{CodecError, Decoder, Encoder};
pub use frame::{Message, SyncMessage};
