// Session-level error taxonomy.
//
// Both variants are recoverable: the handler logs them and drops the
// single offending frame, keeping the session live. Transport failures
// are not represented here; they tear the connection down directly in
// the lifecycle loop and are never retried by the relay.

use coedit_common::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Truncated or garbage bytes in a frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] CodecError),

    /// The CRDT library rejected a state vector or update payload.
    #[error("replica rejected payload: {0}")]
    ReplicaApply(String),
}
