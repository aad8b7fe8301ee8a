// Per-connection sync protocol handling.
//
// A connection moves CONNECTING -> SYNCING -> LIVE -> CLOSED. `greet`
// runs on entry to SYNCING: the relay leads with sync step 1 (its own
// state vector) and a snapshot of the awareness table. From then on
// every inbound frame goes through `handle_frame`; the protocol has no
// explicit "sync done" marker, the session is simply live from the
// first message onward. Frame-level failures bubble up as
// `SessionError` so the lifecycle loop can log and drop the single
// frame without tearing the connection down.

use tracing::trace;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{ReadTxn, StateVector, Transact, Update};

use coedit_common::{AwarenessUpdate, Message, SyncMessage};

use crate::error::SessionError;
use crate::registry::{ConnId, DocShard};

/// Send the opening handshake frames to a freshly joined connection:
/// sync step 1 with the server's state vector, then the current
/// awareness table when it is non-empty.
pub async fn greet(shard: &DocShard, conn_id: ConnId) {
    let state = shard.lock().await;

    let state_vector = state.doc.transact().state_vector().encode_v1();
    state.send_to(conn_id, Message::Sync(SyncMessage::Step1(state_vector)).encode());

    if !state.awareness.is_empty() {
        let snapshot = state.awareness.snapshot();
        state.send_to(conn_id, Message::Awareness(snapshot.encode()).encode());
    }
}

/// Process one inbound frame from `conn_id`.
///
/// Errors mean "this frame was dropped"; the caller logs them and keeps
/// the session live.
pub async fn handle_frame(
    shard: &DocShard,
    conn_id: ConnId,
    frame: &[u8],
) -> Result<(), SessionError> {
    match Message::decode(frame)? {
        Message::Sync(SyncMessage::Step1(remote)) => handle_step1(shard, conn_id, &remote).await,
        // Step 2 and incremental updates carry the same payload and get
        // the same treatment.
        Message::Sync(SyncMessage::Step2(update) | SyncMessage::Update(update)) => {
            handle_update(shard, conn_id, update).await
        }
        Message::Awareness(payload) => handle_awareness(shard, conn_id, &payload).await,
    }
}

/// The client told us what it has; answer with exactly the bytes it is
/// missing, to the sender only.
async fn handle_step1(
    shard: &DocShard,
    conn_id: ConnId,
    remote_state_vector: &[u8],
) -> Result<(), SessionError> {
    let remote = StateVector::decode_v1(remote_state_vector)
        .map_err(|e| SessionError::ReplicaApply(e.to_string()))?;

    let state = shard.lock().await;
    let diff = state.doc.transact().encode_state_as_update_v1(&remote);
    trace!(doc = %shard.name(), conn = %conn_id, diff_bytes = diff.len(), "answering sync step 1");
    state.send_to(conn_id, Message::Sync(SyncMessage::Step2(diff)).encode());
    Ok(())
}

/// Apply an incoming update to the replica and, when it changed the
/// replica state, relay the same bytes to every sibling connection.
/// The sender never hears its own update back.
async fn handle_update(
    shard: &DocShard,
    conn_id: ConnId,
    update_bytes: Vec<u8>,
) -> Result<(), SessionError> {
    let state = shard.lock().await;
    // Decoded after the lock is held: the decoded update is not Send
    // and must never live across an await point.
    let changed = {
        let update = Update::decode_v1(&update_bytes)
            .map_err(|e| SessionError::ReplicaApply(e.to_string()))?;
        let mut txn = state.doc.transact_mut();
        // Full-state comparison rather than state vectors: delete-only
        // updates advance no clock but still change the replica.
        let before = txn.encode_state_as_update_v1(&StateVector::default());
        txn.apply_update(update).map_err(|e| SessionError::ReplicaApply(e.to_string()))?;
        txn.encode_state_as_update_v1(&StateVector::default()) != before
    };

    if changed {
        let frame = Message::Sync(SyncMessage::Update(update_bytes)).encode();
        let sent = state.broadcast_except(conn_id, &frame);
        trace!(doc = %shard.name(), conn = %conn_id, recipients = sent, "relayed update");
    }
    Ok(())
}

/// Merge an awareness delta into the table, track which client ids the
/// connection owns, and rebroadcast the applied subset to everyone but
/// the origin.
async fn handle_awareness(
    shard: &DocShard,
    conn_id: ConnId,
    payload: &[u8],
) -> Result<(), SessionError> {
    let update = AwarenessUpdate::decode(payload)?;

    let mut state = shard.lock().await;
    let applied = state.awareness.apply(update);
    for entry in &applied.entries {
        match entry.state {
            Some(_) => state.own_clients(conn_id, [entry.client_id]),
            None => state.disown_client(conn_id, entry.client_id),
        }
    }

    if !applied.is_empty() {
        let frame = Message::Awareness(applied.encode()).encode();
        let sent = state.broadcast_except(conn_id, &frame);
        trace!(
            doc = %shard.name(),
            conn = %conn_id,
            clients = applied.entries.len(),
            recipients = sent,
            "relayed awareness change"
        );
    }
    Ok(())
}
