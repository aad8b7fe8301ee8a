// Per-document replica registry.
//
// One `DocShard` per active document name, created lazily on the first
// connection and destroyed when the last one leaves. All shared state
// for a document (CRDT replica, awareness table, connection set) lives
// behind that shard's own mutex, so unrelated documents never contend.
// The registry map has a separate lock held only for membership
// changes; `resolve` registers the joining connection before releasing
// it, which serializes resolve against a racing `release` that would
// otherwise destroy the shard mid-join.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use yrs::Doc;

use crate::awareness::AwarenessTable;
use coedit_common::Message;

pub type ConnId = Uuid;

/// One registered connection: its outbound queue and the awareness
/// client ids it owns. The queue is unbounded so a broadcast under the
/// document lock never blocks on a slow socket; the actual write
/// happens in the connection's own writer task.
#[derive(Debug)]
pub struct Peer {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    owned_clients: HashSet<u64>,
}

/// Mutable state of one document replica.
#[derive(Debug)]
pub struct DocState {
    pub doc: Doc,
    pub awareness: AwarenessTable,
    peers: HashMap<ConnId, Peer>,
}

impl DocState {
    fn new() -> Self {
        Self { doc: Doc::new(), awareness: AwarenessTable::default(), peers: HashMap::new() }
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    /// Queue an encoded frame for one connection. A send failure means
    /// the peer's writer task already exited; teardown will reap it.
    pub fn send_to(&self, conn_id: ConnId, frame: Vec<u8>) {
        if let Some(peer) = self.peers.get(&conn_id) {
            let _ = peer.outbound.send(frame);
        }
    }

    /// Queue an encoded frame for every connection except the origin.
    /// Returns the number of recipients.
    pub fn broadcast_except(&self, origin: ConnId, frame: &[u8]) -> usize {
        let mut sent = 0;
        for (conn_id, peer) in &self.peers {
            if *conn_id == origin {
                continue;
            }
            if peer.outbound.send(frame.to_vec()).is_ok() {
                sent += 1;
            }
        }
        sent
    }

    /// Record that `conn_id` owns these awareness client ids, so they
    /// can be expired when the connection closes.
    pub fn own_clients(&mut self, conn_id: ConnId, client_ids: impl IntoIterator<Item = u64>) {
        if let Some(peer) = self.peers.get_mut(&conn_id) {
            peer.owned_clients.extend(client_ids);
        }
    }

    /// Forget ownership of a client id (the client retracted it).
    pub fn disown_client(&mut self, conn_id: ConnId, client_id: u64) {
        if let Some(peer) = self.peers.get_mut(&conn_id) {
            peer.owned_clients.remove(&client_id);
        }
    }
}

/// One active document: name plus lock-protected state.
#[derive(Debug)]
pub struct DocShard {
    name: String,
    state: Mutex<DocState>,
}

impl DocShard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, DocState> {
        self.state.lock().await
    }
}

/// Registry of all in-memory replicas, keyed by document name.
#[derive(Debug, Default)]
pub struct DocRegistry {
    docs: Mutex<HashMap<String, Arc<DocShard>>>,
}

impl DocRegistry {
    /// Get or lazily create the shard for `doc_name` and register the
    /// connection in its set.
    pub async fn resolve(
        &self,
        doc_name: &str,
        conn_id: ConnId,
        outbound: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Arc<DocShard> {
        let mut docs = self.docs.lock().await;
        let shard = docs
            .entry(doc_name.to_string())
            .or_insert_with(|| {
                info!(doc = %doc_name, "creating replica");
                Arc::new(DocShard {
                    name: doc_name.to_string(),
                    state: Mutex::new(DocState::new()),
                })
            })
            .clone();

        // Registered while the registry lock is still held: a
        // concurrent release cannot observe an empty set and destroy
        // the shard underneath this join.
        let mut state = shard.lock().await;
        state.peers.insert(conn_id, Peer { outbound, owned_clients: HashSet::new() });
        drop(state);
        shard
    }

    /// Remove the connection from its document. Expires the awareness
    /// client ids it owned (broadcasting the removal delta to the
    /// survivors) and discards the replica when the set empties.
    /// A no-op for unknown documents or already-released connections.
    pub async fn release(&self, doc_name: &str, conn_id: ConnId) {
        let mut docs = self.docs.lock().await;
        let Some(shard) = docs.get(doc_name).cloned() else {
            return;
        };

        let mut state = shard.lock().await;
        let Some(peer) = state.peers.remove(&conn_id) else {
            return;
        };

        let removal = state.awareness.remove_clients(peer.owned_clients);
        if !removal.is_empty() {
            let frame = Message::Awareness(removal.encode()).encode();
            state.broadcast_except(conn_id, &frame);
        }

        if state.peers.is_empty() {
            docs.remove(doc_name);
            info!(doc = %doc_name, "destroying replica, last connection closed");
        } else {
            debug!(doc = %doc_name, remaining = state.peers.len(), "connection released");
        }
    }

    pub async fn doc_count(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn connection_count(&self, doc_name: &str) -> Option<usize> {
        let shard = self.docs.lock().await.get(doc_name).cloned()?;
        let state = shard.lock().await;
        Some(state.connection_count())
    }
}
