// Server-side awareness table for one document.
//
// Maps connection-local client ids to their latest presence state.
// Entries are ephemeral: overwritten on each heartbeat, removed with a
// removal delta when the owning connection closes, never persisted.

use std::collections::HashMap;

use coedit_common::{AwarenessUpdate, AwarenessUpdateEntry, ClientState};

#[derive(Debug, Clone)]
struct TableEntry {
    clock: u64,
    state: ClientState,
}

/// Per-document presence table keyed by client id.
#[derive(Debug, Clone, Default)]
pub struct AwarenessTable {
    entries: HashMap<u64, TableEntry>,
}

impl AwarenessTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, client_id: u64) -> Option<&ClientState> {
        self.entries.get(&client_id).map(|entry| &entry.state)
    }

    /// Merge a decoded update into the table and return the subset
    /// that actually changed it, ready for rebroadcast.
    ///
    /// An entry wins when its clock is newer, or on a clock tie when it
    /// is a removal. Removals for client ids the relay never saw are
    /// dropped: in the star topology every peer learned its view from
    /// this table, so there is nothing to retract.
    pub fn apply(&mut self, update: AwarenessUpdate) -> AwarenessUpdate {
        let mut applied = Vec::new();
        for entry in update.entries {
            let accept = match self.entries.get(&entry.client_id) {
                Some(existing) => {
                    entry.clock > existing.clock
                        || (entry.clock == existing.clock && entry.state.is_none())
                }
                None => entry.state.is_some(),
            };
            if !accept {
                continue;
            }
            match &entry.state {
                Some(state) => {
                    self.entries.insert(
                        entry.client_id,
                        TableEntry { clock: entry.clock, state: state.clone() },
                    );
                }
                None => {
                    self.entries.remove(&entry.client_id);
                }
            }
            applied.push(entry);
        }
        AwarenessUpdate { entries: applied }
    }

    /// Expire client ids on disconnect, producing the removal delta to
    /// broadcast to surviving connections.
    pub fn remove_clients(&mut self, client_ids: impl IntoIterator<Item = u64>) -> AwarenessUpdate {
        let mut removed = Vec::new();
        for client_id in client_ids {
            if let Some(entry) = self.entries.remove(&client_id) {
                removed.push(AwarenessUpdateEntry {
                    client_id,
                    clock: entry.clock + 1,
                    state: None,
                });
            }
        }
        AwarenessUpdate { entries: removed }
    }

    /// Full-table update for a newly joined connection.
    pub fn snapshot(&self) -> AwarenessUpdate {
        let mut entries: Vec<AwarenessUpdateEntry> = self
            .entries
            .iter()
            .map(|(client_id, entry)| AwarenessUpdateEntry {
                client_id: *client_id,
                clock: entry.clock,
                state: Some(entry.state.clone()),
            })
            .collect();
        entries.sort_by_key(|entry| entry.client_id);
        AwarenessUpdate { entries }
    }
}
