//! The set of connections sharing a broadcast domain (a lobby, or the whole
//! server), with prepare-once/enqueue-many fan-out and admin-level-aware
//! visibility filtering.
//!
//! Grounded on the original `userlist.go`: a map keyed by session id, with
//! `Broadcast`/`BroadcastExcept`/`BroadcastFilter` built on top of one
//! [`PreparedPayload`] per call rather than one JSON encode per recipient,
//! and a player-list marshaller that hides ghosted connections from anyone
//! below [`AdminLevel::Mod`] — see [`crate::visible::serialize_filtered`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use qws_wire::{MessageStore, encode_outbound};

use crate::user::AdminLevel;
use crate::user_conn::UserConn;
use crate::visible::serialize_filtered;

#[derive(Default)]
struct Members {
    by_session: HashMap<i64, UserConn>,
}

/// A broadcast domain: every [`UserConn`] registered here receives pushes
/// sent through `broadcast*`. Safe to share across tasks; all mutating
/// operations take only a brief internal lock.
pub struct UserList {
    members: Mutex<Members>,
    store: Arc<MessageStore>,
}

impl UserList {
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self {
            members: Mutex::new(Members::default()),
            store,
        }
    }

    #[allow(clippy::expect_used)]
    fn guard(&self) -> std::sync::MutexGuard<'_, Members> {
        self.members.lock().expect("user list mutex poisoned")
    }

    pub fn add(&self, conn: UserConn) {
        self.guard().by_session.insert(conn.s_id(), conn);
    }

    pub fn remove(&self, s_id: i64) {
        self.guard().by_session.remove(&s_id);
    }

    pub fn get(&self, s_id: i64) -> Option<UserConn> {
        self.guard().by_session.get(&s_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All current members, snapshotted. Cheap: each `UserConn` clone is
    /// just another handle onto shared state.
    pub fn members(&self) -> Vec<UserConn> {
        self.guard().by_session.values().cloned().collect()
    }

    /// Encode `data` once and enqueue it onto every current member.
    pub fn broadcast(&self, cmd: i16, data: impl Serialize) {
        self.broadcast_filter(cmd, data, |_| true);
    }

    /// Like [`Self::broadcast`], skipping `excluded_session`.
    pub fn broadcast_except(&self, cmd: i16, data: impl Serialize, excluded_session: i64) {
        self.broadcast_filter(cmd, data, |conn| conn.s_id() != excluded_session);
    }

    /// Like [`Self::broadcast`], only reaching members for which `filter`
    /// returns true.
    pub fn broadcast_filter(&self, cmd: i16, data: impl Serialize, filter: impl Fn(&UserConn) -> bool) {
        let message = qws_wire::Message::push(cmd, match serde_json::to_value(data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "failed to serialise broadcast payload");
                return;
            },
        });
        let payload = match encode_outbound(&message, &self.store) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to encode broadcast payload");
                return;
            },
        };

        for conn in self.members() {
            if filter(&conn) {
                conn.send_prepared(payload.clone());
            }
        }
    }

    /// Reach only members whose admin level is at or above `minimum`.
    pub fn broadcast_by_admin_level(&self, cmd: i16, data: impl Serialize, minimum: AdminLevel) {
        self.broadcast_filter(cmd, data, |conn| conn.admin_level() >= minimum);
    }

    /// Partition the current membership by admin level, for callers that
    /// need to treat staff and regular players differently beyond a simple
    /// threshold filter.
    pub fn group_by_admin_level(&self) -> HashMap<AdminLevel, Vec<UserConn>> {
        let mut groups: HashMap<AdminLevel, Vec<UserConn>> = HashMap::new();
        for conn in self.members() {
            groups.entry(conn.admin_level()).or_default().push(conn);
        }
        groups
    }

    /// Serialise the player list for `viewer`: every member's `user_name`
    /// form, with ghosted members hidden from anyone below
    /// [`AdminLevel::Mod`].
    pub fn marshal_for(&self, viewer: &UserConn) -> serde_json::Value {
        struct Listing {
            ghosted: bool,
            name: serde_json::Value,
        }
        impl Serialize for Listing {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.name.serialize(serializer)
            }
        }

        let viewer_sees_ghosts = viewer.admin_level() >= AdminLevel::Mod;
        let entries: Vec<Listing> = self
            .members()
            .iter()
            .map(|c| Listing { ghosted: c.is_ghosted(), name: c.user_name() })
            .collect();

        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut out);
        if let Err(err) = serialize_filtered(&entries, |e| viewer_sees_ghosts || !e.ghosted, &mut serializer) {
            warn!(error = %err, "failed to serialise player list");
            return serde_json::Value::Array(Vec::new());
        }
        serde_json::from_slice(&out).unwrap_or(serde_json::Value::Array(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_reports_empty() {
        let list = UserList::new(MessageStore::new());
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.get(1).is_none());
    }
}
