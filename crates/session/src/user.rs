//! The `User` model: identity shared across a user's concurrent sessions.
//!
//! Grounded on the original `user.go`, minus its SQL-backed persistence
//! (`qsql.Lazy*` fields) and the external auth/token machinery, which are
//! out of scope here. `FormatName`/`ParseName` are carried because
//! [`crate::user_conn::UserConn`]'s copy-disambiguation and blocklist rules
//! depend on them.
//!
//! The original protects every mutable field with one coarse mutex by
//! convention; here that's split into a `std::sync::Mutex` actually holding
//! the data (required since `User` is shared behind an `Arc` across
//! sessions) plus the re-entrant [`Lock`], which callers take for multi-step
//! sequences (e.g. "check the blocklist, then append an invite"
//! atomically) spanning more than one field access.

use std::collections::HashSet;
use std::sync::Mutex;

use qws_sync::Lock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum AdminLevel {
    User = 0,
    MapCreator = 1,
    Mod = 2,
    Admin = 3,
    SuperAdmin = 4,
}

impl Default for AdminLevel {
    fn default() -> Self {
        Self::User
    }
}

/// A pending invitation (to a lobby, a friendship, etc.) extended to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "f")]
    pub from: String,
    #[serde(rename = "ty")]
    pub kind: u8,
    #[serde(rename = "tg")]
    pub target: i64,
}

struct Mutable {
    admin_level: AdminLevel,
    decoration: String,
    inventory: i64,
    blocked: HashSet<String>,
    invites: Vec<Invitation>,
}

/// Shared user identity. One `User` may back several concurrent
/// [`crate::user_conn::UserConn`]s (the `copy` disambiguator distinguishes
/// them).
pub struct User {
    pub id: i64,
    pub name: String,
    /// Coarse re-entrant lock for multi-step transactions over the fields
    /// below; see the module doc.
    pub lock: Lock,
    mutable: Mutex<Mutable>,
}

impl User {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: format_name(&name.into()),
            lock: Lock::new(),
            mutable: Mutex::new(Mutable {
                admin_level: AdminLevel::User,
                decoration: String::new(),
                inventory: 0,
                blocked: HashSet::new(),
                invites: Vec::new(),
            }),
        }
    }

    #[allow(clippy::expect_used)]
    fn guard(&self) -> std::sync::MutexGuard<'_, Mutable> {
        self.mutable.lock().expect("user mutex poisoned")
    }

    pub fn admin_level(&self) -> AdminLevel {
        self.guard().admin_level
    }

    pub fn set_admin_level(&self, level: AdminLevel) {
        self.guard().admin_level = level;
    }

    pub fn decoration(&self) -> String {
        self.guard().decoration.clone()
    }

    pub fn inventory(&self) -> i64 {
        self.guard().inventory
    }

    pub fn invites(&self) -> Vec<Invitation> {
        self.guard().invites.clone()
    }

    pub fn add_invite(&self, invite: Invitation) {
        self.guard().invites.push(invite);
    }

    /// Remove the first invitation equal to `invite`, if present.
    pub fn remove_invite(&self, invite: &Invitation) {
        self.guard().invites.retain(|i| i != invite);
    }

    pub fn block(&self, name: impl Into<String>) {
        self.guard().blocked.insert(name.into());
    }

    pub fn unblock(&self, name: &str) {
        self.guard().blocked.remove(name);
    }

    /// Whether `display_name` appears on this user's blocklist. Guests and
    /// bots (no registered id) are checked by their full display name,
    /// including the `(copy)` disambiguator; registered users by their bare
    /// name.
    pub fn is_blocked(&self, display_name: &str) -> bool {
        self.guard().blocked.contains(display_name)
    }
}

/// Capitalise the first character, lowercase the rest.
pub fn format_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}

/// Parse a `Name(copy)` display string back into its parts. Returns a copy
/// of `-1` if there is no trailing `(N)` or it fails to parse.
pub fn parse_name(display: &str) -> (String, i64) {
    match display.find('(') {
        Some(open) if display.ends_with(')') => {
            let digits = &display[open + 1..display.len() - 1];
            match digits.parse::<i64>() {
                Ok(copy) => (format_name(&display[..open]), copy),
                Err(_) => (format_name(display), -1),
            }
        },
        _ => (format_name(display), -1),
    }
}
