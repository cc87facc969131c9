//! Command code spaces.
//!
//! Two disjoint numeric ranges: "global" codes below [`LOBBY_CMDS`], and
//! "lobby" codes at or above it. [`LOBBY_CMDS`] itself doubles as the
//! catch-all sentinel a lobby-wide handler can register against — see
//! `qws_session::router`.
//!
//! The named codes below are a small illustrative set (grounded in the
//! original `incmds`/`outcmds` packages) used by the demo handlers and
//! integration tests; the inventory/lobby/game business codes those packages
//! define are out of scope here.

/// First command code in the lobby space. Registering a handler at this
/// value makes it the fallback for any otherwise-unrouted lobby code.
pub const LOBBY_CMDS: i16 = 100;

/// Inbound command codes (client → server).
#[non_exhaustive]
pub mod in_cmd {
    pub const PING: i16 = 0;
    pub const CHAT_MESSAGE: i16 = 1;
    pub const FRIEND_INVITE: i16 = 2;
    pub const FRIEND_DECLINE: i16 = 3;
    pub const FRIEND_BLOCK: i16 = 4;

    pub const LOBBY_CMDS: i16 = super::LOBBY_CMDS;
    pub const LOBBY_JOIN: i16 = super::LOBBY_CMDS + 1;
}

/// Outbound command codes (server → client).
#[non_exhaustive]
pub mod out_cmd {
    pub const SESSION_ID: i16 = 0;
    pub const CHAT_MESSAGE: i16 = 1;
    pub const FRIEND_LIST: i16 = 2;
    pub const PLAYER_LIST: i16 = super::LOBBY_CMDS + 1;
}

/// `type` values used inside a chat/info frame's `data.type` field.
#[non_exhaustive]
pub mod info_kind {
    pub const PLAIN: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const WARNING: i32 = 2;
    pub const HELP_CATALOGUE: i32 = 6;
}
