//! Illustrative command registrations exercising [`qws_session::Router`] and
//! [`qws_session::CmdRouter`]: a chat command that either broadcasts or hands
//! off to a slash command, plus a couple of slash commands demonstrating
//! parameter splitting and list access through [`crate::state::AppState`].
//!
//! These are demo handlers, not a real game/chat protocol — the business
//! command set a production deployment would register is out of scope here;
//! see `qws_wire::codes`' module doc.

mod chat;
mod who;

use std::sync::Arc;

use qws_session::{CmdRouter, Result, Router, UserList};

/// Register every demo handler against `router` and return the populated
/// slash-command table. Fails only if two demo handlers collide on the same
/// command code, which would be a bug in this module.
pub async fn register(router: &Router, users: Arc<UserList>) -> Result<CmdRouter> {
    chat::register_router(router, users.clone()).await?;

    let mut cmd_router = CmdRouter::new();
    who::register(&mut cmd_router, users.clone());
    chat::register_commands(&mut cmd_router, users);
    Ok(cmd_router)
}
