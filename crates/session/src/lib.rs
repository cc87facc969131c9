//! Connection, routing, and command-dispatch machinery for a WebSocket
//! session server: the part of the framework that turns a raw socket into a
//! [`UserConn`] capable of receiving routed commands and participating in
//! broadcast domains.
//!
//! Built on [`qws_wire`] for the frame shapes and [`qws_sync`] for the
//! concurrency primitives (the re-entrant [`qws_sync::Lock`],
//! [`qws_sync::CancelToken`], [`qws_sync::Subscribable`]) that this crate's
//! components are assembled from.

pub mod cmd_router;
pub mod command_log;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod router;
pub mod user;
pub mod user_conn;
pub mod user_list;
pub mod visible;

pub use cmd_router::{CmdHandler, CmdRouter, Command};
pub use command_log::{CommandLog, NullCommandLog, RecordingCommandLog};
pub use connection::{Connection, LIVENESS_TIMEOUT, OUTBOUND_QUEUE_CAPACITY};
pub use error::{Error, Result};
pub use handlers::{DynamicHandler, Handler, IntoHandlerReply, Json, PlainHandler, ReturnValue, ReturningHandler, UnitDynamicHandler};
pub use router::Router;
pub use user::{AdminLevel, Invitation, User};
pub use user_conn::{CloseHook, CloseHookToken, UserConn, DISPATCH_TIMEOUT};
pub use user_list::UserList;
