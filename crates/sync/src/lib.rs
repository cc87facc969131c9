//! Concurrency primitives shared across the session framework: a context
//! scoped re-entrant lock, bounded publish/subscribe, and panic-safe task
//! spawning.

pub mod cancel;
pub mod error;
pub mod lock;
pub mod safe_spawn;
pub mod subscribe;

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use lock::Lock;
pub use safe_spawn::{safe_spawn, safe_spawn_logged};
pub use subscribe::{Subscribable, Subscription};
