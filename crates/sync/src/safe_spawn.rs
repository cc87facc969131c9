//! Spawn a background task that cannot take the process down with it.
//!
//! Grounded on the original `safe/safe.go`: a goroutine wrapped in a deferred
//! `recover()` that reports the panic instead of propagating it. The Rust
//! equivalent catches the unwind inside the spawned task itself, since a
//! panic that crosses `tokio::spawn` only poisons that task's `JoinHandle`,
//! it does not bring down the runtime — but nothing observes it unless we do.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawn `fut` on the current runtime. If it panics, `on_error` is invoked
/// with a human-readable description of the panic instead of letting it
/// propagate to the `JoinHandle`.
pub fn safe_spawn<F, E>(fut: F, on_error: E) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
    E: FnOnce(String) + Send + 'static,
{
    tokio::spawn(async move {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(()) => {},
            Err(panic) => {
                let message = panic_message(&panic);
                error!(panic = %message, "safe_spawn: recovered panic");
                on_error(message);
            },
        }
    })
}

/// As [`safe_spawn`], without an error callback: panics are only logged.
pub fn safe_spawn_logged<F>(fut: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    safe_spawn(fut, |_| {})
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn panic_is_captured_and_reported() {
        let reported = Arc::new(AtomicBool::new(false));
        let reported2 = reported.clone();

        let handle = safe_spawn(
            async {
                panic!("boom");
            },
            move |msg| {
                assert_eq!(msg, "boom");
                reported2.store(true, Ordering::SeqCst);
            },
        );

        handle.await.unwrap();
        assert!(reported.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn success_never_calls_on_error() {
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        let handle = safe_spawn(async {}, move |_| called2.store(true, Ordering::SeqCst));
        handle.await.unwrap();
        assert!(!called.load(Ordering::SeqCst));
    }
}
