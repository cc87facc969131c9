//! The three handler shapes a command code can be registered against.
//!
//! Grounded on the original `router.go`/`dynamic.go`/`returning.go`. The
//! dynamic handler replaces Go's runtime reflection (`reflect.New`,
//! `reflect.Value.Call`) with a generic wrapper: the parameter and return
//! types are fixed at registration time by the closure's own signature, so
//! decoding and reply-shaping happen through ordinary trait dispatch instead
//! of reflection.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use qws_sync::CancelToken;
use qws_wire::RawMessage;
use qws_wire::codes::info_kind;

use crate::user_conn::UserConn;

/// What a handler actually does with `RawMessage`, given the connection that
/// sent it. Implemented by [`PlainHandler`], [`ReturningHandler`], and
/// [`DynamicHandler`]; the router only ever talks to this trait.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn serve(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage);
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Plain ────────────────────────────────────────────────────────────────

/// A handler that only pushes; it never answers a request directly (the
/// router still synthesises an empty response if the caller set an id).
pub struct PlainHandler<F> {
    f: F,
}

impl<F> PlainHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F> Handler for PlainHandler<F>
where
    F: for<'a> Fn(&'a CancelToken, &'a UserConn, &'a RawMessage) -> BoxFuture<'a, ()>
        + Send
        + Sync,
{
    async fn serve(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage) {
        (self.f)(token, conn, m).await;
    }
}

/// Wrap a plain async closure as a [`PlainHandler`].
#[macro_export]
macro_rules! plain_handler {
    ($f:expr) => {
        $crate::handlers::PlainHandler::new(move |token, conn, m| {
            Box::pin($f(token, conn, m)) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>
        })
    };
}

// ── Returning ────────────────────────────────────────────────────────────

/// A handler returning an arbitrary serialisable value. If the request had
/// an id, the value becomes the correlated response; otherwise a non-empty
/// string return is surfaced as a chat info message.
pub struct ReturningHandler<F> {
    f: F,
}

impl<F> ReturningHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F> Handler for ReturningHandler<F>
where
    F: for<'a> Fn(&'a CancelToken, &'a UserConn, &'a RawMessage) -> BoxFuture<'a, ReturnValue>
        + Send
        + Sync,
{
    async fn serve(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage) {
        let value = (self.f)(token, conn, m).await;
        reply(conn, m, value);
    }
}

/// What a [`ReturningHandler`] or [`DynamicHandler`] produced.
pub enum ReturnValue {
    Empty,
    Text(String),
    Json(Value),
}

/// Implemented for the shapes a handler may return, so call sites can write
/// plain Rust values instead of constructing [`ReturnValue`] by hand.
pub trait IntoHandlerReply {
    fn into_reply(self) -> ReturnValue;
}

impl IntoHandlerReply for () {
    fn into_reply(self) -> ReturnValue {
        ReturnValue::Empty
    }
}

impl IntoHandlerReply for String {
    fn into_reply(self) -> ReturnValue {
        if self.is_empty() {
            ReturnValue::Empty
        } else {
            ReturnValue::Text(self)
        }
    }
}

/// Wrapper for a handler that wants to return arbitrary JSON data rather
/// than a plain string.
pub struct Json<T>(pub T);

impl<T: Serialize> IntoHandlerReply for Json<T> {
    fn into_reply(self) -> ReturnValue {
        match serde_json::to_value(self.0) {
            Ok(value) => ReturnValue::Json(value),
            Err(err) => {
                warn!(error = %err, "handler return value failed to serialise");
                ReturnValue::Empty
            },
        }
    }
}

fn reply(conn: &UserConn, m: &RawMessage, value: ReturnValue) {
    let id = m.id();
    if id != 0 {
        m.take_id();
        let data = match value {
            ReturnValue::Empty => None,
            ReturnValue::Text(s) => Some(Value::String(s)),
            ReturnValue::Json(v) => Some(v),
        };
        conn.send_response(id, data);
        return;
    }

    if let ReturnValue::Text(text) = value {
        conn.send_info(info_kind::PLAIN, text);
    }
}

// ── Dynamic ──────────────────────────────────────────────────────────────

/// A handler that decodes `m.data` into `T` before invoking the underlying
/// function. A decode failure is logged and the message is dropped — no
/// response is synthesised, even if an id was set, matching the original's
/// "invalid ws parameter" behaviour.
pub struct DynamicHandler<T, R, F> {
    f: F,
    location: &'static str,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R, F> DynamicHandler<T, R, F> {
    pub fn new(f: F, location: &'static str) -> Self {
        Self {
            f,
            location,
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<T, R, F> Handler for DynamicHandler<T, R, F>
where
    T: DeserializeOwned + Send + Sync + 'static,
    R: IntoHandlerReply + Send + 'static,
    F: for<'a> Fn(&'a CancelToken, &'a UserConn, T) -> BoxFuture<'a, R> + Send + Sync,
{
    async fn serve(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage) {
        let decoded: T = match serde_json::from_value(m.data.clone()) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    at = self.location,
                    error = %err,
                    "invalid parameter for dynamic handler, dropping message"
                );
                return;
            },
        };
        let value = (self.f)(token, conn, decoded).await;
        reply(conn, m, value.into_reply());
    }
}

/// A handler taking no parameters at all (mirrors the original's
/// `DynamicHandler` with a nil `elType`).
pub struct UnitDynamicHandler<R, F> {
    f: F,
    _marker: PhantomData<fn() -> R>,
}

impl<R, F> UnitDynamicHandler<R, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait::async_trait]
impl<R, F> Handler for UnitDynamicHandler<R, F>
where
    R: IntoHandlerReply + Send + 'static,
    F: for<'a> Fn(&'a CancelToken, &'a UserConn) -> BoxFuture<'a, R> + Send + Sync,
{
    async fn serve(&self, token: &CancelToken, conn: &UserConn, m: &RawMessage) {
        let value = (self.f)(token, conn).await;
        reply(conn, m, value.into_reply());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Add {
        a: i64,
    }

    #[test]
    fn into_reply_empty_string_is_empty() {
        assert!(matches!("".to_string().into_reply(), ReturnValue::Empty));
        assert!(matches!("hi".to_string().into_reply(), ReturnValue::Text(_)));
    }

    #[test]
    fn json_reply_serialises() {
        let reply = Json(Add { a: 1 }).into_reply();
        match reply {
            ReturnValue::Json(v) => assert_eq!(v["a"], 1),
            _ => panic!("expected json reply"),
        }
    }
}
