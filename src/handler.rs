//! Handler trait, the async-failure wrap, and type erasure.
//!
//! # How failures reach the catcher
//!
//! The router stores handlers of *different* concrete types in one map, so
//! we erase them behind `dyn ErasedHandler`. Erasure is also where the
//! async-failure wrap happens: every handler — infallible or not — is
//! lifted at registration time to the uniform signature
//!
//! ```text
//! Fn(Request) -> BoxFuture<Result<Response, Fault>>
//! ```
//!
//! An `Ok` passes the handler's own response through untouched. An `Err`
//! is the error-propagation channel: dispatch hands the [`Fault`] to the
//! installed catcher instead of letting it vanish. Because the lift happens
//! exactly once, at registration, a single failure can never be forwarded
//! twice no matter how the handler was composed.
//!
//! The chain from user code to vtable call:
//!
//! ```text
//! async fn get_user(req: Request) -> Result<Response, Fault> { … }
//!        ↓ router.get("/user/{id}", get_user)
//! get_user.into_boxed_handler()                    ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_user))                    ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_user(req).await.into_outcome() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Fault;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// What dispatch sees from every handler: the response, or the failure to
/// forward into the catcher.
pub type Outcome = Result<Response, Fault>;

/// A heap-allocated, type-erased future resolving to an [`Outcome`].
///
/// `Pin<Box<…>>` because the runtime polls the future in place;
/// `Send + 'static` so tokio may move it across threads.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Infallible returns (`Response`, strings) always yield `Ok`. Fallible
/// handlers return `Result<R, E>` for any `E: Into<Fault>` — that is,
/// [`AppError`](crate::AppError), boxed errors, or bare message strings —
/// and the `Err` arm is what flows to the catcher.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Outcome {
        Ok(self)
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl<R, E> IntoOutcome for Result<R, E>
where
    R: IntoResponse,
    E: Into<Fault>,
{
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(r) => Ok(r.into_response()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` of the shape:
///
/// ```text
/// async fn name(req: Request) -> impl IntoOutcome
/// ```
///
/// which covers both infallible handlers returning a [`Response`] and
/// fallible ones returning `Result<Response, Fault>` (or anything
/// convertible to those).
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper holding a concrete handler `F`, bridging the typed world
/// to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // Call the wrapped function, then lift its concrete return type to
        // the uniform Outcome so the box matches the trait signature.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
