//! Deferred values.
//!
//! A [`LazyValue`] is a value whose concrete form comes from invoking a
//! callable, possibly asynchronously. The serializer never forces it: it
//! emits a [`LazyTokens`] placeholder that serializes the eventual value when
//! the placeholder itself is invoked, and the deserializer does the mirror
//! image. Whoever consumes the stream decides when to resolve.
//!
//! [`Deferred`] is the result of such an invocation: either already
//! available, or a boxed future the caller must await.
//!
//! ```rust
//! use cachegraph::{Deferred, LazyValue, Value};
//!
//! let lazy = LazyValue::ready(Value::from("computed"));
//! match lazy.get() {
//!     Deferred::Ready(value) => assert_eq!(value.unwrap(), Value::from("computed")),
//!     Deferred::Pending(_) => unreachable!(),
//! }
//! ```

use crate::{Result, Serialized, Value};
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

/// Either a finished value or a computation still in flight.
pub enum Deferred<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T: Send + 'static> Deferred<T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Deferred::Pending(future.boxed())
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Returns the value if it is already available.
    pub fn into_ready(self) -> Option<T> {
        match self {
            Deferred::Ready(value) => Some(value),
            Deferred::Pending(_) => None,
        }
    }

    /// Transforms the eventual value, staying synchronous when possible.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Deferred::Ready(value) => Deferred::Ready(f(value)),
            Deferred::Pending(future) => Deferred::Pending(future.map(f).boxed()),
        }
    }

    /// Chains a computation that may itself be deferred, flattening the result.
    pub fn and_then<U, F>(self, f: F) -> Deferred<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Deferred<U> + Send + 'static,
    {
        match self {
            Deferred::Ready(value) => f(value),
            Deferred::Pending(future) => {
                Deferred::Pending(async move { f(future.await).resolve().await }.boxed())
            }
        }
    }

    /// Waits for the value.
    pub async fn resolve(self) -> T {
        match self {
            Deferred::Ready(value) => value,
            Deferred::Pending(future) => future.await,
        }
    }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
    type Output = T;
    type IntoFuture = BoxFuture<'static, T>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Deferred::Ready(value) => futures::future::ready(value).boxed(),
            Deferred::Pending(future) => future,
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(_) => f.write_str("Deferred::Ready(..)"),
            Deferred::Pending(_) => f.write_str("Deferred::Pending(..)"),
        }
    }
}

type LazyFn<T> = dyn Fn() -> Deferred<Result<T>> + Send + Sync;

/// A value produced on demand.
///
/// Each invocation runs the callable again; lazy values are never
/// deduplicated by the serializer.
#[derive(Clone)]
pub struct LazyValue(Arc<LazyFn<Value>>);

impl LazyValue {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Deferred<Result<Value>> + Send + Sync + 'static,
    {
        LazyValue(Arc::new(f))
    }

    /// A lazy value that always yields a clone of `value`.
    pub fn ready(value: Value) -> Self {
        LazyValue::new(move || Deferred::Ready(Ok(value.clone())))
    }

    /// A lazy value backed by a future factory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::{LazyValue, Value};
    ///
    /// let lazy = LazyValue::from_future(|| async { Ok(Value::from(5)) });
    /// let value = futures::executor::block_on(lazy.get().resolve()).unwrap();
    /// assert_eq!(value, Value::from(5));
    /// ```
    pub fn from_future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        LazyValue::new(move || Deferred::pending(f()))
    }

    /// Invokes the callable.
    pub fn get(&self) -> Deferred<Result<Value>> {
        (self.0)()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &LazyValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for LazyValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for LazyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyValue(..)")
    }
}

/// A stream section produced on demand.
///
/// Invoking it yields a complete, independently versioned stream.
#[derive(Clone)]
pub struct LazyTokens(Arc<LazyFn<Serialized>>);

impl LazyTokens {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Deferred<Result<Serialized>> + Send + Sync + 'static,
    {
        LazyTokens(Arc::new(f))
    }

    /// Placeholder for a section that was already materialized, e.g. read
    /// back from disk by a framing layer.
    pub fn ready(serialized: Serialized) -> Self {
        LazyTokens::new(move || Deferred::Ready(Ok(serialized.clone())))
    }

    /// Invokes the callable.
    pub fn get(&self) -> Deferred<Result<Serialized>> {
        (self.0)()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &LazyTokens) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for LazyTokens {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for LazyTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyTokens(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_map_stays_ready() {
        let deferred = Deferred::ready(2).map(|n| n * 10);
        assert_eq!(deferred.into_ready(), Some(20));
    }

    #[test]
    fn test_and_then_flattens_pending() {
        let deferred = Deferred::pending(async { 3 })
            .and_then(|n| Deferred::pending(async move { n + 1 }));
        assert!(!deferred.is_ready());
        assert_eq!(block_on(deferred.resolve()), 4);
    }

    #[test]
    fn test_into_future() {
        let value = block_on(async { Deferred::ready("done").await });
        assert_eq!(value, "done");
    }

    #[test]
    fn test_lazy_value_reinvokes() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = Arc::clone(&counter);
        let lazy = LazyValue::new(move || {
            let n = seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Deferred::Ready(Ok(Value::from(n)))
        });
        assert_eq!(lazy.get().into_ready().unwrap().unwrap(), Value::from(0usize));
        assert_eq!(lazy.get().into_ready().unwrap().unwrap(), Value::from(1usize));
    }
}
