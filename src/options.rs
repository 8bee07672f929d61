//! Configuration options for the object middleware.
//!
//! ## Examples
//!
//! ```rust
//! use cachegraph::{MiddlewareOptions, ObjectMiddleware, Registry};
//! use std::sync::Arc;
//!
//! let options = MiddlewareOptions::new().with_max_depth(64);
//! let middleware = ObjectMiddleware::with_options(Arc::new(Registry::new()), options);
//! assert_eq!(middleware.options().max_depth, Some(64));
//! ```

use crate::token::CURRENT_VERSION;

/// Nesting limit used unless [`MiddlewareOptions::with_max_depth`] or
/// [`MiddlewareOptions::without_max_depth`] says otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Configuration options for serialization and deserialization.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{MiddlewareOptions, DEFAULT_MAX_DEPTH};
///
/// // Defaults: current format version, bounded nesting
/// let options = MiddlewareOptions::new();
/// assert_eq!(options.version, 1);
/// assert_eq!(options.max_depth, Some(DEFAULT_MAX_DEPTH));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiddlewareOptions {
    /// Version written as, and expected in, the first token of every stream.
    pub version: i64,
    /// Maximum number of nested object sections; `None` means unlimited.
    pub max_depth: Option<usize>,
}

impl Default for MiddlewareOptions {
    fn default() -> Self {
        MiddlewareOptions {
            version: CURRENT_VERSION,
            max_depth: Some(DEFAULT_MAX_DEPTH),
        }
    }
}

impl MiddlewareOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the format version.
    ///
    /// Streams written with one version are rejected by readers configured
    /// with another; bump it whenever a codec changes its field order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::MiddlewareOptions;
    ///
    /// let options = MiddlewareOptions::new().with_version(7);
    /// assert_eq!(options.version, 7);
    /// ```
    #[must_use]
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Limits how deeply object sections may nest, on both sides.
    ///
    /// Exceeding the limit fails with
    /// [`Error::DepthLimitExceeded`](crate::Error::DepthLimitExceeded)
    /// instead of exhausting the stack.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Removes the nesting limit.
    ///
    /// Only for trusted streams: a deeply nested stream then recurses until
    /// the stack runs out.
    #[must_use]
    pub fn without_max_depth(mut self) -> Self {
        self.max_depth = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_limit_builders() {
        assert_eq!(MiddlewareOptions::default().max_depth, Some(DEFAULT_MAX_DEPTH));
        assert_eq!(MiddlewareOptions::new().with_max_depth(8).max_depth, Some(8));
        assert_eq!(MiddlewareOptions::new().without_max_depth().max_depth, None);
    }
}
