//! # cachegraph
//!
//! Object-graph serialization middleware for persistent build caches.
//!
//! cachegraph turns a list of in-memory values (records, sequences, maps,
//! user-defined kinds, byte buffers, lazily computed values) into a flat
//! stream of primitive [`Token`]s, and back. A lower layer is expected to
//! pack that stream into bytes; this crate only handles the graph.
//!
//! ## Key Features
//!
//! - **Identity preserving**: an object, buffer or non-empty string seen twice
//!   is written once and referenced afterwards, so shared structure comes back
//!   shared
//! - **Compact type tags**: a kind's `(origin, discriminator)` tag is spelled
//!   out once per stream, then referenced by a small delta
//! - **Pluggable codecs**: any type can be registered with an [`ObjectCodec`],
//!   a [`Serializable`] impl or its serde derives
//! - **Graceful opt-out**: kinds marked as not serializable make the whole
//!   call yield [`Serialized::NotSerializable`] instead of failing
//! - **Deferred values**: [`LazyValue`]s travel as nested streams that are
//!   only produced when someone asks for them
//!
//! ## Quick Start
//!
//! ```rust
//! use cachegraph::{deserialize, serialize, value, Value};
//!
//! let module = value!({
//!     "id": "./src/index.js",
//!     "dependencies": ["./a.js", "./b.js"],
//!     "built": true
//! });
//!
//! let roots = vec![module.clone(), module];
//! let tokens = serialize(&roots).unwrap().into_tokens().unwrap();
//! let back = deserialize(tokens).unwrap();
//!
//! // The second root is a back-reference to the first
//! assert!(back[0].as_object().unwrap().ptr_eq(back[1].as_object().unwrap()));
//! ```
//!
//! ### Registering a Kind
//!
//! ```rust
//! use cachegraph::{
//!     DecodeContext, EncodeContext, ObjectMiddleware, Registry, Result, Serializable, Value,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug, PartialEq)]
//! struct Dependency {
//!     request: String,
//!     optional: bool,
//! }
//!
//! impl Serializable for Dependency {
//!     fn serialize(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
//!         ctx.write(self.request.as_str())?;
//!         ctx.write(self.optional)
//!     }
//!
//!     fn deserialize(ctx: &mut DecodeContext<'_>) -> Result<Self> {
//!         Ok(Dependency {
//!             request: ctx.read()?.expect_type()?,
//!             optional: ctx.read()?.expect_type()?,
//!         })
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry.make_serializable::<Dependency>("app/dependency", None::<&str>).unwrap();
//! let middleware = ObjectMiddleware::new(Arc::new(registry));
//!
//! let dep = Value::object(Dependency { request: "./a".into(), optional: false });
//! let tokens = middleware.serialize(&[dep.clone()]).unwrap().into_tokens().unwrap();
//! assert_eq!(middleware.deserialize(tokens).unwrap(), vec![dep]);
//! ```
//!
//! ## Stream Format
//!
//! See the [`token`] module for the grammar of the token stream.
//!
//! ## Safety Guarantees
//!
//! - No `unsafe` code blocks
//! - Corrupted streams surface as errors, never as panics
//! - Circular references are detected and reported with the offending chain
//!
//! ## Examples
//!
//! `demos/cache_roundtrip.rs` walks through a complete cache write and read.
//! Run it with `cargo run --example cache_roundtrip`.

pub mod bridge;
pub mod builtins;
pub mod de;
pub mod deferred;
pub mod diagnostic;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod options;
pub mod record;
pub mod registry;
pub mod ser;
pub mod token;
pub mod value;

pub use bridge::{from_value, to_value, SerdeCodec, ValueDeserializer, ValueSerializer};
pub use builtins::{ErrorKind, ErrorObject, RegExp, ValueMap, ValueSet};
pub use de::DecodeContext;
pub use deferred::{Deferred, LazyTokens, LazyValue};
pub use diagnostic::{Diagnostic, DIAGNOSTIC_ORIGIN};
pub use error::{Error, Result};
pub use middleware::ObjectMiddleware;
pub use options::{MiddlewareOptions, DEFAULT_MAX_DEPTH};
pub use record::{Record, Sequence};
pub use registry::{
    Discriminator, ObjectCodec, OriginLoader, Registration, Registry, Serializable,
    SerializableCodec, Tag,
};
pub use ser::EncodeContext;
pub use token::{Serialized, Token, CURRENT_VERSION};
pub use value::{Kind, KindId, Number, Object, Value};

/// Serialize `values` with the process-wide registry and default options.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{serialize, Token, Value};
///
/// let tokens = serialize(&[Value::Null]).unwrap().into_tokens().unwrap();
/// assert_eq!(tokens, vec![Token::from(1), Token::Null, Token::Null]);
/// ```
///
/// # Errors
///
/// Returns an error for unknown kinds, circular references and codec
/// failures. See [`ObjectMiddleware::serialize`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn serialize(values: &[Value]) -> Result<Serialized> {
    ObjectMiddleware::default().serialize(values)
}

/// Deserialize a token stream with the process-wide registry and default
/// options.
///
/// # Errors
///
/// Returns an error if the stream is corrupted or refers to a tag nobody
/// registered. See [`ObjectMiddleware::deserialize`].
#[must_use = "this returns the result of the operation, errors must be handled"]
pub fn deserialize(tokens: Vec<Token>) -> Result<Vec<Value>> {
    ObjectMiddleware::default().deserialize(tokens)
}
