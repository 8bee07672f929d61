//! Object-graph serialization.
//!
//! This module provides [`EncodeContext`], the graph walker that turns a list
//! of root [`Value`]s into a flat token stream. Codecs receive it as their
//! `write` primitive; every nested value they write is routed back through the
//! same walk, so objects, collections and primitives interleave in one
//! stream.
//!
//! ## Overview
//!
//! For every value, in order:
//!
//! 1. A value already in the reference table becomes a back-reference.
//! 2. Byte buffers are registered and emitted literally.
//! 3. Objects are checked for cycles, resolved through the registry, tagged
//!    (delta-encoded when the tag was seen before), encoded by their codec,
//!    closed with the end marker and only then registered.
//! 4. Non-empty strings are registered and emitted; empty strings are not.
//! 5. `null`, `undefined` become escape pairs.
//! 6. Lazy values become [`LazyTokens`] placeholders.
//! 7. Everything else is emitted literally.
//!
//! Most users should go through [`ObjectMiddleware::serialize`]:
//!
//! ```rust
//! use cachegraph::{serialize, Token, Value};
//!
//! let serialized = serialize(&[Value::from("a"), Value::from("a")]).unwrap();
//! let tokens = serialized.into_tokens().unwrap();
//! assert_eq!(
//!     tokens,
//!     vec![Token::from(1), Token::from("a"), Token::Null, Token::from(-1)]
//! );
//! ```

use crate::deferred::{LazyTokens, LazyValue};
use crate::middleware::ObjectMiddleware;
use crate::registry::Tag;
use crate::token::{ESCAPE, ESCAPE_END_OBJECT, ESCAPE_ESCAPE_VALUE, ESCAPE_UNDEFINED};
use crate::{Error, Object, Result, Token, Value};
use bytes::Bytes;
use indexmap::IndexSet;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key of the reference table.
///
/// Objects and buffers are keyed by identity and hold a handle so their
/// address cannot be reused by a temporary during the call. Strings are
/// keyed by content.
enum ReferenceKey {
    Object(Object),
    Buffer(Bytes),
    String(Arc<str>),
}

impl PartialEq for ReferenceKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReferenceKey::Object(a), ReferenceKey::Object(b)) => a.ptr_eq(b),
            (ReferenceKey::Buffer(a), ReferenceKey::Buffer(b)) => {
                a.as_ptr() == b.as_ptr() && a.len() == b.len()
            }
            (ReferenceKey::String(a), ReferenceKey::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ReferenceKey {}

impl Hash for ReferenceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ReferenceKey::Object(o) => {
                0u8.hash(state);
                o.address().hash(state);
            }
            ReferenceKey::Buffer(b) => {
                1u8.hash(state);
                (b.as_ptr() as usize).hash(state);
                b.len().hash(state);
            }
            ReferenceKey::String(s) => {
                2u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// Identity of an object currently being encoded.
struct OpenObject(Object);

impl PartialEq for OpenObject {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Eq for OpenObject {}

impl Hash for OpenObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.address().hash(state);
    }
}

/// The `write` side of the codec contract and the state of one serialize call.
///
/// Created fresh for every call; the reference table, type-lookup table and
/// cycle set never outlive it.
pub struct EncodeContext<'m> {
    middleware: &'m ObjectMiddleware,
    output: Vec<Token>,
    current_pos: usize,
    referenceable: HashMap<ReferenceKey, usize>,
    current_pos_type_lookup: usize,
    object_type_lookup: HashMap<Tag, usize>,
    cycle_stack: IndexSet<OpenObject>,
}

impl<'m> EncodeContext<'m> {
    pub(crate) fn new(middleware: &'m ObjectMiddleware) -> Self {
        let mut output = Vec::with_capacity(64);
        output.push(Token::from(middleware.options().version));
        EncodeContext {
            middleware,
            output,
            current_pos: 0,
            referenceable: HashMap::new(),
            current_pos_type_lookup: 0,
            object_type_lookup: HashMap::new(),
            cycle_stack: IndexSet::new(),
        }
    }

    /// Writes one nested value.
    ///
    /// Codecs call this once per field, in a fixed order that their `decode`
    /// reads back.
    pub fn write<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        self.process(&value.into())
    }

    /// Number of objects currently open on the path from the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.cycle_stack.len()
    }

    pub(crate) fn into_tokens(self) -> Vec<Token> {
        self.output
    }

    fn add_referenceable(&mut self, key: ReferenceKey) {
        self.referenceable.insert(key, self.current_pos);
        self.current_pos += 1;
    }

    fn emit_reference(&mut self, position: usize) {
        // Positions stay far below i64::MAX; the delta is always negative
        let delta = position as i64 - self.current_pos as i64;
        self.output.push(ESCAPE);
        self.output.push(Token::from(delta));
    }

    pub(crate) fn process(&mut self, value: &Value) -> Result<()> {
        if let Some(key) = reference_key(value) {
            if let Some(&position) = self.referenceable.get(&key) {
                self.emit_reference(position);
                return Ok(());
            }
        }

        match value {
            Value::Buffer(buffer) => {
                self.add_referenceable(ReferenceKey::Buffer(buffer.clone()));
                self.output.push(Token::Buffer(buffer.clone()));
            }
            Value::Object(object) => self.process_object(object)?,
            Value::String(s) => {
                // Empty strings are shorter re-emitted than referenced
                if !s.is_empty() {
                    self.add_referenceable(ReferenceKey::String(Arc::clone(s)));
                }
                self.output.push(Token::String(Arc::clone(s)));
            }
            Value::Null => {
                self.output.push(ESCAPE);
                self.output.push(ESCAPE_ESCAPE_VALUE);
            }
            Value::Lazy(lazy) => {
                let tokens = self.defer(lazy);
                self.output.push(Token::Lazy(tokens));
            }
            Value::Undefined => {
                self.output.push(ESCAPE);
                self.output.push(ESCAPE_UNDEFINED);
            }
            Value::Bool(b) => self.output.push(Token::Bool(*b)),
            Value::Number(n) => self.output.push(Token::Number(*n)),
        }
        Ok(())
    }

    fn process_object(&mut self, object: &Object) -> Result<()> {
        let open = OpenObject(object.clone());
        if self.cycle_stack.contains(&open) {
            let chain: Vec<&str> = self
                .cycle_stack
                .iter()
                .map(|open| open.0.kind().name())
                .chain(std::iter::once(object.kind().name()))
                .collect();
            return Err(Error::circular_reference(&chain));
        }
        if let Some(limit) = self.middleware.options().max_depth {
            if self.cycle_stack.len() >= limit {
                return Err(Error::depth_limit_exceeded(limit));
            }
        }

        let registration = self.middleware.registry().lookup_by_kind(object)?;
        let tag = registration.tag();
        match self.object_type_lookup.get(tag) {
            Some(&last_index) => {
                let delta = (self.current_pos_type_lookup - last_index) as i64;
                self.output.push(ESCAPE);
                self.output.push(Token::from(delta));
            }
            None => {
                self.object_type_lookup
                    .insert(tag.clone(), self.current_pos_type_lookup);
                self.current_pos_type_lookup += 1;
                self.output.push(ESCAPE);
                self.output.push(Token::String(Arc::clone(tag.origin())));
                self.output.push(tag.discriminator().to_token());
            }
        }

        self.cycle_stack.insert(open);
        let result = registration.codec().encode(object, self);
        self.cycle_stack.pop();
        result?;

        self.output.push(ESCAPE);
        self.output.push(ESCAPE_END_OBJECT);
        self.add_referenceable(ReferenceKey::Object(object.clone()));
        Ok(())
    }

    /// Wraps a lazy value so that invoking the placeholder serializes the
    /// eventual value in a fresh call.
    fn defer(&self, lazy: &LazyValue) -> LazyTokens {
        let middleware = self.middleware.clone();
        let lazy = lazy.clone();
        LazyTokens::new(move || {
            let middleware = middleware.clone();
            lazy.get().map(move |result| {
                let value = result?;
                middleware.serialize(std::slice::from_ref(&value))
            })
        })
    }
}

fn reference_key(value: &Value) -> Option<ReferenceKey> {
    match value {
        Value::Object(o) => Some(ReferenceKey::Object(o.clone())),
        Value::Buffer(b) => Some(ReferenceKey::Buffer(b.clone())),
        Value::String(s) if !s.is_empty() => Some(ReferenceKey::String(Arc::clone(s))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::token::ESCAPE;
    use crate::{ObjectMiddleware, Record, Serialized, Token, Value};

    fn tokens(values: &[Value]) -> Vec<Token> {
        match ObjectMiddleware::default().serialize(values).unwrap() {
            Serialized::Tokens(tokens) => tokens,
            Serialized::NotSerializable => panic!("Expected tokens"),
        }
    }

    #[test]
    fn test_primitives_emit_literally() {
        assert_eq!(
            tokens(&[Value::from(7), Value::Bool(true), Value::from(2.5)]),
            vec![Token::from(1), Token::from(7), Token::Bool(true), Token::from(2.5)]
        );
    }

    #[test]
    fn test_null_and_undefined_are_escaped() {
        assert_eq!(
            tokens(&[Value::Null, Value::Undefined]),
            vec![Token::from(1), ESCAPE, Token::Null, ESCAPE, Token::Bool(false)]
        );
    }

    #[test]
    fn test_empty_strings_are_never_referenced() {
        assert_eq!(
            tokens(&[Value::from(""), Value::from("")]),
            vec![Token::from(1), Token::from(""), Token::from("")]
        );
    }

    #[test]
    fn test_reference_offsets_count_every_registration() {
        let stream = tokens(&[
            Value::from("x"),
            Value::from("y"),
            Value::from("z"),
            Value::from("x"),
        ]);
        assert_eq!(&stream[4..], &[ESCAPE, Token::from(-3)]);
    }

    #[test]
    fn test_buffers_dedupe_by_identity() {
        let shared = bytes::Bytes::from(vec![1u8, 2, 3]);
        let copy = bytes::Bytes::from(vec![1u8, 2, 3]);
        let stream = tokens(&[
            Value::Buffer(shared.clone()),
            Value::Buffer(copy.clone()),
            Value::Buffer(shared.clone()),
        ]);
        assert_eq!(
            stream,
            vec![
                Token::from(1),
                Token::Buffer(shared),
                Token::Buffer(copy),
                ESCAPE,
                Token::from(-2),
            ]
        );
    }

    #[test]
    fn test_object_registered_after_its_fields() {
        let mut record = Record::new();
        record.insert("k".to_string(), Value::from("v"));
        let value = Value::record(record);
        let stream = tokens(&[value.clone(), Value::from("k"), value]);

        // "k" -> 0, "v" -> 1, record -> 2
        let tail = &stream[stream.len() - 4..];
        assert_eq!(tail, &[ESCAPE, Token::from(-3), ESCAPE, Token::from(-1)]);
    }
}
