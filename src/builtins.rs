//! Built-in kinds and their codecs.
//!
//! | Kind | Origin | Discriminator |
//! |------|--------|---------------|
//! | [`Record`], [`Sequence`] | `""` | unnamed (one shared codec) |
//! | [`ValueMap`] | `""` | `1` |
//! | [`ValueSet`] | `""` | `2` |
//! | [`RegExp`] | `""` | `3` |
//! | [`ErrorObject`] | `""` | `4` |
//! | [`Diagnostic`](crate::Diagnostic) | `cachegraph/diagnostic` | unnamed |
//!
//! Every codec here is a thin adapter over the generic `write`/`read`
//! primitives.

use crate::de::DecodeContext;
use crate::diagnostic::{Diagnostic, DIAGNOSTIC_ORIGIN};
use crate::registry::{Discriminator, ObjectCodec, Registry};
use crate::ser::EncodeContext;
use crate::{Error, Kind, KindId, Object, Record, Result, Sequence, Value};
use std::fmt;
use std::sync::Arc;

/// An insertion-ordered map with arbitrary value keys.
///
/// Keys are compared with `==`, so lookups are linear; it is meant for
/// faithfully carrying maps through the cache, not for hot-path queries.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{Value, ValueMap};
///
/// let mut map = ValueMap::new();
/// map.insert(Value::from(1), Value::from("one"));
/// map.insert(Value::from(1), Value::from("uno"));
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get(&Value::from(1)), Some(&Value::from("uno")));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap(Vec<(Value, Value)>);

impl ValueMap {
    #[must_use]
    pub fn new() -> Self {
        ValueMap(Vec::new())
    }

    /// Inserts an entry, replacing the value in place if the key exists.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut map = ValueMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// An insertion-ordered set of values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    #[must_use]
    pub fn new() -> Self {
        ValueSet(Vec::new())
    }

    /// Adds a value; returns `false` if an equal value was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// A regular expression carried as its source text and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegExp {
    pub source: String,
    pub flags: String,
}

impl RegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        RegExp {
            source: source.into(),
            flags: flags.into(),
        }
    }
}

impl fmt::Display for RegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

/// The standard error categories an [`ErrorObject`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Error,
    EvalError,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Error" => ErrorKind::Error,
            "EvalError" => ErrorKind::EvalError,
            "RangeError" => ErrorKind::RangeError,
            "ReferenceError" => ErrorKind::ReferenceError,
            "SyntaxError" => ErrorKind::SyntaxError,
            "TypeError" => ErrorKind::TypeError,
            _ => return None,
        })
    }
}

/// A captured error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
    pub kind: ErrorKind,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorObject {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorObject {
            kind,
            message: message.into(),
            stack: None,
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

fn downcast<'a, T: Kind>(object: &'a Object) -> Result<&'a T> {
    object
        .downcast_ref::<T>()
        .ok_or_else(|| Error::type_mismatch(KindId::of::<T>().name(), object.kind().name()))
}

pub(crate) fn optional_string(value: Value) -> Result<Option<String>> {
    match value {
        Value::Undefined => Ok(None),
        other => other.expect_type().map(Some),
    }
}

pub(crate) fn write_optional<T>(ctx: &mut EncodeContext<'_>, value: Option<T>) -> Result<()>
where
    T: Into<Value>,
{
    match value {
        Some(value) => ctx.write(value),
        None => ctx.write(Value::Undefined),
    }
}

/// Codec shared by [`Record`] and [`Sequence`].
///
/// Sequences write their length then their items; records write
/// `key, value` pairs terminated by `null`. The first value read tells them
/// apart.
pub struct PlainObjectCodec;

impl ObjectCodec for PlainObjectCodec {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        if let Some(sequence) = object.downcast_ref::<Sequence>() {
            ctx.write(sequence.len())?;
            for item in sequence {
                ctx.write(item)?;
            }
            return Ok(());
        }

        let record = downcast::<Record>(object)?;
        for (key, value) in record {
            ctx.write(key.as_str())?;
            ctx.write(value)?;
        }
        ctx.write(Value::Null)
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        let first = ctx.read()?;
        if first.is_number() {
            let len: usize = first.expect_type()?;
            let mut sequence = Sequence::new();
            for _ in 0..len {
                sequence.push(ctx.read()?);
            }
            return Ok(Object::new(sequence));
        }

        let mut record = Record::new();
        let mut key = first;
        while !key.is_null() {
            let name: String = key.expect_type()?;
            record.insert(name, ctx.read()?);
            key = ctx.read()?;
        }
        Ok(Object::new(record))
    }
}

/// Codec for [`ValueMap`]: the size, every key, then every value.
pub struct MapCodec;

impl ObjectCodec for MapCodec {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let map = downcast::<ValueMap>(object)?;
        ctx.write(map.len())?;
        for key in map.keys() {
            ctx.write(key)?;
        }
        for value in map.values() {
            ctx.write(value)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        let len: usize = ctx.read()?.expect_type()?;
        let mut keys = Vec::new();
        for _ in 0..len {
            keys.push(ctx.read()?);
        }
        let mut map = ValueMap::new();
        for key in keys {
            map.insert(key, ctx.read()?);
        }
        Ok(Object::new(map))
    }
}

/// Codec for [`ValueSet`]: the size, then every item.
pub struct SetCodec;

impl ObjectCodec for SetCodec {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let set = downcast::<ValueSet>(object)?;
        ctx.write(set.len())?;
        for item in set.iter() {
            ctx.write(item)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        let len: usize = ctx.read()?.expect_type()?;
        let mut set = ValueSet::new();
        for _ in 0..len {
            set.insert(ctx.read()?);
        }
        Ok(Object::new(set))
    }
}

/// Codec for [`RegExp`]: source, then flags.
pub struct RegExpCodec;

impl ObjectCodec for RegExpCodec {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let regexp = downcast::<RegExp>(object)?;
        ctx.write(regexp.source.as_str())?;
        ctx.write(regexp.flags.as_str())
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        let source: String = ctx.read()?.expect_type()?;
        let flags: String = ctx.read()?.expect_type()?;
        Ok(Object::new(RegExp { source, flags }))
    }
}

/// Codec for [`ErrorObject`]: kind name, message, stack.
pub struct ErrorCodec;

impl ObjectCodec for ErrorCodec {
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let error = downcast::<ErrorObject>(object)?;
        ctx.write(error.kind.as_str())?;
        ctx.write(error.message.as_str())?;
        write_optional(ctx, error.stack.as_deref())
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        let name: String = ctx.read()?.expect_type()?;
        let kind = ErrorKind::parse(&name)
            .ok_or_else(|| Error::type_mismatch("error kind", &name))?;
        let message: String = ctx.read()?.expect_type()?;
        let stack = optional_string(ctx.read()?)?;
        Ok(Object::new(ErrorObject {
            kind,
            message,
            stack,
        }))
    }
}

/// Registers every built-in kind into `registry`.
pub fn register_builtins(registry: &Registry) -> Result<()> {
    let plain: Arc<dyn ObjectCodec> = Arc::new(PlainObjectCodec);
    registry.register_shared::<Record>("", Discriminator::Unnamed, Arc::clone(&plain))?;
    registry.register_shared::<Sequence>("", Discriminator::Unnamed, plain)?;

    registry.register::<ValueMap>("", 1u32, MapCodec)?;
    registry.register::<ValueSet>("", 2u32, SetCodec)?;
    registry.register::<RegExp>("", 3u32, RegExpCodec)?;
    registry.register::<ErrorObject>("", 4u32, ErrorCodec)?;

    registry.make_serializable::<Diagnostic>(DIAGNOSTIC_ORIGIN, Discriminator::Unnamed)
}
