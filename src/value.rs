//! Dynamic value representation for object graphs.
//!
//! This module provides the [`Value`] enum, the element every codec writes and
//! reads, and [`Object`], the shared handle whose identity drives reference
//! deduplication.
//!
//! ## Core Types
//!
//! - [`Value`]: undefined, null, bool, number, string, byte buffer, object or lazy value
//! - [`Number`]: integer or floating-point number
//! - [`Object`]: a reference-counted instance of some registered [`Kind`]
//! - [`KindId`]: the stable identifier the registry keys codecs by
//!
//! ## Identity
//!
//! Cloning an [`Object`] clones the handle, not the data. Two clones are the
//! *same* object for the serializer and a second occurrence in a graph is
//! emitted as a back-reference:
//!
//! ```rust
//! use cachegraph::{Object, Record, Value};
//!
//! let shared = Object::new(Record::new());
//! let a = Value::Object(shared.clone());
//! let b = Value::Object(shared);
//! assert!(a.as_object().unwrap().ptr_eq(b.as_object().unwrap()));
//! ```
//!
//! Equality (`==`) on values is structural: two distinct objects of the same
//! kind with equal contents compare equal.

use crate::deferred::LazyValue;
use crate::record::{Record, Sequence};
use crate::{Error, Result};
use bytes::Bytes;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value that can take part in an object graph.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{Value, Number};
///
/// let undefined = Value::Undefined;
/// let num = Value::Number(Number::Integer(42));
/// let text = Value::from("hello");
///
/// assert!(undefined.is_undefined());
/// assert!(num.is_number());
/// assert!(text.is_string());
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Buffer(Bytes),
    Object(Object),
    Lazy(LazyValue),
}

/// A numeric value: an integer, an unsigned integer too large for `i64`, or a float.
///
/// # Examples
///
/// ```rust
/// use cachegraph::Number;
///
/// let integer = Number::Integer(42);
/// let float = Number::Float(3.5);
///
/// assert!(integer.is_integer());
/// assert_eq!(integer.as_i64(), Some(42));
/// assert_eq!(float.as_f64(), 3.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    /// Only holds values above `i64::MAX`; smaller ones are `Integer`.
    Unsigned(u64),
    Float(f64),
}

impl Number {
    #[inline]
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Number::Integer(_) | Number::Unsigned(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }

    /// Converts this number to an `i64` if possible.
    ///
    /// Returns `Some(i64)` for integers and floats with no fractional part
    /// that fit in i64 range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Number;
    ///
    /// assert_eq!(Number::Integer(42).as_i64(), Some(42));
    /// assert_eq!(Number::Float(42.0).as_i64(), Some(42));
    /// assert_eq!(Number::Float(42.5).as_i64(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            Number::Unsigned(_) => None,
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Some(*f as i64)
                } else {
                    None
                }
            }
        }
    }

    /// Converts this number to a `u64` if it is a non-negative whole number.
    ///
    /// ```rust
    /// use cachegraph::Number;
    ///
    /// assert_eq!(Number::from(u64::MAX).as_u64(), Some(u64::MAX));
    /// assert_eq!(Number::Integer(-1).as_u64(), None);
    /// ```
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::Integer(i) => u64::try_from(*i).ok(),
            Number::Unsigned(u) => Some(*u),
            Number::Float(f) => {
                if f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64 {
                    Some(*f as u64)
                } else {
                    None
                }
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Unsigned(u) => *u as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Unsigned(u) => write!(f, "{}", u),
            Number::Float(fl) => write!(f, "{}", fl),
        }
    }
}

macro_rules! number_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Number::Integer(value as i64)
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => Number::Integer(i),
            Err(_) => Number::Unsigned(value),
        }
    }
}

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(value as f64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

/// Anything that can live behind an [`Object`] handle.
///
/// Blanket-implemented; a type only has to be `Debug + PartialEq + Send + Sync + 'static`.
/// Whether it can actually be serialized depends on the [`Registry`](crate::Registry).
pub trait Kind: Any + fmt::Debug + PartialEq + Send + Sync {}

impl<T: Any + fmt::Debug + PartialEq + Send + Sync> Kind for T {}

/// Stable identifier of a kind, used as the registry key.
#[derive(Clone, Copy)]
pub struct KindId {
    id: TypeId,
    name: &'static str,
}

impl KindId {
    /// Returns the identifier of `T`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::{KindId, Record};
    ///
    /// assert_eq!(KindId::of::<Record>().name(), "Record");
    /// ```
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        let full = std::any::type_name::<T>();
        // Keep the last path segment while leaving generic arguments intact
        let base = full.split('<').next().unwrap_or(full);
        let start = base.rfind("::").map_or(0, |i| i + 2);
        KindId {
            id: TypeId::of::<T>(),
            name: &full[start..],
        }
    }

    /// Human-readable kind name, used in error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for KindId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for KindId {}

impl Hash for KindId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

trait ErasedKind: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn kind(&self) -> KindId;
    fn eq_erased(&self, other: &dyn ErasedKind) -> bool;
    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T: Kind> ErasedKind for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn kind(&self) -> KindId {
        KindId::of::<T>()
    }

    fn eq_erased(&self, other: &dyn ErasedKind) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A shared, identity-carrying instance of some [`Kind`].
///
/// # Examples
///
/// ```rust
/// use cachegraph::{Object, Record, Value};
///
/// let mut record = Record::new();
/// record.insert("name".to_string(), Value::from("a"));
/// let object = Object::new(record);
///
/// assert_eq!(object.kind().name(), "Record");
/// assert_eq!(object.downcast_ref::<Record>().unwrap().len(), 1);
/// ```
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn ErasedKind>,
}

impl Object {
    pub fn new<T: Kind>(value: T) -> Self {
        Object {
            inner: Arc::new(value),
        }
    }

    /// Wraps an existing `Arc`, keeping its identity.
    pub fn from_arc<T: Kind>(value: Arc<T>) -> Self {
        Object { inner: value }
    }

    #[must_use]
    pub fn kind(&self) -> KindId {
        self.inner.kind()
    }

    #[must_use]
    pub fn is<T: Kind>(&self) -> bool {
        self.inner.as_any().is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Kind>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// Returns a typed `Arc` sharing this object's allocation.
    #[must_use]
    pub fn downcast<T: Kind>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).into_any().downcast::<T>().ok()
    }

    /// Returns `true` if both handles point at the same object.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        self.address() == other.address()
    }

    /// Address of the shared allocation; stable while any handle is alive.
    #[inline]
    #[must_use]
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.inner.eq_erased(other.inner.as_ref())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt_erased(f)
    }
}

impl Value {
    /// Wraps `value` in a fresh [`Object`].
    pub fn object<T: Kind>(value: T) -> Self {
        Value::Object(Object::new(value))
    }

    /// Creates a record object value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::{Record, Value};
    ///
    /// let value = Value::record(Record::new());
    /// assert!(value.as_record().unwrap().is_empty());
    /// ```
    pub fn record(record: Record) -> Self {
        Value::object(record)
    }

    /// Creates a sequence object value.
    pub fn sequence<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::object(items.into_iter().collect::<Sequence>())
    }

    #[inline]
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_buffer(&self) -> bool {
        matches!(self, Value::Buffer(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    /// If the value is a boolean, returns it. Otherwise returns `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Value;
    ///
    /// assert_eq!(Value::Bool(true).as_bool(), Some(true));
    /// assert_eq!(Value::from(42).as_bool(), None);
    /// ```
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_buffer(&self) -> Option<&Bytes> {
        match self {
            Value::Buffer(b) => Some(b),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrows the object as `T` if it is one.
    #[must_use]
    pub fn downcast_ref<T: Kind>(&self) -> Option<&T> {
        self.as_object()?.downcast_ref::<T>()
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        self.downcast_ref::<Record>()
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&Sequence> {
        self.downcast_ref::<Sequence>()
    }

    #[inline]
    #[must_use]
    pub fn as_lazy(&self) -> Option<&LazyValue> {
        match self {
            Value::Lazy(l) => Some(l),
            _ => None,
        }
    }

    /// Short description of the value's type for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Buffer(_) => "buffer",
            Value::Object(o) => o.kind().name(),
            Value::Lazy(_) => "lazy value",
        }
    }

    /// Converts the value into `T`, reporting a type mismatch on failure.
    ///
    /// Codecs use this to read back typed fields.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Value;
    ///
    /// let count: i64 = Value::from(3).expect_type().unwrap();
    /// assert_eq!(count, 3);
    /// assert!(Value::from("x").expect_type::<i64>().is_err());
    /// ```
    pub fn expect_type<T>(self) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        T::try_from(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Buffer(b) => write!(f, "<buffer {} bytes>", b.len()),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Lazy(_) => write!(f, "<lazy>"),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value
            .as_i64()
            .ok_or_else(|| Error::type_mismatch("integer", value.type_name()))
    }
}

impl TryFrom<Value> for u64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match &value {
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
        .ok_or_else(|| Error::type_mismatch("unsigned integer", value.type_name()))
    }
}

impl TryFrom<Value> for usize {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match &value {
            Value::Number(n) => n.as_u64().and_then(|u| usize::try_from(u).ok()),
            _ => None,
        }
            .ok_or_else(|| Error::type_mismatch("length", value.type_name()))
    }
}

impl TryFrom<Value> for f64 {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| Error::type_mismatch("number", value.type_name()))
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| Error::type_mismatch("boolean", value.type_name()))
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            other => Err(Error::type_mismatch("string", other.type_name())),
        }
    }
}

impl TryFrom<Value> for Arc<str> {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::type_mismatch("string", other.type_name())),
        }
    }
}

impl TryFrom<Value> for Bytes {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Buffer(b) => Ok(b),
            other => Err(Error::type_mismatch("buffer", other.type_name())),
        }
    }
}

impl TryFrom<Value> for Object {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(o) => Ok(o),
            other => Err(Error::type_mismatch("object", other.type_name())),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )*
    };
}

value_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(Number::from(value as u64))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(value: Arc<str>) -> Self {
        Value::String(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Buffer(value)
    }
}

impl From<Object> for Value {
    fn from(value: Object) -> Self {
        Value::Object(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::record(value)
    }
}

impl From<Sequence> for Value {
    fn from(value: Sequence) -> Self {
        Value::object(value)
    }
}

impl From<LazyValue> for Value {
    fn from(value: LazyValue) -> Self {
        Value::Lazy(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_object_identity_and_equality() {
        let a = Object::new(Point { x: 1, y: 2 });
        let b = Object::new(Point { x: 1, y: 2 });
        let c = a.clone();

        assert!(a.ptr_eq(&c));
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_ne!(a, Object::new(Point { x: 9, y: 2 }));
    }

    #[test]
    fn test_objects_of_different_kinds_differ() {
        #[derive(Debug, PartialEq)]
        struct Other {
            x: i32,
            y: i32,
        }
        assert_ne!(
            Object::new(Point { x: 1, y: 2 }),
            Object::new(Other { x: 1, y: 2 })
        );
    }

    #[test]
    fn test_downcast_shares_allocation() {
        let object = Object::new(Point { x: 3, y: 4 });
        let typed = object.downcast::<Point>().unwrap();
        assert_eq!(typed.x, 3);
        assert!(object.ptr_eq(&Object::from_arc(typed)));
        assert!(object.downcast::<Record>().is_none());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(KindId::of::<Point>().name(), "Point");
        assert_eq!(KindId::of::<Sequence>().name(), "Sequence");
        assert_eq!(Object::new(Point { x: 0, y: 0 }).kind(), KindId::of::<Point>());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Undefined.type_name(), "undefined");
        assert_eq!(Value::from(1.5).type_name(), "number");
        assert_eq!(Value::record(Record::new()).type_name(), "Record");
    }

    #[test]
    fn test_try_from() {
        assert_eq!(i64::try_from(Value::from(7)).unwrap(), 7);
        assert_eq!(usize::try_from(Value::from(7)).unwrap(), 7);
        assert!(usize::try_from(Value::from(-1)).is_err());
        assert_eq!(String::try_from(Value::from("a")).unwrap(), "a");
        assert!(bool::try_from(Value::Null).is_err());
    }

    #[test]
    fn test_large_unsigned_stays_exact() {
        let value = Value::from(u64::MAX - 1);
        assert_eq!(value, Value::Number(Number::Unsigned(u64::MAX - 1)));
        assert_eq!(u64::try_from(value.clone()).unwrap(), u64::MAX - 1);
        assert_eq!(value.as_i64(), None);
        assert_eq!(Value::from(5u64), Value::from(5));
        assert!(u64::try_from(Value::from(-5)).is_err());
    }
}
