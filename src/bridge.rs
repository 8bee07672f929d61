//! serde integration.
//!
//! [`to_value`] turns anything implementing [`Serialize`] into a [`Value`]
//! graph of records and sequences, and [`from_value`] reads it back.
//! [`SerdeCodec`] builds on both so a serde type can be registered as a kind
//! without writing a codec by hand:
//!
//! ```rust
//! use cachegraph::{ObjectMiddleware, Registry, Value};
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Chunk {
//!     id: u32,
//!     files: Vec<String>,
//! }
//!
//! let registry = Registry::new();
//! registry.register_serde::<Chunk>("app/chunk", "Chunk").unwrap();
//! let middleware = ObjectMiddleware::new(Arc::new(registry));
//!
//! let chunk = Chunk { id: 7, files: vec!["main.js".into()] };
//! let tokens = middleware
//!     .serialize(&[Value::object(chunk)])
//!     .unwrap()
//!     .into_tokens()
//!     .unwrap();
//! let back = middleware.deserialize(tokens).unwrap();
//! assert_eq!(back[0].downcast_ref::<Chunk>().unwrap().id, 7);
//! ```
//!
//! Struct and map fields become [`Record`]s, sequences and tuples become
//! [`Sequence`]s, byte slices become buffers, `None` and unit become `null`.
//! Enum variants with data are written as single-field records keyed by the
//! variant name.

use crate::de::DecodeContext;
use crate::registry::ObjectCodec;
use crate::ser::EncodeContext;
use crate::{Error, Kind, KindId, Number, Object, Record, Result, Sequence, Value};
use bytes::Bytes;
use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned};
use serde::ser::{self, Serialize};
use std::marker::PhantomData;

/// Converts `value` into a [`Value`] graph.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{to_value, Value};
///
/// let value = to_value(&vec![1, 2, 3]).unwrap();
/// assert_eq!(value, Value::sequence(vec![Value::from(1), Value::from(2), Value::from(3)]));
/// ```
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

/// Rebuilds a `T` from a [`Value`] graph produced by [`to_value`] or decoded
/// from a stream.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Codec for any kind that implements serde's traits.
///
/// The whole value is written as one nested record graph, so shared strings
/// inside it still dedupe against the rest of the stream.
pub struct SerdeCodec<T>(PhantomData<fn() -> T>);

impl<T> SerdeCodec<T> {
    #[must_use]
    pub fn new() -> Self {
        SerdeCodec(PhantomData)
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObjectCodec for SerdeCodec<T>
where
    T: Kind + Serialize + DeserializeOwned,
{
    fn encode(&self, object: &Object, ctx: &mut EncodeContext<'_>) -> Result<()> {
        let value = object
            .downcast_ref::<T>()
            .ok_or_else(|| Error::type_mismatch(KindId::of::<T>().name(), object.kind().name()))?;
        ctx.write(to_value(value)?)
    }

    fn decode(&self, ctx: &mut DecodeContext<'_>) -> Result<Object> {
        from_value::<T>(ctx.read()?).map(Object::new)
    }
}

/// Serializer producing [`Value`]s.
pub struct ValueSerializer;

pub struct SerializeSequence {
    items: Vec<Value>,
}

pub struct SerializeVariantSequence {
    variant: &'static str,
    items: Vec<Value>,
}

pub struct SerializeRecord {
    record: Record,
    current_key: Option<String>,
}

pub struct SerializeVariantRecord {
    variant: &'static str,
    record: Record,
}

fn variant_record(variant: &str, value: Value) -> Value {
    let mut record = Record::with_capacity(1);
    record.insert(variant.to_string(), value);
    Value::record(record)
}

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = Error;

    type SerializeSeq = SerializeSequence;
    type SerializeTuple = SerializeSequence;
    type SerializeTupleStruct = SerializeSequence;
    type SerializeTupleVariant = SerializeVariantSequence;
    type SerializeMap = SerializeRecord;
    type SerializeStruct = SerializeRecord;
    type SerializeStructVariant = SerializeVariantRecord;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::Number(Number::Integer(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        Ok(Value::Number(Number::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Number(Number::Float(v)))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::from(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Buffer(Bytes::copy_from_slice(v)))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value>
    where
        T: ?Sized + Serialize,
    {
        Ok(variant_record(variant, to_value(value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeSequence> {
        Ok(SerializeSequence {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeSequence> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeSequence> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeVariantSequence> {
        Ok(SerializeVariantSequence {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeRecord> {
        Ok(SerializeRecord {
            record: Record::with_capacity(len.unwrap_or(0)),
            current_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeRecord> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeVariantRecord> {
        Ok(SerializeVariantRecord {
            variant,
            record: Record::with_capacity(len),
        })
    }
}

impl ser::SerializeSeq for SerializeSequence {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::sequence(self.items))
    }
}

impl ser::SerializeTuple for SerializeSequence {
    type Ok = Value;
    type Error = Error;

    fn serialize_element<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeSequence {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for SerializeVariantSequence {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(variant_record(self.variant, Value::sequence(self.items)))
    }
}

impl ser::SerializeMap for SerializeRecord {
    type Ok = Value;
    type Error = Error;

    fn serialize_key<T>(&mut self, key: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        match to_value(key)? {
            Value::String(s) => {
                self.current_key = Some(s.to_string());
                Ok(())
            }
            Value::Number(n) => {
                self.current_key = Some(n.to_string());
                Ok(())
            }
            other => Err(Error::type_mismatch("string map key", other.type_name())),
        }
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| Error::custom("serialize_value called without serialize_key"))?;
        self.record.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::record(self.record))
    }
}

impl ser::SerializeStruct for SerializeRecord {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.record.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::record(self.record))
    }
}

impl ser::SerializeStructVariant for SerializeVariantRecord {
    type Ok = Value;
    type Error = Error;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: ?Sized + Serialize,
    {
        self.record.insert(key.to_string(), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(variant_record(self.variant, Value::record(self.record)))
    }
}

struct SeqDeserializer {
    iter: std::vec::IntoIter<Value>,
}

impl SeqDeserializer {
    fn new(items: Vec<Value>) -> Self {
        SeqDeserializer {
            iter: items.into_iter(),
        }
    }
}

impl<'de> de::SeqAccess<'de> for SeqDeserializer {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct RecordDeserializer {
    iter: std::vec::IntoIter<(String, Value)>,
    value: Option<Value>,
}

impl RecordDeserializer {
    fn new(record: &Record) -> Self {
        let fields: Vec<_> = record
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        RecordDeserializer {
            iter: fields.into_iter(),
            value: None,
        }
    }
}

impl<'de> de::MapAccess<'de> for RecordDeserializer {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(StringDeserializer::<Error>::new(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        match self.value.take() {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)),
            None => Err(Error::custom("next_value_seed called before next_key_seed")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumDeserializer {
    variant: String,
    value: Option<Value>,
}

impl<'de> de::EnumAccess<'de> for EnumDeserializer {
    type Error = Error;
    type Variant = VariantDeserializer;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: de::DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(StringDeserializer::<Error>::new(self.variant))?;
        Ok((variant, VariantDeserializer { value: self.value }))
    }
}

struct VariantDeserializer {
    value: Option<Value>,
}

impl<'de> de::VariantAccess<'de> for VariantDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value {
            None | Some(Value::Null) => Ok(()),
            Some(other) => Err(Error::type_mismatch("unit variant", other.type_name())),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.value {
            Some(value) => seed.deserialize(ValueDeserializer::new(value)),
            None => Err(Error::type_mismatch("newtype variant", "unit variant")),
        }
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Some(value) => de::Deserializer::deserialize_seq(ValueDeserializer::new(value), visitor),
            None => Err(Error::type_mismatch("tuple variant", "unit variant")),
        }
    }

    fn struct_variant<V>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Some(value) => de::Deserializer::deserialize_map(ValueDeserializer::new(value), visitor),
            None => Err(Error::type_mismatch("struct variant", "unit variant")),
        }
    }
}

/// Deserializer reading from a [`Value`].
pub struct ValueDeserializer {
    value: Value,
}

impl ValueDeserializer {
    #[must_use]
    pub fn new(value: Value) -> Self {
        ValueDeserializer { value }
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Undefined | Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Number(Number::Integer(i)) => visitor.visit_i64(i),
            Value::Number(Number::Unsigned(u)) => visitor.visit_u64(u),
            Value::Number(Number::Float(f)) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_str(&s),
            Value::Buffer(b) => visitor.visit_bytes(&b),
            Value::Object(object) => {
                if let Some(sequence) = object.downcast_ref::<Sequence>() {
                    visitor.visit_seq(SeqDeserializer::new(sequence.as_slice().to_vec()))
                } else if let Some(record) = object.downcast_ref::<Record>() {
                    visitor.visit_map(RecordDeserializer::new(record))
                } else {
                    Err(Error::type_mismatch("record or sequence", object.kind().name()))
                }
            }
            Value::Lazy(_) => Err(Error::type_mismatch("plain value", "lazy value")),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            Value::Undefined | Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let (variant, value) = match &self.value {
            Value::String(s) => (s.to_string(), None),
            Value::Object(object) => {
                let record = object
                    .downcast_ref::<Record>()
                    .filter(|record| record.len() == 1)
                    .ok_or_else(|| Error::type_mismatch("enum", object.kind().name()))?;
                match record.iter().next() {
                    Some((key, value)) => (key.clone(), Some(value.clone())),
                    None => return Err(Error::type_mismatch("enum", "empty record")),
                }
            }
            other => return Err(Error::type_mismatch("enum", other.type_name())),
        };
        visitor.visit_enum(EnumDeserializer { variant, value })
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect { w: i64, h: i64 },
        Pair(i64, i64),
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Asset {
        name: String,
        size: u64,
        tags: Vec<String>,
        parent: Option<String>,
        shape: Shape,
    }

    #[test]
    fn test_struct_becomes_record() {
        let asset = Asset {
            name: "main.js".to_string(),
            size: 1024,
            tags: vec!["entry".to_string()],
            parent: None,
            shape: Shape::Empty,
        };
        let value = to_value(&asset).unwrap();
        let record = value.as_record().unwrap();
        let keys: Vec<_> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "size", "tags", "parent", "shape"]);
        assert_eq!(record.get("parent"), Some(&Value::Null));
        assert_eq!(record.get("shape"), Some(&Value::from("Empty")));

        let back: Asset = from_value(value).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn test_enum_variants() {
        for shape in [
            Shape::Empty,
            Shape::Circle(1.5),
            Shape::Rect { w: 2, h: 3 },
            Shape::Pair(4, 5),
        ] {
            let value = to_value(&shape).unwrap();
            let back: Shape = from_value(value).unwrap();
            assert_eq!(back, shape);
        }
    }

    #[test]
    fn test_bytes_become_buffer() {
        let value = to_value(&serde_bytes_like(&[1, 2, 3])).unwrap();
        assert_eq!(value.as_buffer().map(|b| b.to_vec()), Some(vec![1u8, 2, 3]));
    }

    fn serde_bytes_like(bytes: &[u8]) -> impl Serialize + '_ {
        struct Raw<'a>(&'a [u8]);
        impl Serialize for Raw<'_> {
            fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_bytes(self.0)
            }
        }
        Raw(bytes)
    }

    #[test]
    fn test_integer_map_keys() {
        let mut map = BTreeMap::new();
        map.insert(1, "one".to_string());
        let value = to_value(&map).unwrap();
        assert_eq!(
            value.as_record().unwrap().get("1"),
            Some(&Value::from("one"))
        );
    }

    #[test]
    fn test_agrees_with_serde_json_shape() {
        let json = serde_json::json!({"a": [1, 2, {"b": null}], "c": "d"});
        let value = to_value(&json).unwrap();
        let back: serde_json::Value = from_value(value).unwrap();
        assert_eq!(back, json);
    }

    #[test]
    fn test_large_u64_survives_the_stream() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Fingerprint {
            hash: u64,
            size: u64,
        }

        let fingerprint = Fingerprint {
            hash: u64::MAX - 1,
            size: 42,
        };
        let value = to_value(&fingerprint).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(
            record.get("hash"),
            Some(&Value::Number(Number::Unsigned(u64::MAX - 1)))
        );
        assert_eq!(record.get("size"), Some(&Value::from(42)));

        let tokens = crate::serialize(&[value]).unwrap().into_tokens().unwrap();
        let mut back = crate::deserialize(tokens).unwrap();
        let back: Fingerprint = from_value(back.remove(0)).unwrap();
        assert_eq!(back, fingerprint);
    }

    #[test]
    fn test_foreign_kind_rejected() {
        #[derive(Debug, PartialEq)]
        struct Opaque;
        let err = from_value::<serde_json::Value>(Value::object(Opaque)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
