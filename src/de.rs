//! Object-graph deserialization.
//!
//! This module provides [`DecodeContext`], the strict inverse of
//! [`EncodeContext`](crate::EncodeContext). It consumes a token stream and
//! reconstructs the root values, resolving back-references against the
//! values registered so far and kind tags against the per-stream type table.
//!
//! ## Overview
//!
//! - The first token must be the format version; anything else aborts.
//! - Plain tokens are returned as values; non-empty strings and buffers are
//!   registered positionally on the way.
//! - `ESCAPE` starts an escape pair, a back-reference or an object section.
//! - Object sections hand the context to the tag's codec, then require the
//!   `ESCAPE, ESCAPE_END_OBJECT` terminator before registering the result.
//!
//! Any deviation is fatal: the cached artifact must be regenerated.
//!
//! ```rust
//! use cachegraph::{deserialize, Token, Value};
//!
//! let values = deserialize(vec![Token::from(1), Token::from("a"), Token::Null, Token::from(-1)])
//!     .unwrap();
//! assert_eq!(values, vec![Value::from("a"), Value::from("a")]);
//! ```

use crate::deferred::{LazyTokens, LazyValue};
use crate::middleware::ObjectMiddleware;
use crate::registry::{Discriminator, ObjectCodec, Tag};
use crate::{Error, Number, Result, Serialized, Token, Value};
use std::sync::Arc;

/// The `read` side of the codec contract and the state of one deserialize call.
pub struct DecodeContext<'m> {
    middleware: &'m ObjectMiddleware,
    tokens: std::vec::IntoIter<Token>,
    position: usize,
    referenceable: Vec<Value>,
    object_type_lookup: Vec<Arc<dyn ObjectCodec>>,
    depth: usize,
}

impl<'m> DecodeContext<'m> {
    pub(crate) fn new(middleware: &'m ObjectMiddleware, tokens: Vec<Token>) -> Self {
        DecodeContext {
            middleware,
            tokens: tokens.into_iter(),
            position: 0,
            referenceable: Vec::new(),
            object_type_lookup: Vec::new(),
            depth: 0,
        }
    }

    /// Reads the next nested value, in the order the codec wrote it.
    pub fn read(&mut self) -> Result<Value> {
        self.decode_value()
    }

    /// Number of object sections currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn check_version(&mut self) -> Result<()> {
        let expected = self.middleware.options().version;
        let token = self.next_token()?;
        match token.as_integer() {
            Some(version) if version == expected => Ok(()),
            _ => Err(Error::version_mismatch(expected, &token.to_string())),
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.tokens.len() == 0
    }

    fn next_token(&mut self) -> Result<Token> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| Error::unexpected_eof(self.position))?;
        self.position += 1;
        Ok(token)
    }

    fn add_referenceable(&mut self, value: Value) {
        self.referenceable.push(value);
    }

    pub(crate) fn decode_value(&mut self) -> Result<Value> {
        match self.next_token()? {
            Token::Null => self.decode_escaped(),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Number(n) => Ok(Value::Number(n)),
            Token::String(s) => {
                let value = Value::String(s);
                if value.as_str().is_some_and(|s| !s.is_empty()) {
                    self.add_referenceable(value.clone());
                }
                Ok(value)
            }
            Token::Buffer(b) => {
                let value = Value::Buffer(b);
                self.add_referenceable(value.clone());
                Ok(value)
            }
            Token::Lazy(tokens) => Ok(Value::Lazy(self.defer(tokens))),
        }
    }

    fn decode_escaped(&mut self) -> Result<Value> {
        let next = self.next_token()?;
        match next {
            Token::Null => Ok(Value::Null),
            Token::Bool(false) => Ok(Value::Undefined),
            Token::Bool(true) => Err(Error::unexpected_end_of_object(self.position - 1)),
            Token::Number(Number::Integer(offset)) if offset < 0 => self.resolve_reference(offset),
            Token::Number(Number::Integer(offset)) => {
                let codec = self.lookup_type_offset(offset)?;
                self.decode_object(codec)
            }
            Token::String(origin) => {
                let discriminator_token = self.next_token()?;
                let discriminator = Discriminator::from_token(&discriminator_token)
                    .ok_or_else(|| {
                        Error::invalid_tag(self.position - 1, &discriminator_token.to_string())
                    })?;
                let tag = Tag::new(origin, discriminator);
                let codec = self.middleware.registry().lookup_by_tag(&tag)?;
                self.object_type_lookup.push(Arc::clone(&codec));
                self.decode_object(codec)
            }
            other => Err(Error::invalid_tag(self.position - 1, &other.to_string())),
        }
    }

    fn resolve_reference(&self, offset: i64) -> Result<Value> {
        let index = self.referenceable.len() as i64 + offset;
        usize::try_from(index)
            .ok()
            .and_then(|index| self.referenceable.get(index))
            .cloned()
            .ok_or_else(|| Error::dangling_reference(self.position - 1, offset))
    }

    fn lookup_type_offset(&self, offset: i64) -> Result<Arc<dyn ObjectCodec>> {
        let index = self.object_type_lookup.len() as i64 - offset;
        if offset == 0 || index < 0 {
            return Err(Error::invalid_tag(self.position - 1, &offset.to_string()));
        }
        self.object_type_lookup
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::invalid_tag(self.position - 1, &offset.to_string()))
    }

    fn decode_object(&mut self, codec: Arc<dyn ObjectCodec>) -> Result<Value> {
        if let Some(limit) = self.middleware.options().max_depth {
            if self.depth >= limit {
                return Err(Error::depth_limit_exceeded(limit));
            }
        }

        self.depth += 1;
        let result = codec.decode(self);
        self.depth -= 1;
        let object = result?;

        let end = self.next_token()?;
        if !end.is_escape() {
            return Err(Error::expected_end_of_object(self.position - 1, &end.to_string()));
        }
        let end = self.next_token()?;
        if !end.is_end_object() {
            return Err(Error::expected_end_of_object(self.position - 1, &end.to_string()));
        }

        let value = Value::Object(object);
        self.add_referenceable(value.clone());
        Ok(value)
    }

    /// Wraps a lazy section so that invoking the value deserializes the
    /// eventual stream in a fresh call and yields its first value.
    fn defer(&self, tokens: LazyTokens) -> LazyValue {
        let middleware = self.middleware.clone();
        LazyValue::new(move || {
            let middleware = middleware.clone();
            tokens.get().map(move |result| match result? {
                Serialized::Tokens(tokens) => Ok(middleware
                    .deserialize(tokens)?
                    .into_iter()
                    .next()
                    .unwrap_or_default()),
                Serialized::NotSerializable => Err(Error::custom(
                    "deferred section resolved to a graph that is not serializable",
                )),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::token::{ESCAPE, ESCAPE_END_OBJECT};
    use crate::{Error, ObjectMiddleware, Token, Value, DEFAULT_MAX_DEPTH};

    fn decode(tokens: Vec<Token>) -> crate::Result<Vec<Value>> {
        ObjectMiddleware::default().deserialize(tokens)
    }

    #[test]
    fn test_empty_stream_after_version() {
        assert_eq!(decode(vec![Token::from(1)]).unwrap(), vec![]);
    }

    #[test]
    fn test_missing_version() {
        assert!(matches!(
            decode(vec![]),
            Err(Error::UnexpectedEof { position: 0 })
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let err = decode(vec![Token::from(2), Token::from("a")]).unwrap_err();
        assert!(matches!(err, Error::VersionMismatch { expected: 1, .. }));
    }

    #[test]
    fn test_escape_pairs() {
        let values = decode(vec![
            Token::from(1),
            ESCAPE,
            Token::Null,
            ESCAPE,
            Token::Bool(false),
        ])
        .unwrap();
        assert_eq!(values, vec![Value::Null, Value::Undefined]);
    }

    #[test]
    fn test_stray_end_of_object() {
        let err = decode(vec![Token::from(1), ESCAPE, ESCAPE_END_OBJECT]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEndOfObject { position: 2 }));
    }

    #[test]
    fn test_dangling_reference() {
        let err = decode(vec![Token::from(1), Token::from("a"), ESCAPE, Token::from(-2)])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingReference {
                position: 3,
                offset: -2
            }
        ));
    }

    #[test]
    fn test_truncated_escape() {
        let err = decode(vec![Token::from(1), ESCAPE]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof { position: 2 }));
    }

    #[test]
    fn test_type_offset_without_tags() {
        let err = decode(vec![Token::from(1), ESCAPE, Token::from(1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidTag { .. }));
    }

    #[test]
    fn test_float_after_escape_is_invalid() {
        let err = decode(vec![Token::from(1), ESCAPE, Token::from(-1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidTag { position: 2, .. }));
    }

    #[test]
    fn test_empty_strings_not_registered() {
        let values = decode(vec![
            Token::from(1),
            Token::from("a"),
            Token::from(""),
            ESCAPE,
            Token::from(-1),
        ])
        .unwrap();
        assert_eq!(values[2], Value::from("a"));
    }

    #[test]
    fn test_deep_nesting_stops_at_default_limit() {
        // each group opens a one-element sequence whose element is the next group
        let mut tokens = vec![Token::from(1)];
        for _ in 0..10_000 {
            tokens.extend([ESCAPE, Token::from(""), Token::Null, Token::from(1)]);
        }
        let err = decode(tokens).unwrap_err();
        assert!(matches!(
            err,
            Error::DepthLimitExceeded {
                limit: DEFAULT_MAX_DEPTH
            }
        ));
    }
}
