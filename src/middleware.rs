//! The object middleware: entry point for serializing and deserializing
//! object graphs against a registry.

use crate::de::DecodeContext;
use crate::ser::EncodeContext;
use crate::{Error, MiddlewareOptions, Registry, Result, Serialized, Token, Value};
use std::sync::Arc;

/// Serializes lists of root values into token streams and back.
///
/// Cheap to clone; clones share the registry.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{ObjectMiddleware, Record, Registry, Value};
/// use std::sync::Arc;
///
/// let middleware = ObjectMiddleware::new(Arc::new(Registry::new()));
///
/// let mut record = Record::new();
/// record.insert("answer".to_string(), Value::from(42));
/// let roots = vec![Value::record(record)];
///
/// let tokens = middleware.serialize(&roots).unwrap().into_tokens().unwrap();
/// assert_eq!(middleware.deserialize(tokens).unwrap(), roots);
/// ```
#[derive(Clone, Debug)]
pub struct ObjectMiddleware {
    registry: Arc<Registry>,
    options: MiddlewareOptions,
}

impl ObjectMiddleware {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, MiddlewareOptions::default())
    }

    pub fn with_options(registry: Arc<Registry>, options: MiddlewareOptions) -> Self {
        ObjectMiddleware { registry, options }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[must_use]
    pub fn options(&self) -> &MiddlewareOptions {
        &self.options
    }

    /// Serializes `values` into one token stream.
    ///
    /// # Errors
    ///
    /// Fails on unknown kinds, circular references, exceeded depth limits
    /// and codec errors. A kind marked as not serializable is not an error:
    /// the whole call yields [`Serialized::NotSerializable`].
    pub fn serialize(&self, values: &[Value]) -> Result<Serialized> {
        let mut ctx = EncodeContext::new(self);
        for value in values {
            match ctx.process(value) {
                Ok(()) => {}
                Err(Error::NotSerializable { kind }) => {
                    tracing::debug!(%kind, "object graph is not serializable, skipping");
                    return Ok(Serialized::NotSerializable);
                }
                Err(err) => return Err(err),
            }
        }
        let tokens = ctx.into_tokens();
        tracing::debug!(roots = values.len(), tokens = tokens.len(), "serialized object graph");
        Ok(Serialized::Tokens(tokens))
    }

    /// Reconstructs the root values of a token stream.
    ///
    /// # Errors
    ///
    /// Fails on version mismatch, premature end of stream, malformed object
    /// terminators, dangling references, unknown tags and codec errors.
    pub fn deserialize(&self, tokens: Vec<Token>) -> Result<Vec<Value>> {
        let token_count = tokens.len();
        let mut ctx = DecodeContext::new(self, tokens);
        ctx.check_version()?;

        let mut result = Vec::new();
        while !ctx.at_end() {
            result.push(ctx.decode_value()?);
        }
        tracing::debug!(roots = result.len(), tokens = token_count, "deserialized object graph");
        Ok(result)
    }
}

impl Default for ObjectMiddleware {
    /// A middleware over the process-wide registry.
    fn default() -> Self {
        Self::new(Registry::global())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Object, Record};

    #[derive(Debug, PartialEq)]
    struct Socket;

    #[test]
    fn test_not_serializable_skips_whole_call() {
        let registry = Registry::new();
        registry.register_not_serializable::<Socket>().unwrap();
        let middleware = ObjectMiddleware::new(Arc::new(registry));

        let mut record = Record::new();
        record.insert("socket".to_string(), Value::object(Socket));
        let result = middleware
            .serialize(&[Value::from("before"), Value::record(record)])
            .unwrap();
        assert!(result.is_not_serializable());
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let middleware = ObjectMiddleware::new(Arc::new(Registry::new()));
        let err = middleware.serialize(&[Value::object(Socket)]).unwrap_err();
        assert!(matches!(err, Error::NoSerializer { .. }));
    }

    #[test]
    fn test_version_option_round_trip() {
        let registry = Arc::new(Registry::new());
        let v2 = ObjectMiddleware::with_options(
            Arc::clone(&registry),
            MiddlewareOptions::new().with_version(2),
        );
        let tokens = v2
            .serialize(&[Value::from(1)])
            .unwrap()
            .into_tokens()
            .unwrap();
        assert_eq!(tokens[0], Token::from(2));
        assert_eq!(v2.deserialize(tokens.clone()).unwrap(), vec![Value::from(1)]);

        let v1 = ObjectMiddleware::new(registry);
        assert!(matches!(
            v1.deserialize(tokens),
            Err(Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let registry = Arc::new(Registry::new());
        let nested = Value::sequence(vec![Value::sequence(vec![Value::sequence(vec![])])]);

        let strict = ObjectMiddleware::with_options(
            Arc::clone(&registry),
            MiddlewareOptions::new().with_max_depth(2),
        );
        assert!(matches!(
            strict.serialize(std::slice::from_ref(&nested)),
            Err(Error::DepthLimitExceeded { limit: 2 })
        ));

        let relaxed = ObjectMiddleware::new(registry);
        let tokens = relaxed
            .serialize(std::slice::from_ref(&nested))
            .unwrap()
            .into_tokens()
            .unwrap();
        assert!(matches!(
            strict.deserialize(tokens),
            Err(Error::DepthLimitExceeded { limit: 2 })
        ));
    }

    #[test]
    fn test_object_handle_identity_survives() {
        let middleware = ObjectMiddleware::new(Arc::new(Registry::new()));
        let shared = Object::new(Record::new());
        let tokens = middleware
            .serialize(&[Value::Object(shared.clone()), Value::Object(shared)])
            .unwrap()
            .into_tokens()
            .unwrap();
        let values = middleware.deserialize(tokens).unwrap();
        let first = values[0].as_object().unwrap();
        let second = values[1].as_object().unwrap();
        assert!(first.ptr_eq(second));
    }
}
