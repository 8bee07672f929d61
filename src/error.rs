//! Error types for object-graph serialization and deserialization.
//!
//! ## Error Categories
//!
//! - **Registration conflicts**: a kind, tag or origin loader registered twice
//! - **Unknown kinds**: encoding an unregistered kind, or decoding an unbound tag
//! - **Not serializable**: a kind explicitly refused; converted to
//!   [`Serialized::NotSerializable`](crate::Serialized::NotSerializable) at the top level
//! - **Circular references**: an object reachable from itself while still open
//! - **Stream corruption**: version mismatch, premature end, malformed terminators,
//!   dangling back-references and invalid tags
//!
//! ## Examples
//!
//! ```rust
//! use cachegraph::{deserialize, Error, Token};
//!
//! let result = deserialize(vec![Token::from(99)]);
//! assert!(matches!(result, Err(Error::VersionMismatch { .. })));
//! ```

use std::fmt;
use thiserror::Error;

/// Represents all possible errors raised while registering kinds or while
/// encoding and decoding object graphs.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A kind, tag or origin loader was registered twice
    #[error("{0} is already registered")]
    RegistrationConflict(String),

    /// Encoding a value whose kind has no codec
    #[error("No serializer registered for {kind}")]
    NoSerializer { kind: String },

    /// Decoding a tag that no codec is bound to
    #[error("No deserializer registered for {tag}")]
    NoDeserializer { tag: String },

    /// The kind was explicitly marked as never serializable
    #[error("{kind} is not serializable")]
    NotSerializable { kind: String },

    /// An object was re-entered while its own encoding was still open
    #[error("Circular references can't be serialized ({chain})")]
    CircularReference { chain: String },

    /// The leading token is not the expected format version
    #[error("Version mismatch, serializer changed: expected {expected}, found {found}")]
    VersionMismatch { expected: i64, found: String },

    /// The token sequence ended in the middle of a value
    #[error("Unexpected end of stream at position {position}")]
    UnexpectedEof { position: usize },

    /// An end-of-object marker appeared where a fresh value was expected
    #[error("Unexpected end of object at position {position}")]
    UnexpectedEndOfObject { position: usize },

    /// A codec returned without consuming exactly its own section
    #[error("Expected end of object at position {position}, found {found}")]
    ExpectedEndOfObject { position: usize, found: String },

    /// A back-reference pointing at no registered value
    #[error("Dangling reference at position {position}: offset {offset} resolves to nothing")]
    DanglingReference { position: usize, offset: i64 },

    /// The token after an escape is neither a reference, an escape code nor a kind tag
    #[error("Invalid object tag at position {position}: {found}")]
    InvalidTag { position: usize, found: String },

    /// Object sections nested deeper than the configured limit
    #[error("Nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// A codec read a value of the wrong type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Custom error raised by a codec, a loader or serde
    #[error("Error: {0}")]
    Custom(String),
}

impl Error {
    /// Creates a registration conflict error for `what` (a kind name, a tag or an origin).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Error;
    ///
    /// let err = Error::registration_conflict("serializer for Point");
    /// assert!(err.to_string().contains("already registered"));
    /// ```
    pub fn registration_conflict(what: &str) -> Self {
        Error::RegistrationConflict(what.to_string())
    }

    pub fn no_serializer(kind: &str) -> Self {
        Error::NoSerializer {
            kind: kind.to_string(),
        }
    }

    pub fn no_deserializer(tag: &str) -> Self {
        Error::NoDeserializer {
            tag: tag.to_string(),
        }
    }

    pub fn not_serializable(kind: &str) -> Self {
        Error::NotSerializable {
            kind: kind.to_string(),
        }
    }

    /// Creates a circular reference error from the chain of open kind names.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Error;
    ///
    /// let err = Error::circular_reference(&["Node", "Edge", "Node"]);
    /// assert!(err.to_string().contains("Node -> Edge -> Node"));
    /// ```
    pub fn circular_reference<S: AsRef<str>>(chain: &[S]) -> Self {
        let chain = chain
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" -> ");
        Error::CircularReference { chain }
    }

    pub fn version_mismatch(expected: i64, found: &str) -> Self {
        Error::VersionMismatch {
            expected,
            found: found.to_string(),
        }
    }

    pub fn unexpected_eof(position: usize) -> Self {
        Error::UnexpectedEof { position }
    }

    pub fn unexpected_end_of_object(position: usize) -> Self {
        Error::UnexpectedEndOfObject { position }
    }

    pub fn expected_end_of_object(position: usize, found: &str) -> Self {
        Error::ExpectedEndOfObject {
            position,
            found: found.to_string(),
        }
    }

    pub fn dangling_reference(position: usize, offset: i64) -> Self {
        Error::DanglingReference { position, offset }
    }

    pub fn invalid_tag(position: usize, found: &str) -> Self {
        Error::InvalidTag {
            position,
            found: found.to_string(),
        }
    }

    pub fn depth_limit_exceeded(limit: usize) -> Self {
        Error::DepthLimitExceeded { limit }
    }

    /// Creates a type mismatch error for codecs reading back their fields.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cachegraph::Error;
    ///
    /// let err = Error::type_mismatch("string", "number");
    /// assert!(err.to_string().contains("expected string"));
    /// ```
    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates a custom error with a display message.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }

    /// Returns `true` for errors that mean a cached stream is unusable and
    /// must be regenerated.
    #[must_use]
    pub fn is_stream_corruption(&self) -> bool {
        matches!(
            self,
            Error::VersionMismatch { .. }
                | Error::UnexpectedEof { .. }
                | Error::UnexpectedEndOfObject { .. }
                | Error::ExpectedEndOfObject { .. }
                | Error::DanglingReference { .. }
                | Error::InvalidTag { .. }
        )
    }
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_classification() {
        assert!(Error::unexpected_eof(3).is_stream_corruption());
        assert!(Error::version_mismatch(1, "2").is_stream_corruption());
        assert!(Error::dangling_reference(4, -7).is_stream_corruption());
        assert!(!Error::no_serializer("Point").is_stream_corruption());
        assert!(!Error::circular_reference(&["A", "A"]).is_stream_corruption());
    }

    #[test]
    fn test_messages() {
        let err = Error::expected_end_of_object(12, "\"extra\"");
        assert_eq!(
            err.to_string(),
            "Expected end of object at position 12, found \"extra\""
        );
        let err = Error::no_deserializer("plugin/3");
        assert_eq!(err.to_string(), "No deserializer registered for plugin/3");
    }
}
