//! Token stream format.
//!
//! A serialized object graph is a flat sequence of [`Token`]s. There are no
//! length prefixes; structure is recovered purely from the escape grammar.
//!
//! # Grammar
//!
//! ```text
//! Stream           -> VERSION Section*
//! Section          -> ObjectSection | ReferenceSection | EscapeSection | OtherSection
//! ObjectSection    -> ESCAPE ( number:typeOffset (> 0) | string:origin discriminator )
//!                     Section* ESCAPE ESCAPE_END_OBJECT
//! ReferenceSection -> ESCAPE number:relativeOffset (< 0)
//! EscapeSection    -> ESCAPE ESCAPE_ESCAPE_VALUE   (a literal null)
//!                   | ESCAPE ESCAPE_UNDEFINED      (undefined)
//! OtherSection     -> any token except ESCAPE
//! ```
//!
//! | Marker | Token |
//! |--------|-------|
//! | `ESCAPE` | `Null` |
//! | `ESCAPE_ESCAPE_VALUE` | `Null` |
//! | `ESCAPE_END_OBJECT` | `Bool(true)` |
//! | `ESCAPE_UNDEFINED` | `Bool(false)` |
//!
//! `Null` is the escape marker because a later binary stage can merge runs
//! of nulls cheaply.
//!
//! # Positions
//!
//! Two independent position counters exist per stream:
//!
//! - the **reference** position advances once per non-empty string, byte
//!   buffer, and object (the object after its end marker);
//!   `ESCAPE, -n` means "the value registered `n` positions ago";
//! - the **type** position advances once per distinct `(origin, discriminator)`
//!   tag; `ESCAPE, n` with `n > 0` means "the tag first seen `n` tags ago".
//!
//! # Example
//!
//! One record `{name: "a"}` written twice:
//!
//! ```text
//! 1                       version
//! null "" null            object section, origin "", unnamed discriminator
//!   "name" "a"            field name and value (reference positions 0 and 1)
//!   null null             end of fields
//! null true               end of object (reference position 2)
//! null -1                 back-reference to the record
//! ```

use crate::deferred::LazyTokens;
use crate::Number;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// Format version written as the first token of every stream.
pub const CURRENT_VERSION: i64 = 1;

pub const ESCAPE: Token = Token::Null;
pub const ESCAPE_ESCAPE_VALUE: Token = Token::Null;
pub const ESCAPE_END_OBJECT: Token = Token::Bool(true);
pub const ESCAPE_UNDEFINED: Token = Token::Bool(false);

/// One element of a serialized stream.
#[derive(Clone, PartialEq)]
pub enum Token {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Buffer(Bytes),
    /// A section whose tokens are produced on demand.
    Lazy(LazyTokens),
}

impl Token {
    #[inline]
    #[must_use]
    pub const fn is_escape(&self) -> bool {
        matches!(self, Token::Null)
    }

    #[inline]
    #[must_use]
    pub const fn is_end_object(&self) -> bool {
        matches!(self, Token::Bool(true))
    }

    #[inline]
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Token::Bool(false))
    }

    /// Returns the integer carried by a number token.
    #[inline]
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Token::Number(Number::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_lazy(&self) -> Option<&LazyTokens> {
        match self {
            Token::Lazy(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Number(n) => write!(f, "{}", n),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Buffer(b) => write!(f, "<buffer {} bytes>", b.len()),
            Token::Lazy(_) => write!(f, "<lazy>"),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<bool> for Token {
    fn from(value: bool) -> Self {
        Token::Bool(value)
    }
}

impl From<i32> for Token {
    fn from(value: i32) -> Self {
        Token::Number(Number::Integer(value as i64))
    }
}

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token::Number(Number::Integer(value))
    }
}

impl From<f64> for Token {
    fn from(value: f64) -> Self {
        Token::Number(Number::Float(value))
    }
}

impl From<Number> for Token {
    fn from(value: Number) -> Self {
        Token::Number(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::String(value.into())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::String(value.into())
    }
}

impl From<Arc<str>> for Token {
    fn from(value: Arc<str>) -> Self {
        Token::String(value)
    }
}

impl From<Bytes> for Token {
    fn from(value: Bytes) -> Self {
        Token::Buffer(value)
    }
}

/// Outcome of serializing a list of roots.
#[derive(Clone, Debug, PartialEq)]
pub enum Serialized {
    /// The finished token stream, version first.
    Tokens(Vec<Token>),
    /// The graph contains a kind marked as never serializable; the caller
    /// should not cache it.
    NotSerializable,
}

impl Serialized {
    #[must_use]
    pub fn is_not_serializable(&self) -> bool {
        matches!(self, Serialized::NotSerializable)
    }

    /// Returns the token stream, or `None` for the skip result.
    #[must_use]
    pub fn into_tokens(self) -> Option<Vec<Token>> {
        match self {
            Serialized::Tokens(tokens) => Some(tokens),
            Serialized::NotSerializable => None,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> Option<&[Token]> {
        match self {
            Serialized::Tokens(tokens) => Some(tokens),
            Serialized::NotSerializable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert!(ESCAPE.is_escape());
        assert!(ESCAPE_ESCAPE_VALUE.is_escape());
        assert!(ESCAPE_END_OBJECT.is_end_object());
        assert!(ESCAPE_UNDEFINED.is_undefined());
        assert_ne!(ESCAPE_END_OBJECT, ESCAPE_UNDEFINED);
    }

    #[test]
    fn test_debug_rendering() {
        let tokens = vec![Token::from(1), ESCAPE, Token::from("a"), ESCAPE_END_OBJECT];
        assert_eq!(format!("{:?}", tokens), "[1, null, \"a\", true]");
    }

    #[test]
    fn test_integer_accessor() {
        assert_eq!(Token::from(-3).as_integer(), Some(-3));
        assert_eq!(Token::from(1.5).as_integer(), None);
        assert_eq!(Token::Null.as_integer(), None);
    }
}
