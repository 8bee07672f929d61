//! Build diagnostics that survive the cache.
//!
//! [`Diagnostic`] is the base kind warnings and errors reported during a
//! build are stored as. It is registered like any user type, through
//! [`Serializable`], under the `cachegraph/diagnostic` origin.

use crate::builtins::{optional_string, write_optional};
use crate::de::DecodeContext;
use crate::registry::Serializable;
use crate::ser::EncodeContext;
use crate::{Result, Sequence, Value};
use std::fmt;

/// Origin the [`Diagnostic`] kind is registered under.
pub const DIAGNOSTIC_ORIGIN: &str = "cachegraph/diagnostic";

/// A warning or error produced while building, with enough context to
/// replay it from the cache.
///
/// # Examples
///
/// ```rust
/// use cachegraph::{deserialize, serialize, Diagnostic, Value};
///
/// let diagnostic = Diagnostic::new("ModuleNotFoundError", "Can't resolve './missing'")
///     .with_details("resolve './missing' in '/src'")
///     .with_missing(vec!["/src/missing.js".to_string()]);
///
/// let tokens = serialize(&[Value::object(diagnostic.clone())])
///     .unwrap()
///     .into_tokens()
///     .unwrap();
/// let back = deserialize(tokens).unwrap();
/// assert_eq!(back[0].downcast_ref::<Diagnostic>(), Some(&diagnostic));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnostic {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub details: Option<String>,
    /// Paths whose absence caused the diagnostic.
    pub missing: Option<Vec<String>>,
    /// Source location, in whatever shape the reporter uses. `Undefined` when absent.
    pub loc: Value,
    pub hide_stack: bool,
    /// The value this diagnostic wraps. `Undefined` when absent.
    pub cause: Value,
}

impl Diagnostic {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            name: name.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = Some(missing);
        self
    }

    #[must_use]
    pub fn with_loc(mut self, loc: impl Into<Value>) -> Self {
        self.loc = loc.into();
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<Value>) -> Self {
        self.cause = cause.into();
        self
    }

    #[must_use]
    pub fn hide_stack(mut self) -> Self {
        self.hide_stack = true;
        self
    }

    /// The stack followed by the details, as shown to the user.
    #[must_use]
    pub fn inspect(&self) -> String {
        let mut out = match (&self.stack, self.hide_stack) {
            (Some(stack), false) => stack.clone(),
            _ => self.to_string(),
        };
        if let Some(details) = &self.details {
            out.push('\n');
            out.push_str(details);
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for Diagnostic {}

fn optional_value(value: Value) -> Option<Value> {
    match value {
        Value::Undefined => None,
        other => Some(other),
    }
}

impl Serializable for Diagnostic {
    fn serialize(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        ctx.write(&self.cause)?;
        ctx.write(self.name.as_str())?;
        ctx.write(self.message.as_str())?;
        write_optional(ctx, self.stack.as_deref())?;
        write_optional(ctx, self.details.as_deref())?;
        write_optional(
            ctx,
            self.missing
                .as_ref()
                .map(|missing| Value::sequence(missing.iter().map(|path| Value::from(path.as_str())))),
        )?;
        ctx.write(&self.loc)?;
        ctx.write(self.hide_stack)
    }

    fn deserialize(ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let cause = ctx.read()?;
        let name = ctx.read()?.expect_type()?;
        let message = ctx.read()?.expect_type()?;
        let stack = optional_string(ctx.read()?)?;
        let details = optional_string(ctx.read()?)?;
        let missing = match optional_value(ctx.read()?) {
            Some(value) => {
                let sequence = value
                    .downcast_ref::<Sequence>()
                    .ok_or_else(|| crate::Error::type_mismatch("sequence", value.type_name()))?;
                let paths = sequence
                    .iter()
                    .map(|path| path.clone().expect_type::<String>())
                    .collect::<Result<Vec<_>>>()?;
                Some(paths)
            }
            None => None,
        };
        let loc = ctx.read()?;
        let hide_stack = ctx.read()?.expect_type()?;
        Ok(Diagnostic {
            name,
            message,
            stack,
            details,
            missing,
            loc,
            hide_stack,
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, ErrorObject, ObjectMiddleware, Record, Registry, Token};
    use std::sync::Arc;

    fn roundtrip(value: &Value) -> Value {
        let middleware = ObjectMiddleware::new(Arc::new(Registry::new()));
        let tokens = middleware
            .serialize(std::slice::from_ref(value))
            .unwrap()
            .into_tokens()
            .unwrap();
        middleware.deserialize(tokens).unwrap().remove(0)
    }

    #[test]
    fn test_minimal_diagnostic_roundtrip() {
        let value = Value::object(Diagnostic::new("Warning", "unused export"));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_full_diagnostic_roundtrip() {
        let mut loc = Record::new();
        loc.insert("line".to_string(), Value::from(3));
        loc.insert("column".to_string(), Value::from(14));

        let diagnostic = Diagnostic::new("ModuleParseError", "Unexpected token")
            .with_stack("ModuleParseError: Unexpected token\n    at parse")
            .with_details("while parsing ./src/index.js")
            .with_missing(vec!["./a".to_string(), "./b".to_string()])
            .with_loc(Value::record(loc))
            .with_cause(Value::object(ErrorObject::new(ErrorKind::SyntaxError, "Unexpected token")))
            .hide_stack();
        let value = Value::object(diagnostic);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_loc_and_cause_keep_their_exact_value() {
        for loc in [Value::Undefined, Value::Null, Value::from(0)] {
            let diagnostic = Diagnostic::new("Warning", "w")
                .with_loc(loc.clone())
                .with_cause(Value::Null);
            let back = roundtrip(&Value::object(diagnostic));
            let back = back.downcast_ref::<Diagnostic>().unwrap();
            assert_eq!(back.loc, loc);
            assert_eq!(back.cause, Value::Null);
        }
    }

    #[test]
    fn test_tagged_with_its_origin() {
        let tokens = crate::serialize(&[Value::object(Diagnostic::new("E", "m"))])
            .unwrap()
            .into_tokens()
            .unwrap();
        assert_eq!(tokens[2], Token::from(DIAGNOSTIC_ORIGIN));
        assert_eq!(tokens[3], Token::Null);
    }

    #[test]
    fn test_inspect() {
        let diagnostic = Diagnostic::new("Error", "boom").with_details("more");
        assert_eq!(diagnostic.inspect(), "Error: boom\nmore");

        let with_stack = diagnostic.clone().with_stack("Error: boom\n    at x");
        assert_eq!(with_stack.inspect(), "Error: boom\n    at x\nmore");
        assert_eq!(with_stack.hide_stack().inspect(), "Error: boom\nmore");
    }
}
