/// Builds a [`Value`](crate::Value) graph from a literal.
///
/// `[...]` becomes a sequence object, `{ "key": ... }` a record object, and
/// `null`, `undefined`, `true`, `false` map to the matching variants. Any
/// other expression goes through `Value::from`.
///
/// ```rust
/// use cachegraph::{value, Value};
///
/// let graph = value!({
///     "name": "main",
///     "chunks": [1, 2, null],
///     "parent": undefined
/// });
/// let record = graph.as_record().unwrap();
/// assert_eq!(record.get("parent"), Some(&Value::Undefined));
/// ```
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Null
    };

    (undefined) => {
        $crate::Value::Undefined
    };

    (true) => {
        $crate::Value::Bool(true)
    };

    (false) => {
        $crate::Value::Bool(false)
    };

    ([]) => {
        $crate::Value::sequence(::std::vec::Vec::new())
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Value::sequence(vec![$($crate::value!($elem)),*])
    };

    ({}) => {
        $crate::Value::record($crate::Record::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut record = $crate::Record::new();
        $(
            record.insert($key.to_string(), $crate::value!($value));
        )*
        $crate::Value::record(record)
    }};

    ($other:expr) => {
        $crate::Value::from($other)
    };
}

#[cfg(test)]
mod tests {
    use crate::{Number, Record, Value};

    #[test]
    fn test_value_macro_primitives() {
        assert_eq!(value!(null), Value::Null);
        assert_eq!(value!(undefined), Value::Undefined);
        assert_eq!(value!(true), Value::Bool(true));
        assert_eq!(value!(42), Value::Number(Number::Integer(42)));
        assert_eq!(value!(3.5), Value::Number(Number::Float(3.5)));
        assert_eq!(value!("hello"), Value::from("hello"));
    }

    #[test]
    fn test_value_macro_nested() {
        assert_eq!(value!([]), Value::sequence(vec![]));
        assert_eq!(value!({}), Value::record(Record::new()));

        let graph = value!({ "a": [1, { "b": false }] });
        let inner = graph.as_record().unwrap().get("a").unwrap();
        let items = inner.as_sequence().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items.get(1).and_then(Value::as_record).and_then(|r| r.get("b")),
            Some(&Value::Bool(false))
        );
    }
}
