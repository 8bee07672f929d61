//! Property-based tests for the round-trip guarantee: every graph that
//! serializes comes back equal, and sharing is preserved.

use cachegraph::{deserialize, from_value, serialize, to_value, Record, Token, Value};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

fn roundtrip(values: &[Value]) -> bool {
    let tokens = match serialize(values) {
        Ok(serialized) => match serialized.into_tokens() {
            Some(tokens) => tokens,
            None => return false,
        },
        Err(e) => {
            eprintln!("Serialize failed: {}", e);
            return false;
        }
    };
    match deserialize(tokens.clone()) {
        Ok(back) => back == values,
        Err(e) => {
            eprintln!("Deserialize failed: {}", e);
            eprintln!("Tokens were: {:?}", tokens);
            false
        }
    }
}

fn serde_roundtrip<T>(value: &T) -> bool
where
    T: Serialize + for<'de> Deserialize<'de> + PartialEq + std::fmt::Debug,
{
    let Ok(graph) = to_value(value) else {
        return false;
    };
    let Some(tokens) = serialize(&[graph]).ok().and_then(|s| s.into_tokens()) else {
        return false;
    };
    match deserialize(tokens) {
        Ok(mut back) if back.len() == 1 => from_value::<T>(back.remove(0))
            .map(|v| v == *value)
            .unwrap_or(false),
        _ => false,
    }
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(|b| Value::Buffer(b.into())),
    ]
}

fn graph() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::sequence),
            prop::collection::vec(("[a-z]{0,4}", inner), 0..6).prop_map(|fields| {
                Value::record(fields.into_iter().collect::<Record>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_leaves(values in prop::collection::vec(leaf(), 0..20)) {
        prop_assert!(roundtrip(&values));
    }

    #[test]
    fn prop_nested_graphs(values in prop::collection::vec(graph(), 0..4)) {
        prop_assert!(roundtrip(&values));
    }

    #[test]
    fn prop_repeated_strings_are_referenced(s in "[a-z]{1,8}", n in 2usize..10) {
        let values: Vec<Value> = std::iter::repeat(Value::from(s.as_str())).take(n).collect();
        let tokens = serialize(&values).unwrap().into_tokens().unwrap();
        // version, the string once, then an escape pair per repeat
        prop_assert_eq!(tokens.len(), 2 + 2 * (n - 1));
        prop_assert!(tokens[3..].iter().step_by(2).all(|t| *t == Token::from(-1)));
        prop_assert!(roundtrip(&values));
    }

    #[test]
    fn prop_shared_object_identity(g in graph(), copies in 2usize..5) {
        let shared = Value::sequence(vec![g]);
        let values: Vec<Value> = std::iter::repeat(shared).take(copies).collect();
        let tokens = serialize(&values).unwrap().into_tokens().unwrap();
        let back = deserialize(tokens).unwrap();
        let first = back[0].as_object().unwrap();
        prop_assert!(back.iter().all(|v| v.as_object().unwrap().ptr_eq(first)));
    }

    #[test]
    fn prop_serde_vec_i64(v in prop::collection::vec(any::<i64>(), 0..20)) {
        prop_assert!(serde_roundtrip(&v));
    }

    #[test]
    fn prop_serde_u64(n in any::<u64>()) {
        prop_assert!(serde_roundtrip(&n));
    }

    #[test]
    fn prop_serde_vec_u64(v in prop::collection::vec(any::<u64>(), 0..20)) {
        prop_assert!(serde_roundtrip(&v));
    }

    #[test]
    fn prop_serde_option_string(opt in proptest::option::of("[a-z]{0,8}")) {
        prop_assert!(serde_roundtrip(&opt));
    }

    #[test]
    fn prop_serde_tuple(t in (any::<i32>(), any::<bool>(), "[a-z]{0,8}")) {
        prop_assert!(serde_roundtrip(&t));
    }
}
