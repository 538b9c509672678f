//! Kernel functions: the fixed set of primitive operations on values.
//!
//! Primitives are total: a type-mismatched input produces the empty list
//! sentinel, never an error. Only an *unknown* function name is an error, and
//! that is raised by the evaluator, not here.

use std::collections::HashMap;
use std::sync::LazyLock;

use bytes::Bytes;

use crate::pine::value::{Value, int_from_value, int_value};

/// A kernel primitive. `None` means the soft failure sentinel: the evaluator
/// substitutes the empty list value.
pub type KernelFn = fn(&Value) -> Option<Value>;

/// The process-wide immutable kernel table.
pub type KernelTable = HashMap<&'static str, KernelFn>;

static KERNEL_TABLE: LazyLock<KernelTable> = LazyLock::new(|| {
    let mut table: KernelTable = HashMap::new();
    table.insert("equal", equal);
    table.insert("logical_not", logical_not);
    table.insert("logical_and", logical_and);
    table.insert("logical_or", logical_or);
    table.insert("length", length);
    table.insert("skip", skip);
    table.insert("take", take);
    table.insert("reverse", reverse);
    table.insert("concat", concat);
    table.insert("list_head", list_head);
    table.insert("neg_int", neg_int);
    table.insert("add_int", add_int);
    table.insert("sub_int", sub_int);
    table.insert("mul_int", mul_int);
    table.insert("div_int", div_int);
    table.insert("is_sorted_ascending_int", is_sorted_ascending_int);
    table
});

pub fn kernel_table() -> &'static KernelTable {
    &KERNEL_TABLE
}

/// Look up a primitive by name.
pub fn kernel_function(name: &str) -> Option<KernelFn> {
    KERNEL_TABLE.get(name).copied()
}

/// Apply a primitive, mapping soft failure to the empty list sentinel.
pub fn apply_kernel(function: KernelFn, argument: &Value) -> Value {
    function(argument).unwrap_or_else(Value::empty_list)
}

fn equal(argument: &Value) -> Option<Value> {
    match argument {
        Value::List(items) => Some(Value::bool_value(
            items.windows(2).all(|pair| pair[0] == pair[1]),
        )),
        Value::Blob(bytes) => Some(Value::bool_value(
            bytes.windows(2).all(|pair| pair[0] == pair[1]),
        )),
    }
}

fn logical_not(argument: &Value) -> Option<Value> {
    if argument.is_true() {
        Some(Value::false_value())
    } else if *argument == Value::false_value() {
        Some(Value::true_value())
    } else {
        None
    }
}

fn logical_and(argument: &Value) -> Option<Value> {
    bool_fold(argument, |acc, b| acc && b, true)
}

fn logical_or(argument: &Value) -> Option<Value> {
    bool_fold(argument, |acc, b| acc || b, false)
}

fn bool_fold(argument: &Value, fold: fn(bool, bool) -> bool, start: bool) -> Option<Value> {
    let items = argument.as_list()?;
    let mut acc = start;
    for item in items {
        if item.is_true() {
            acc = fold(acc, true);
        } else if *item == Value::false_value() {
            acc = fold(acc, false);
        } else {
            return None;
        }
    }
    Some(Value::bool_value(acc))
}

fn length(argument: &Value) -> Option<Value> {
    let len = match argument {
        Value::Blob(bytes) => bytes.len(),
        Value::List(items) => items.len(),
    };
    Some(int_value(len as i64))
}

fn skip(argument: &Value) -> Option<Value> {
    let (count, target) = count_and_target(argument)?;
    match target {
        Value::Blob(bytes) => {
            let start = count.min(bytes.len());
            Some(Value::Blob(bytes.slice(start..)))
        }
        Value::List(items) => {
            let start = count.min(items.len());
            Some(Value::list(items[start..].to_vec()))
        }
    }
}

fn take(argument: &Value) -> Option<Value> {
    let (count, target) = count_and_target(argument)?;
    match target {
        Value::Blob(bytes) => {
            let end = count.min(bytes.len());
            Some(Value::Blob(bytes.slice(..end)))
        }
        Value::List(items) => {
            let end = count.min(items.len());
            Some(Value::list(items[..end].to_vec()))
        }
    }
}

/// Shared `[countBlob, target]` shape for `skip`/`take`. Negative counts
/// clamp to zero.
fn count_and_target(argument: &Value) -> Option<(usize, &Value)> {
    let items = argument.as_list()?;
    let [count, target] = items else {
        return None;
    };
    let count = int_from_value(count)?.max(0) as usize;
    Some((count, target))
}

fn reverse(argument: &Value) -> Option<Value> {
    match argument {
        Value::Blob(bytes) => {
            let mut reversed = bytes.to_vec();
            reversed.reverse();
            Some(Value::blob(reversed))
        }
        Value::List(items) => {
            let mut reversed = items.to_vec();
            reversed.reverse();
            Some(Value::list(reversed))
        }
    }
}

fn concat(argument: &Value) -> Option<Value> {
    let items = argument.as_list()?;
    let Some(first) = items.first() else {
        return Some(Value::empty_list());
    };
    match first {
        Value::List(_) => {
            let mut out = Vec::new();
            for item in items {
                out.extend_from_slice(item.as_list()?);
            }
            Some(Value::list(out))
        }
        Value::Blob(_) => {
            let mut out = Vec::new();
            for item in items {
                out.extend_from_slice(item.as_blob()?);
            }
            Some(Value::Blob(Bytes::from(out)))
        }
    }
}

fn list_head(argument: &Value) -> Option<Value> {
    let items = argument.as_list()?;
    Some(items.first().cloned().unwrap_or_else(Value::empty_list))
}

fn neg_int(argument: &Value) -> Option<Value> {
    let n = int_from_value(argument)?;
    Some(int_value(n.checked_neg()?))
}

fn add_int(argument: &Value) -> Option<Value> {
    int_fold(argument, i64::checked_add)
}

fn sub_int(argument: &Value) -> Option<Value> {
    int_fold(argument, i64::checked_sub)
}

fn mul_int(argument: &Value) -> Option<Value> {
    int_fold(argument, i64::checked_mul)
}

fn div_int(argument: &Value) -> Option<Value> {
    int_fold(argument, |acc, n| {
        if n == 0 { None } else { acc.checked_div(n) }
    })
}

/// Arithmetic shape: a list of integer blobs reduced left-to-right. The
/// two-argument case is the two-element list.
fn int_fold(argument: &Value, fold: fn(i64, i64) -> Option<i64>) -> Option<Value> {
    let items = argument.as_list()?;
    let (first, rest) = items.split_first()?;
    let mut acc = int_from_value(first)?;
    for item in rest {
        acc = fold(acc, int_from_value(item)?)?;
    }
    Some(int_value(acc))
}

fn is_sorted_ascending_int(argument: &Value) -> Option<Value> {
    let items = argument.as_list()?;
    let mut previous: Option<i64> = None;
    for item in items {
        let n = int_from_value(item)?;
        if let Some(prev) = previous
            && prev > n
        {
            return Some(Value::false_value());
        }
        previous = Some(n);
    }
    Some(Value::true_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, argument: Value) -> Value {
        apply_kernel(kernel_function(name).unwrap(), &argument)
    }

    fn int_list(ns: &[i64]) -> Value {
        Value::list(ns.iter().map(|n| int_value(*n)).collect())
    }

    #[test]
    fn table_has_all_sixteen_primitives() {
        assert_eq!(kernel_table().len(), 16);
        assert!(kernel_function("no_such_function").is_none());
    }

    #[test]
    fn equal_on_lists_and_blobs() {
        let a = int_value(3);
        assert_eq!(
            apply("equal", Value::list(vec![a.clone(), a.clone()])),
            Value::true_value()
        );
        assert_eq!(
            apply("equal", Value::list(vec![a, int_value(4)])),
            Value::false_value()
        );
        assert_eq!(apply("equal", Value::empty_list()), Value::true_value());
        assert_eq!(apply("equal", Value::blob(vec![7u8, 7, 7])), Value::true_value());
        assert_eq!(apply("equal", Value::blob(vec![7u8, 8])), Value::false_value());
    }

    #[test]
    fn logic_rejects_non_bools() {
        assert_eq!(
            apply("logical_not", Value::true_value()),
            Value::false_value()
        );
        assert_eq!(
            apply("logical_not", Value::blob(vec![0u8])),
            Value::empty_list()
        );
        assert_eq!(
            apply(
                "logical_and",
                Value::list(vec![Value::true_value(), Value::false_value()])
            ),
            Value::false_value()
        );
        assert_eq!(
            apply(
                "logical_or",
                Value::list(vec![Value::false_value(), Value::true_value()])
            ),
            Value::true_value()
        );
        assert_eq!(
            apply("logical_and", Value::list(vec![int_value(1)])),
            Value::empty_list()
        );
    }

    #[test]
    fn length_of_blob_and_list() {
        assert_eq!(apply("length", Value::blob(vec![1u8, 2, 3])), int_value(3));
        assert_eq!(apply("length", int_list(&[1, 2])), int_value(2));
    }

    #[test]
    fn skip_and_take_clamp() {
        let target = int_list(&[10, 20, 30]);
        let args = |count| Value::list(vec![int_value(count), target.clone()]);

        assert_eq!(apply("skip", args(1)), int_list(&[20, 30]));
        assert_eq!(apply("skip", args(5)), Value::empty_list());
        assert_eq!(apply("skip", args(-2)), target.clone());
        assert_eq!(apply("take", args(2)), int_list(&[10, 20]));
        assert_eq!(apply("take", args(9)), target.clone());
        assert_eq!(apply("take", args(-1)), Value::empty_list());

        let blob = Value::blob(vec![1u8, 2, 3, 4]);
        assert_eq!(
            apply("skip", Value::list(vec![int_value(2), blob.clone()])),
            Value::blob(vec![3u8, 4])
        );
        assert_eq!(
            apply("take", Value::list(vec![int_value(2), blob])),
            Value::blob(vec![1u8, 2])
        );
    }

    #[test]
    fn concat_mixed_inputs_fail_soft() {
        assert_eq!(apply("concat", Value::empty_list()), Value::empty_list());
        assert_eq!(
            apply(
                "concat",
                Value::list(vec![int_list(&[1]), int_list(&[2, 3])])
            ),
            int_list(&[1, 2, 3])
        );
        assert_eq!(
            apply(
                "concat",
                Value::list(vec![Value::blob(vec![1u8]), Value::blob(vec![2u8])])
            ),
            Value::blob(vec![1u8, 2])
        );
        assert_eq!(
            apply(
                "concat",
                Value::list(vec![Value::blob(vec![1u8]), Value::empty_list()])
            ),
            Value::empty_list()
        );
    }

    #[test]
    fn list_head_of_empty_is_empty() {
        assert_eq!(apply("list_head", int_list(&[9, 8])), int_value(9));
        assert_eq!(apply("list_head", Value::empty_list()), Value::empty_list());
        assert_eq!(
            apply("list_head", Value::blob(vec![1u8])),
            Value::empty_list()
        );
    }

    #[test]
    fn reverse_blob_and_list() {
        assert_eq!(
            apply("reverse", Value::blob(vec![1u8, 2, 3])),
            Value::blob(vec![3u8, 2, 1])
        );
        assert_eq!(apply("reverse", int_list(&[1, 2, 3])), int_list(&[3, 2, 1]));
    }

    #[test]
    fn arithmetic_reduces_left_to_right() {
        assert_eq!(apply("add_int", int_list(&[3, -1, 10])), int_value(12));
        assert_eq!(apply("sub_int", int_list(&[10, 3, 2])), int_value(5));
        assert_eq!(apply("mul_int", int_list(&[2, 3, 4])), int_value(24));
        assert_eq!(apply("div_int", int_list(&[100, 5, 2])), int_value(10));
        assert_eq!(apply("neg_int", int_value(7)), int_value(-7));
    }

    #[test]
    fn arithmetic_soft_failures() {
        assert_eq!(apply("add_int", Value::empty_list()), Value::empty_list());
        assert_eq!(
            apply("add_int", Value::list(vec![int_value(1), string_arg()])),
            Value::empty_list()
        );
        assert_eq!(apply("div_int", int_list(&[1, 0])), Value::empty_list());
        assert_eq!(
            apply("add_int", Value::list(vec![int_value(i64::MAX), int_value(1)])),
            Value::empty_list()
        );
    }

    fn string_arg() -> Value {
        crate::pine::value::string_value("x")
    }

    #[test]
    fn sorted_ascending() {
        assert_eq!(
            apply("is_sorted_ascending_int", int_list(&[1, 1, 2])),
            Value::true_value()
        );
        assert_eq!(
            apply("is_sorted_ascending_int", int_list(&[2, 1])),
            Value::false_value()
        );
        assert_eq!(
            apply("is_sorted_ascending_int", Value::empty_list()),
            Value::true_value()
        );
        assert_eq!(
            apply("is_sorted_ascending_int", Value::blob(vec![1u8])),
            Value::empty_list()
        );
    }
}
