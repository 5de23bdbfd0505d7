//! Numeric reducers over JSON-encoded scalars
//!
//! Inputs arrive as decoded JSON values from partial responses. A value
//! that does not decode into the reducer's numeric domain is skipped; when
//! every value fails to decode the reduction yields `None`.

use serde_json::Value;

/// Reduction applied to one indicator across the group
///
/// The reducer knows its numeric domain; the catalog picks the variant by
/// (scope, indicator name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregator {
    /// Sum of f64 values
    SumF64,
    /// Wrapping sum of i64 values
    SumI64,
    /// Wrapping sum of u64 values
    SumU64,
    /// Maximum of f64 values
    MaxF64,
    /// Maximum of i64 values
    MaxI64,
    /// Maximum of u64 values
    MaxU64,
    /// Minimum of f64 values
    MinF64,
    /// Minimum of i64 values
    MinI64,
    /// Minimum of u64 values
    MinU64,
    /// Mean of f64 values
    AvgF64,
    /// Truncating mean of i64 values
    AvgI64,
    /// Truncating mean of u64 values
    AvgU64,
}

impl Aggregator {
    /// Combine `values` into one scalar
    ///
    /// Integral sums wrap silently; inputs are expected to be counters
    /// within 2^63. Averages divide by the count of values that decoded,
    /// truncating toward zero in the integral domains. Ties in max/min
    /// keep the first occurrence.
    pub fn reduce(&self, values: &[Value]) -> Option<Value> {
        match self {
            Aggregator::SumF64 => fold(values, Value::as_f64, |a, b| a + b).map(Value::from),
            Aggregator::SumI64 => fold(values, Value::as_i64, i64::wrapping_add).map(Value::from),
            Aggregator::SumU64 => fold(values, Value::as_u64, u64::wrapping_add).map(Value::from),
            Aggregator::MaxF64 => {
                fold(values, Value::as_f64, |a, b| if b > a { b } else { a }).map(Value::from)
            }
            Aggregator::MaxI64 => {
                fold(values, Value::as_i64, |a, b| if b > a { b } else { a }).map(Value::from)
            }
            Aggregator::MaxU64 => {
                fold(values, Value::as_u64, |a, b| if b > a { b } else { a }).map(Value::from)
            }
            Aggregator::MinF64 => {
                fold(values, Value::as_f64, |a, b| if b < a { b } else { a }).map(Value::from)
            }
            Aggregator::MinI64 => {
                fold(values, Value::as_i64, |a, b| if b < a { b } else { a }).map(Value::from)
            }
            Aggregator::MinU64 => {
                fold(values, Value::as_u64, |a, b| if b < a { b } else { a }).map(Value::from)
            }
            Aggregator::AvgF64 => {
                let decoded: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                if decoded.is_empty() {
                    None
                } else {
                    Some(Value::from(
                        decoded.iter().sum::<f64>() / decoded.len() as f64,
                    ))
                }
            }
            Aggregator::AvgI64 => {
                let decoded: Vec<i64> = values.iter().filter_map(Value::as_i64).collect();
                if decoded.is_empty() {
                    None
                } else {
                    let sum = decoded.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
                    Some(Value::from(sum / decoded.len() as i64))
                }
            }
            Aggregator::AvgU64 => {
                let decoded: Vec<u64> = values.iter().filter_map(Value::as_u64).collect();
                if decoded.is_empty() {
                    None
                } else {
                    let sum = decoded.iter().fold(0u64, |acc, v| acc.wrapping_add(*v));
                    Some(Value::from(sum / decoded.len() as u64))
                }
            }
        }
    }
}

fn fold<T, D, C>(values: &[Value], decode: D, combine: C) -> Option<T>
where
    T: Copy,
    D: Fn(&Value) -> Option<T>,
    C: Fn(T, T) -> T,
{
    let mut acc: Option<T> = None;
    for value in values {
        if let Some(decoded) = decode(value) {
            acc = Some(match acc {
                None => decoded,
                Some(current) => combine(current, decoded),
            });
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_sum_i64() {
        let values = vec![json!(17), json!(25), json!(8)];
        assert_eq!(Aggregator::SumI64.reduce(&values), Some(json!(50)));
    }

    #[test]
    fn test_sum_i64_wraps() {
        let values = vec![json!(i64::MAX), json!(1)];
        assert_eq!(
            Aggregator::SumI64.reduce(&values),
            Some(json!(i64::MIN))
        );
    }

    #[test]
    fn test_max_min_i64() {
        let values = vec![json!(100), json!(250), json!(170)];
        assert_eq!(Aggregator::MaxI64.reduce(&values), Some(json!(250)));
        assert_eq!(Aggregator::MinI64.reduce(&values), Some(json!(100)));
    }

    #[test]
    fn test_sum_f64() {
        let values = vec![json!(1.5), json!(2.25)];
        assert_eq!(Aggregator::SumF64.reduce(&values), Some(json!(3.75)));
    }

    #[test]
    fn test_avg_f64() {
        let values = vec![json!(1.0), json!(2.0), json!(6.0)];
        assert_eq!(Aggregator::AvgF64.reduce(&values), Some(json!(3.0)));
    }

    #[test]
    fn test_avg_i64_truncates_toward_zero() {
        let values = vec![json!(-3), json!(-4)];
        assert_eq!(Aggregator::AvgI64.reduce(&values), Some(json!(-3)));

        let values = vec![json!(3), json!(4)];
        assert_eq!(Aggregator::AvgI64.reduce(&values), Some(json!(3)));
    }

    #[test]
    fn test_undecodable_values_are_skipped() {
        let values = vec![json!("oops"), json!(5), json!(null), json!(7)];
        assert_eq!(Aggregator::SumU64.reduce(&values), Some(json!(12)));
        // Avg divides by the decoded count, not the input count.
        assert_eq!(Aggregator::AvgU64.reduce(&values), Some(json!(6)));
    }

    #[test]
    fn test_all_undecodable_is_none() {
        let values = vec![json!("a"), json!([1, 2])];
        assert_eq!(Aggregator::MaxI64.reduce(&values), None);
    }

    #[test]
    fn test_empty_input_is_none() {
        assert_eq!(Aggregator::SumF64.reduce(&[]), None);
        assert_eq!(Aggregator::AvgI64.reduce(&[]), None);
    }

    #[test]
    fn test_integer_values_decode_in_f64_domain() {
        let values = vec![json!(3), json!(4.5)];
        assert_eq!(Aggregator::SumF64.reduce(&values), Some(json!(7.5)));
    }

    proptest! {
        // Sum is order-independent modulo wrap, so shuffling the inputs
        // must not change the aggregate.
        #[test]
        fn prop_sum_i64_is_permutation_invariant(mut values in prop::collection::vec(any::<i64>(), 1..16)) {
            let forward: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            let a = Aggregator::SumI64.reduce(&forward);
            values.reverse();
            let backward: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            let b = Aggregator::SumI64.reduce(&backward);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_max_u64_equals_slice_max(values in prop::collection::vec(any::<u64>(), 1..16)) {
            let encoded: Vec<Value> = values.iter().map(|v| json!(v)).collect();
            let reduced = Aggregator::MaxU64.reduce(&encoded);
            prop_assert_eq!(reduced, Some(json!(values.iter().copied().max().unwrap())));
        }
    }
}
