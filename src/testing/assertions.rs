//! Assertion functions for stream outputs.

use crate::error::DataSourceError;
use std::fmt::Debug;

/// Assert that two row sequences are equal in order and content.
///
/// # Panics
///
/// Panics if the sequences differ in length or content.
///
/// # Example
///
/// ```
/// use rowstream::testing::assert_rows_in_order;
///
/// assert_rows_in_order(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_rows_in_order<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected count: {}\n  Actual count: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Row mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Split an iteration's results into the rows delivered before the first
/// error and that error, asserting nothing follows it.
///
/// # Panics
///
/// Panics if an item follows an error.
pub fn split_at_fault<T: Debug>(
    results: impl IntoIterator<Item = Result<T, DataSourceError>>,
) -> (Vec<T>, Option<DataSourceError>) {
    let mut rows = Vec::new();
    let mut iter = results.into_iter();
    for item in iter.by_ref() {
        match item {
            Ok(row) => rows.push(row),
            Err(err) => {
                let trailing: Vec<_> = iter.collect();
                assert!(
                    trailing.is_empty(),
                    "items after a fault: {trailing:?}"
                );
                return (rows, Some(err));
            }
        }
    }
    (rows, None)
}

/// Assert that `err` wraps a producer fault whose message is `expected`.
///
/// # Panics
///
/// Panics if the cause's message differs.
pub fn assert_fault_message(err: &DataSourceError, expected: &str) {
    assert_eq!(
        err.cause().to_string(),
        expected,
        "Fault message mismatch:\n  Expected: {expected:?}\n  Actual: {:?}",
        err.cause().to_string()
    );
}
