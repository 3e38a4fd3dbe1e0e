//! Assertion functions for checking what a table emitted.
//!
//! Spilled records come out in no particular order (bucket order, partition order
//! and spill timing all play a part), so the helpers here compare without regard
//! to order.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections contain the same elements, ignoring order.
///
/// Duplicates count: `[1, 1, 2]` and `[1, 2, 2]` are different.
///
/// # Panics
///
/// Panics if the collections differ in content (ignoring order).
///
/// # Example
///
/// ```
/// use prereduce::testing::assert_collections_unordered_equal;
///
/// let actual = vec![3, 1, 2];
/// let expected = vec![1, 2, 3];
/// assert_collections_unordered_equal(&actual, &expected);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    let actual_counts = multiset(actual);
    let expected_counts = multiset(expected);
    if actual_counts != expected_counts {
        let missing: Vec<_> = expected_counts
            .iter()
            .filter(|(e, n)| actual_counts.get(*e).copied().unwrap_or(0) < **n)
            .map(|(e, _)| *e)
            .collect();
        let extra: Vec<_> = actual_counts
            .iter()
            .filter(|(a, n)| expected_counts.get(*a).copied().unwrap_or(0) < **n)
            .map(|(a, _)| *a)
            .collect();

        panic!(
            "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

fn multiset<T: Eq + Hash>(items: &[T]) -> HashMap<&T, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

/// Assert that two collections of key-value pairs are equal after sorting by key.
///
/// # Panics
///
/// Panics if the collections differ after sorting by key.
///
/// # Example
///
/// ```
/// use prereduce::testing::assert_kv_collections_equal;
///
/// let actual = vec![("b", 2), ("a", 1)];
/// let expected = vec![("a", 1), ("b", 2)];
/// assert_kv_collections_equal(actual, expected);
/// ```
pub fn assert_kv_collections_equal<K, V>(mut actual: Vec<(K, V)>, mut expected: Vec<(K, V)>)
where
    K: Debug + Ord,
    V: Debug + PartialEq,
{
    actual.sort_by(|a, b| a.0.cmp(&b.0));
    expected.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, ((ak, av), (ek, ev))) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            ak == ek && av == ev,
            "Collection mismatch at index {i} after sorting:\n  Expected: ({ek:?}, {ev:?})\n  Actual: ({ak:?}, {av:?})\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that no key appears twice.
///
/// Use it on the records of one partition, or on everything emitted by a single
/// final flush: a table never holds two live entries for one key.
///
/// # Panics
///
/// Panics listing every duplicated key.
///
/// # Example
///
/// ```
/// use prereduce::testing::assert_unique_keys;
///
/// assert_unique_keys(["a", "b", "c"]);
/// ```
pub fn assert_unique_keys<K, I>(keys: I)
where
    K: Debug + Eq + Hash,
    I: IntoIterator<Item = K>,
{
    let mut seen: HashMap<K, usize> = HashMap::new();
    for key in keys {
        *seen.entry(key).or_insert(0) += 1;
    }
    let duplicated: Vec<_> = seen.iter().filter(|(_, n)| **n > 1).collect();
    assert!(
        duplicated.is_empty(),
        "Duplicate keys (key, occurrences): {duplicated:?}"
    );
}

/// Assert that every element of a collection satisfies a predicate.
///
/// # Panics
///
/// Panics naming the first element that fails.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Element at index {i} does not satisfy the predicate: {item:?}"
        );
    }
}
