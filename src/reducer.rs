//! Key extraction and combine logic supplied by the caller.
//!
//! A [`Reducer`] tells the table two things about its value type `T`:
//! which key a value belongs to, and how to fold a newly arrived value into the
//! accumulated one. The table never asks for an identity element; the first value
//! seen for a key becomes that key's accumulator as-is.
//!
//! For one-off use, [`FnReducer`] adapts a pair of closures:
//!
//! ```
//! use prereduce::{FnReducer, Reducer};
//!
//! let words = FnReducer::new(
//!     |pair: &(String, u64)| pair.0.clone(),
//!     |acc: &mut (String, u64), next: (String, u64)| acc.1 += next.1,
//! );
//! let mut acc = ("a".to_string(), 1);
//! words.reduce(&mut acc, ("a".to_string(), 2));
//! assert_eq!(acc.1, 3);
//! assert_eq!(words.key(&acc), "a");
//! ```
//!
//! Reusable reducers for `(K, V)` pairs live in [`combiners`](crate::combiners).

use std::hash::Hash;
use std::marker::PhantomData;

/// Key extraction plus in-place combine for values of type `T`.
///
/// `reduce` is called with the accumulator on the left and the incoming value on
/// the right, in insertion order for any single key. Results are only independent
/// of spill timing and partition count if the combine is associative and
/// commutative.
pub trait Reducer<T> {
    /// Key type; equality decides whether two values combine.
    type Key: Eq + Hash;

    fn key(&self, value: &T) -> Self::Key;

    fn reduce(&self, acc: &mut T, incoming: T);
}

/// A [`Reducer`] built from a key closure and a combine closure.
pub struct FnReducer<K, KF, RF> {
    key_fn: KF,
    reduce_fn: RF,
    _k: PhantomData<fn() -> K>,
}

impl<K, KF, RF> FnReducer<K, KF, RF> {
    pub fn new(key_fn: KF, reduce_fn: RF) -> Self {
        Self {
            key_fn,
            reduce_fn,
            _k: PhantomData,
        }
    }
}

impl<T, K, KF, RF> Reducer<T> for FnReducer<K, KF, RF>
where
    K: Eq + Hash,
    KF: Fn(&T) -> K,
    RF: Fn(&mut T, T),
{
    type Key = K;

    #[inline]
    fn key(&self, value: &T) -> K {
        (self.key_fn)(value)
    }

    #[inline]
    fn reduce(&self, acc: &mut T, incoming: T) {
        (self.reduce_fn)(acc, incoming);
    }
}

impl<T, R: Reducer<T> + ?Sized> Reducer<T> for &R {
    type Key = R::Key;

    #[inline]
    fn key(&self, value: &T) -> Self::Key {
        (**self).key(value)
    }

    #[inline]
    fn reduce(&self, acc: &mut T, incoming: T) {
        (**self).reduce(acc, incoming);
    }
}
