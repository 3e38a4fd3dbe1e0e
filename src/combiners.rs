use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::AddAssign;

use crate::reducer::Reducer;

/// Value-level merge used by [`ByKey`].
///
/// Like [`Reducer::reduce`], the accumulator is on the left and the incoming value
/// on the right; there is no identity element.
pub trait Combine<V> {
    fn combine(&self, acc: &mut V, incoming: V);
}

/* ===================== Sum<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Sum<T>(pub PhantomData<T>);
impl<T> Sum<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T: AddAssign> Combine<T> for Sum<T> {
    #[inline]
    fn combine(&self, acc: &mut T, incoming: T) {
        *acc += incoming;
    }
}

/* ===================== Min<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Min<T>(pub PhantomData<T>);
impl<T> Min<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T: Ord> Combine<T> for Min<T> {
    #[inline]
    fn combine(&self, acc: &mut T, incoming: T) {
        if incoming < *acc { *acc = incoming }
    }
}

/* ===================== Max<T> ===================== */

#[derive(Clone, Copy, Debug, Default)]
pub struct Max<T>(pub PhantomData<T>);
impl<T> Max<T> { pub fn new() -> Self { Self(PhantomData) } }

impl<T: Ord> Combine<T> for Max<T> {
    #[inline]
    fn combine(&self, acc: &mut T, incoming: T) {
        if incoming > *acc { *acc = incoming }
    }
}

/* ===================== KeepFirst / KeepLast ===================== */

/// Keeps the first value seen for a key (deduplication).
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepFirst;

impl<T> Combine<T> for KeepFirst {
    #[inline]
    fn combine(&self, _acc: &mut T, _incoming: T) {}
}

/// Keeps the most recent value seen for a key.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepLast;

impl<T> Combine<T> for KeepLast {
    #[inline]
    fn combine(&self, acc: &mut T, incoming: T) {
        *acc = incoming;
    }
}

/* ===================== Closures ===================== */

impl<V, F: Fn(&mut V, V)> Combine<V> for F {
    #[inline]
    fn combine(&self, acc: &mut V, incoming: V) {
        self(acc, incoming);
    }
}

/* ===================== ByKey<C> ===================== */

/// Reducer for `(K, V)` pairs: the key is the first field, values are merged with
/// `C`.
///
/// ```
/// use prereduce::combiners::{ByKey, Sum};
/// use prereduce::Reducer;
///
/// let r = ByKey::new(Sum::<u64>::new());
/// let mut acc = ("hello".to_string(), 22u64);
/// r.reduce(&mut acc, ("hello".to_string(), 33));
/// assert_eq!(acc, ("hello".to_string(), 55));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ByKey<C> {
    combine: C,
}

impl<C> ByKey<C> {
    pub fn new(combine: C) -> Self { Self { combine } }
}

impl<K, V, C> Reducer<(K, V)> for ByKey<C>
where
    K: Eq + Hash + Clone,
    C: Combine<V>,
{
    type Key = K;

    #[inline]
    fn key(&self, value: &(K, V)) -> K {
        value.0.clone()
    }

    #[inline]
    fn reduce(&self, acc: &mut (K, V), incoming: (K, V)) {
        self.combine.combine(&mut acc.1, incoming.1);
    }
}

/// `ByKey(Sum)`: the classic word-count reducer.
#[must_use]
pub fn sum_by_key<V: AddAssign>() -> ByKey<Sum<V>> {
    ByKey::new(Sum::new())
}

#[must_use]
pub fn min_by_key<V: Ord>() -> ByKey<Min<V>> {
    ByKey::new(Min::new())
}

#[must_use]
pub fn max_by_key<V: Ord>() -> ByKey<Max<V>> {
    ByKey::new(Max::new())
}
