//! Keys for associative-style access.
//!
//! A vector behaves like a map from integer positions to elements. Lookups
//! and updates that go through [`Key`] accept anything a dynamic caller
//! might hand over, and only integer keys ever address an element.

use crate::error::{Error, Result};

/// A value that may be used to address a vector associatively.
pub trait Key {
    /// The position this key denotes, or `None` if it isn't an integer.
    ///
    /// Integers that don't fit in an `i64` saturate; they are out of range
    /// for any vector anyway.
    fn as_index(&self) -> Option<i64>;
}

macro_rules! integer_key {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                fn as_index(&self) -> Option<i64> {
                    Some(i64::try_from(*self).unwrap_or(i64::MAX))
                }
            }
        )*
    };
}

macro_rules! non_integer_key {
    ($($ty:ty),*) => {
        $(
            impl Key for $ty {
                fn as_index(&self) -> Option<i64> {
                    None
                }
            }
        )*
    };
}

integer_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
non_integer_key!(f32, f64, bool, char, str, String);

impl<K: Key + ?Sized> Key for &K {
    fn as_index(&self) -> Option<i64> {
        (**self).as_index()
    }
}

/// Resolves `key` against a collection of length `len`.
///
/// Fails with [`Error::InvalidKey`] for non-integer keys. Integer keys are
/// returned as an `Ok(Err(..))` carrying the out-of-range error when they
/// don't fit in a `usize` (i.e. they're negative), so callers can decide
/// whether that is a failure or a miss.
pub(crate) fn resolve<K: Key + ?Sized>(key: &K, len: usize) -> Result<Result<usize>> {
    let index = key.as_index().ok_or(Error::InvalidKey)?;
    Ok(usize::try_from(index).map_err(|_| Error::IndexOutOfRange { index, len }))
}
