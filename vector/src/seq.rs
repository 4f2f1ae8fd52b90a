//! Block-wise traversal of persistent vectors.
//!
//! A [`ChunkedSeq`] is a position inside a vector: the 32-element block
//! that contains it and an offset within that block. It never re-walks the
//! trie for elements of the block it already holds, and jumping ahead
//! ([`ChunkedSeq::skip`]) looks up the destination block directly.
//!
//! The empty sequence is represented by `None`.

use std::{iter::FusedIterator, ops::ControlFlow};

use crate::{
    node::{MASK, WIDTH},
    Vector,
};

pub struct ChunkedSeq<'a, T> {
    vec: &'a Vector<T>,
    block: &'a [T],
    // Absolute index of `block[0]`; always a multiple of 32.
    base: usize,
    offset: usize,
}

// Can't be derived: that would require `T: Clone`.
impl<T> Clone for ChunkedSeq<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ChunkedSeq<'_, T> {}

impl<'a, T> ChunkedSeq<'a, T> {
    /// A sequence starting at `idx`, which must be in bounds.
    pub(crate) fn new(vec: &'a Vector<T>, idx: usize) -> Self {
        ChunkedSeq {
            vec,
            block: vec.array_for(idx),
            base: idx & !MASK,
            offset: idx & MASK,
        }
    }

    pub fn first(&self) -> &'a T {
        &self.block[self.offset]
    }

    /// The rest of the current block, starting with [`ChunkedSeq::first`].
    pub fn chunk(&self) -> &'a [T] {
        &self.block[self.offset..]
    }

    /// The absolute index of [`ChunkedSeq::first`] in the vector.
    pub fn index(&self) -> usize {
        self.base + self.offset
    }

    /// How many elements are left, including [`ChunkedSeq::first`].
    pub fn remaining(&self) -> usize {
        self.vec.len() - self.index()
    }

    /// Everything after [`ChunkedSeq::first`].
    pub fn rest(&self) -> Option<Self> {
        if self.offset + 1 < self.block.len() {
            Some(ChunkedSeq {
                offset: self.offset + 1,
                ..*self
            })
        } else {
            self.next_chunk()
        }
    }

    /// The sequence starting at the beginning of the next block.
    pub fn next_chunk(&self) -> Option<Self> {
        let next = self.base + self.block.len();
        (next < self.vec.len()).then(|| ChunkedSeq::new(self.vec, next))
    }

    /// Drops `n` elements, fetching the destination block directly.
    pub fn skip(&self, n: usize) -> Option<Self> {
        let offset = self.offset.checked_add(n)?;
        if offset < self.block.len() {
            Some(ChunkedSeq { offset, ..*self })
        } else {
            let idx = self.base.checked_add(offset)?;
            (idx < self.vec.len()).then(|| ChunkedSeq::new(self.vec, idx))
        }
    }

    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            vec: self.vec,
            block: self.chunk().iter(),
            next: self.base + self.block.len(),
            end: self.vec.len(),
        }
    }

    /// Folds the remaining elements in order, stopping early as soon as `f`
    /// breaks.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> ControlFlow<B, B>,
    {
        self.fold_indexed(init, |acc, _, elt| f(acc, elt))
    }

    /// Like [`ChunkedSeq::fold`], but `f` also receives each element's
    /// absolute index in the vector.
    pub fn fold_indexed<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, usize, &T) -> ControlFlow<B, B>,
    {
        // Drain the block we already hold before looking up any others.
        let mut acc = init;
        for (i, elt) in self.chunk().iter().enumerate() {
            match f(acc, self.index() + i, elt) {
                ControlFlow::Continue(next) => acc = next,
                ControlFlow::Break(reduced) => return reduced,
            }
        }
        self.vec
            .fold_indexed_from(self.base + self.block.len(), acc, f)
    }
}

impl<'a, T: Clone> ChunkedSeq<'a, T> {
    /// Folds the remaining elements, starting from [`ChunkedSeq::first`].
    pub fn reduce<F>(&self, mut f: F) -> T
    where
        F: FnMut(T, &T) -> ControlFlow<T, T>,
    {
        let first = self.first().clone();
        match self.rest() {
            Some(rest) => rest.fold(first, |acc, elt| f(acc, elt)),
            None => first,
        }
    }
}

impl<'a, T> IntoIterator for ChunkedSeq<'a, T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over a range of a vector, one block at a time.
pub struct Iter<'a, T> {
    vec: &'a Vector<T>,
    block: std::slice::Iter<'a, T>,
    // Absolute index of the first element after `block`.
    next: usize,
    end: usize,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(vec: &'a Vector<T>, start: usize, end: usize) -> Self {
        debug_assert!(start <= end && end <= vec.len());
        if start == end {
            return Iter {
                vec,
                block: [].iter(),
                next: end,
                end,
            };
        }

        let block = vec.array_for(start);
        let base = start & !MASK;
        let stop = block.len().min(end - base);
        Iter {
            vec,
            block: block[(start & MASK)..stop].iter(),
            next: base + stop,
            end,
        }
    }
}

// Can't be derived: that would require `T: Clone`.
impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            vec: self.vec,
            block: self.block.clone(),
            next: self.next,
            end: self.end,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(ret) = self.block.next() {
            return Some(ret);
        }
        if self.next >= self.end {
            return None;
        }

        let block = self.vec.array_for(self.next);
        let stop = block.len().min(self.end - self.next).min(WIDTH);
        self.block = block[..stop].iter();
        self.next += stop;
        self.block.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.block.len() + (self.end - self.next);
        (len, Some(len))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walking_blocks() {
        let vec: Vector<u32> = (0..100).collect();
        let seq = vec.seq().unwrap();
        assert_eq!(seq.first(), &0);
        assert_eq!(seq.chunk().len(), 32);
        assert_eq!(seq.remaining(), 100);

        let next = seq.next_chunk().unwrap();
        assert_eq!(next.first(), &32);
        assert_eq!(next.index(), 32);

        let last = next.skip(64).unwrap();
        assert_eq!(last.first(), &96);
        assert_eq!(last.chunk(), &[96, 97, 98, 99]);
        assert!(last.next_chunk().is_none());
        assert!(last.skip(4).is_none());
        assert_eq!(last.skip(3).unwrap().first(), &99);
    }

    #[test]
    fn rest_crosses_blocks() {
        let vec: Vector<u32> = (0..40).collect();
        let mut seq = vec.slice_from(30);
        let mut seen = Vec::new();
        while let Some(s) = seq {
            seen.push(*s.first());
            seq = s.rest();
        }
        assert_eq!(seen, (30..40).collect::<Vec<_>>());
    }

    #[test]
    fn fold_mid_block() {
        let vec: Vector<u32> = (0..100).collect();
        let seq = vec.slice_from(10).unwrap();
        let indices = seq.fold_indexed(Vec::new(), |mut acc, i, x| {
            assert_eq!(i as u32, *x);
            acc.push(i);
            ControlFlow::Continue(acc)
        });
        assert_eq!(indices, (10..100).collect::<Vec<_>>());
        assert_eq!(
            seq.reduce(|a, b| ControlFlow::Continue(a + b)),
            (10..100).sum::<u32>()
        );
    }

    #[test]
    fn iter_is_exact() {
        let vec: Vector<u32> = (0..70).collect();
        let iter = vec.iter_from(5);
        assert_eq!(iter.len(), 65);
        assert_eq!(iter.copied().collect::<Vec<_>>(), (5..70).collect::<Vec<_>>());
        assert_eq!(vec.iter_from(70).count(), 0);
        assert_eq!(vec.slice_from(33).unwrap().iter().len(), 37);
    }
}
