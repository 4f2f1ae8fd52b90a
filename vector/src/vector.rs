use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::{ControlFlow, Index},
    sync::Arc,
};

use imbl_sized_chunks::Chunk;
use indexmap::IndexMap;

use crate::{
    config::Config,
    error::{Error, Result},
    key::{self, Key},
    node::{self, tail_offset, Leaf, Node, BITS, MASK, WIDTH},
    seq::{ChunkedSeq, Iter},
    transient::TransientVector,
};

/// Arbitrary data attached to a vector. It plays no part in comparisons.
pub type Metadata = IndexMap<String, String>;

/// A persistent vector.
///
/// Cloning is `O(1)`, and every "modifying" operation returns a new vector
/// that shares all the unmodified parts of the trie with the original. The
/// most recently appended elements (up to 32 of them) are kept in a separate
/// tail, so that appending is usually just a copy of the tail.
///
/// The trie is never empty of levels: an empty vector has a shift of 5 and
/// an empty root, and the shift grows by 5 each time the root runs out of
/// room.
pub struct Vector<T> {
    count: usize,
    shift: u32,
    root: Arc<Node<T>>,
    tail: Arc<Leaf<T>>,
    meta: Option<Arc<Metadata>>,
    config: Config<T>,
}

// Can't be derived: that would require `T: Clone`.
impl<T> Clone for Vector<T> {
    fn clone(&self) -> Self {
        Vector {
            count: self.count,
            shift: self.shift,
            root: Arc::clone(&self.root),
            tail: Arc::clone(&self.tail),
            meta: self.meta.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T> Vector<T> {
    pub fn new() -> Self {
        Self::empty(Config::default())
    }

    /// An empty vector using `config`.
    pub fn empty(config: Config<T>) -> Self {
        Vector {
            count: 0,
            shift: BITS,
            root: Arc::new(Node::empty(None)),
            tail: Arc::new(Chunk::new()),
            meta: None,
            config,
        }
    }

    pub(crate) fn from_parts(
        count: usize,
        shift: u32,
        root: Arc<Node<T>>,
        tail: Arc<Leaf<T>>,
        config: Config<T>,
    ) -> Self {
        Vector {
            count,
            shift,
            root,
            tail,
            meta: None,
            config,
        }
    }

    /// A vector with our metadata and configuration, but different contents.
    fn with_parts(&self, count: usize, shift: u32, root: Arc<Node<T>>, tail: Arc<Leaf<T>>) -> Self {
        Vector {
            count,
            shift,
            root,
            tail,
            meta: self.meta.clone(),
            config: self.config.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The height of the trie, in bits: 5 times the number of levels below
    /// the root.
    pub fn shift(&self) -> u32 {
        self.shift
    }

    fn tail_offset(&self) -> usize {
        tail_offset(self.count)
    }

    /// The 32-element block containing index `idx`. The last block is the
    /// tail, which may be shorter.
    ///
    /// Panics if `idx` is out of bounds.
    pub(crate) fn array_for(&self, idx: usize) -> &[T] {
        assert!(idx < self.count, "index {idx} out of bounds");
        if idx >= self.tail_offset() {
            &self.tail
        } else {
            node::leaf_for(&self.root, self.shift, idx)
        }
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        (idx < self.count).then(|| &self.array_for(idx)[idx & MASK])
    }

    /// The element at `idx`, failing if there is none.
    pub fn nth(&self, idx: usize) -> Result<&T> {
        self.get(idx)
            .ok_or_else(|| Error::out_of_range(idx, self.count))
    }

    /// The element at `idx`, or `default` if there is none.
    pub fn get_or<'a>(&'a self, idx: usize, default: &'a T) -> &'a T {
        self.get(idx).unwrap_or(default)
    }

    /// Associative lookup. Anything that isn't an in-range integer key
    /// misses.
    pub fn val_at<K: Key + ?Sized>(&self, key: &K) -> Option<&T> {
        match key::resolve(key, self.count) {
            Ok(Ok(idx)) => self.get(idx),
            _ => None,
        }
    }

    pub fn contains_key<K: Key + ?Sized>(&self, key: &K) -> bool {
        self.val_at(key).is_some()
    }

    /// The index and element `key` denotes, if it denotes one.
    pub fn entry_at<K: Key + ?Sized>(&self, key: &K) -> Option<(usize, &T)> {
        match key::resolve(key, self.count) {
            Ok(Ok(idx)) => self.get(idx).map(|elt| (idx, elt)),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&Metadata> {
        self.meta.as_deref()
    }

    pub fn with_meta(&self, meta: Option<Metadata>) -> Self {
        Vector {
            meta: meta.map(Arc::new),
            ..self.clone()
        }
    }

    pub fn config(&self) -> &Config<T> {
        &self.config
    }

    /// The same elements, using a different configuration. Nothing is
    /// copied.
    pub fn with_config(&self, config: Config<T>) -> Self {
        Vector {
            config,
            ..self.clone()
        }
    }

    /// Calls this vector's handler with the vector itself and `args`.
    pub fn invoke(&self, args: &[T]) -> Result<T> {
        let options = self.config.options();
        let handler = options.handler.as_ref().ok_or(Error::NoHandler)?;
        Ok(handler(self, args))
    }

    /// A sequence over all the elements, or `None` if we're empty.
    pub fn seq(&self) -> Option<ChunkedSeq<'_, T>> {
        self.slice_from(0)
    }

    /// A sequence over the elements starting at `from`, or `None` if there
    /// aren't any. Runs in `O(log n)`.
    pub fn slice_from(&self, from: usize) -> Option<ChunkedSeq<'_, T>> {
        (from < self.count).then(|| ChunkedSeq::new(self, from))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.into_iter()
    }

    /// An iterator over the elements starting at `idx`.
    ///
    /// Panics if `idx` is greater than the length.
    pub fn iter_from(&self, idx: usize) -> Iter<'_, T> {
        assert!(idx <= self.count, "index {idx} out of bounds");
        Iter::new(self, idx, self.count)
    }

    /// Folds the elements in order, stopping early as soon as `f` breaks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::ops::ControlFlow;
    /// # use thingy_vector::Vector;
    /// let vec: Vector<u32> = (1..=100).collect();
    /// let sum = vec.fold(0, |acc, x| {
    ///     let acc = acc + x;
    ///     if acc > 10 { ControlFlow::Break(acc) } else { ControlFlow::Continue(acc) }
    /// });
    /// assert_eq!(sum, 15);
    /// ```
    pub fn fold<B, F>(&self, init: B, mut f: F) -> B
    where
        F: FnMut(B, &T) -> ControlFlow<B, B>,
    {
        self.fold_indexed_from(0, init, |acc, _, elt| f(acc, elt))
    }

    /// Like [`Vector::fold`], but `f` also receives each element's index.
    pub fn fold_indexed<B, F>(&self, init: B, f: F) -> B
    where
        F: FnMut(B, usize, &T) -> ControlFlow<B, B>,
    {
        self.fold_indexed_from(0, init, f)
    }

    /// Folds the elements from index `start` on, reading one block at a
    /// time.
    pub(crate) fn fold_indexed_from<B, F>(&self, start: usize, init: B, mut f: F) -> B
    where
        F: FnMut(B, usize, &T) -> ControlFlow<B, B>,
    {
        let mut acc = init;
        let mut idx = start;
        while idx < self.count {
            let block = &self.array_for(idx)[idx & MASK..];
            for elt in block {
                match f(acc, idx, elt) {
                    ControlFlow::Continue(next) => acc = next,
                    ControlFlow::Break(reduced) => return reduced,
                }
                idx += 1;
            }
        }
        acc
    }
}

impl<T: Clone> Vector<T> {
    /// Builds a vector from `items`.
    ///
    /// Up to 32 elements go straight into the tail. Anything beyond that is
    /// appended through a transient.
    pub fn create<I: IntoIterator<Item = T>>(config: Config<T>, items: I) -> Self {
        let mut items = items.into_iter();
        let head: Leaf<T> = items.by_ref().take(WIDTH).collect();
        let count = head.len();
        let start = Vector::from_parts(
            count,
            BITS,
            Arc::new(Node::empty(None)),
            Arc::new(head),
            config,
        );

        match items.next() {
            None => start,
            Some(next) => {
                let mut transient = start.begin_edit();
                transient.push_unchecked(next);
                for elt in items {
                    transient.push_unchecked(elt);
                }
                transient.commit()
            }
        }
    }

    /// Builds a vector from a slice, constructing the trie directly rather
    /// than one append at a time.
    pub fn from_slice(config: Config<T>, elts: &[T]) -> Self {
        let offset = tail_offset(elts.len());
        let (root, shift) = node::build(&elts[..offset]);
        let tail: Leaf<T> = elts[offset..].iter().cloned().collect();
        if offset > 0 {
            log::debug!("bulk-built a trie of {} elements", offset);
        }
        Vector::from_parts(elts.len(), shift, root, Arc::new(tail), config)
    }

    /// The elements of `other`, using `config`.
    pub fn from_vector(config: Config<T>, other: &Vector<T>) -> Self {
        Vector {
            meta: None,
            ..other.with_config(config)
        }
    }

    /// Returns a copy of this vector with the element at `idx` replaced.
    ///
    /// `idx` may be one past the end, in which case this appends.
    pub fn update(&self, idx: usize, val: T) -> Result<Self> {
        if idx < self.count {
            if idx >= self.tail_offset() {
                let mut tail = Arc::clone(&self.tail);
                Arc::make_mut(&mut tail)[idx & MASK] = val;
                Ok(self.with_parts(self.count, self.shift, Arc::clone(&self.root), tail))
            } else {
                let mut root = Arc::clone(&self.root);
                node::assoc(&mut root, None, self.shift, idx, val);
                Ok(self.with_parts(self.count, self.shift, root, Arc::clone(&self.tail)))
            }
        } else if idx == self.count {
            Ok(self.append(val))
        } else {
            Err(Error::out_of_range(idx, self.count))
        }
    }

    /// Like [`Vector::update`], but keyed associatively.
    pub fn assoc<K: Key + ?Sized>(&self, key: &K, val: T) -> Result<Self> {
        let idx = key::resolve(key, self.count)??;
        self.update(idx, val)
    }

    /// Returns a copy of this vector with `val` added to the end.
    pub fn append(&self, val: T) -> Self {
        if self.tail.len() < WIDTH {
            let mut tail = Arc::clone(&self.tail);
            Arc::make_mut(&mut tail).push_back(val);
            return self.with_parts(self.count + 1, self.shift, Arc::clone(&self.root), tail);
        }

        let leaf = Arc::new(Node::Leaf {
            edit: None,
            data: (*self.tail).clone(),
        });
        let mut root = Arc::clone(&self.root);
        let mut shift = self.shift;
        node::push_leaf(&mut root, &mut shift, None, self.count, leaf);
        self.with_parts(self.count + 1, shift, root, Arc::new(Chunk::unit(val)))
    }

    /// Returns a copy of this vector without its last element.
    pub fn pop(&self) -> Result<Self> {
        match self.count {
            0 => Err(Error::EmptyCollection),
            1 => Ok(Vector {
                meta: self.meta.clone(),
                ..Vector::empty(self.config.clone())
            }),
            _ if self.tail.len() > 1 => {
                let mut tail = Arc::clone(&self.tail);
                Arc::make_mut(&mut tail).pop_back();
                Ok(self.with_parts(self.count - 1, self.shift, Arc::clone(&self.root), tail))
            }
            _ => {
                let mut root = Arc::clone(&self.root);
                let mut shift = self.shift;
                let tail = node::pop_leaf(&mut root, &mut shift, None);
                Ok(self.with_parts(self.count - 1, shift, root, Arc::new(tail)))
            }
        }
    }

    /// Folds the elements in order, starting from the first one.
    ///
    /// Returns `None` if we're empty.
    pub fn reduce<F>(&self, mut f: F) -> Option<T>
    where
        F: FnMut(T, &T) -> ControlFlow<T, T>,
    {
        let first = self.get(0)?.clone();
        Some(self.fold_indexed_from(1, first, |acc, _, elt| f(acc, elt)))
    }

    /// Starts an editing session over this vector.
    ///
    /// The session gets its own copy of the root and the tail; the rest of
    /// the trie is copied lazily, the first time the session modifies it.
    pub fn begin_edit(&self) -> TransientVector<T> {
        TransientVector::new(self)
    }

    pub(crate) fn root(&self) -> &Arc<Node<T>> {
        &self.root
    }

    pub(crate) fn tail(&self) -> &Leaf<T> {
        &self.tail
    }

    /// Panics if any of the structural invariants is broken.
    pub fn check_invariants(&self) {
        let trie_len = self.tail_offset();
        assert_eq!(self.root.len(), trie_len);
        assert_eq!(self.tail.len(), self.count - trie_len);
        assert!(self.shift >= BITS && self.shift % BITS == 0);
        assert!(self.count == 0 || !self.tail.is_empty());

        if trie_len == 0 {
            assert!(self.root.children().is_empty());
            assert_eq!(self.shift, BITS);
        } else {
            assert!(self.root.is_packed(self.shift, true));
            if self.shift > BITS {
                assert!(self.root.children().len() > 1);
            }
        }
    }
}

impl<T> Default for Vector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for Vector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Vector::create(Config::default(), iter)
    }
}

impl<T: Clone> From<&[T]> for Vector<T> {
    fn from(elts: &[T]) -> Self {
        Vector::from_slice(Config::default(), elts)
    }
}

impl<T: Clone> From<Vec<T>> for Vector<T> {
    fn from(elts: Vec<T>) -> Self {
        Vector::from_slice(Config::default(), &elts)
    }
}

impl<'a, T> IntoIterator for &'a Vector<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self, 0, self.count)
    }
}

impl<T> Index<usize> for Vector<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index).expect("index out of range")
    }
}

impl<T: PartialEq> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for Vector<T> {}

impl<T: Hash> Hash for Vector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.count.hash(state);
        for elt in self {
            elt.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = self.config.options();
        f.write_str(&options.delimiters.left)?;
        for (i, elt) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{elt}")?;
        }
        f.write_str(&options.delimiters.right)
    }
}

impl<T: serde::Serialize> serde::Serialize for Vector<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for elt in self.iter() {
            seq.serialize_element(elt)?;
        }
        seq.end()
    }
}

impl<'de, T: Clone + serde::Deserialize<'de>> serde::Deserialize<'de> for Vector<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let vec: Vec<T> = Vec::deserialize(deserializer)?;
        Ok(vec.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects pointers to every node reachable from `root`.
    fn nodes<T>(root: &Arc<Node<T>>, out: &mut Vec<*const Node<T>>) {
        out.push(Arc::as_ptr(root));
        if let Node::Interior { children, .. } = root.as_ref() {
            for child in children.iter() {
                nodes(child, out);
            }
        }
    }

    #[test]
    fn basic() {
        let vec = Vector::<u32>::new();
        vec.check_invariants();
        let vec = vec.append(1);
        assert_eq!(vec.get(0), Some(&1));
        assert_eq!(vec.get(1), None);
        vec.check_invariants();

        let vec = vec.append(2).append(3);
        vec.check_invariants();
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        let popped = vec.pop().unwrap();
        popped.check_invariants();
        assert_eq!(popped.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        // The original is untouched.
        assert_eq!(vec.len(), 3);
        assert_eq!(vec[2], 3);
    }

    #[test]
    fn update_shares_untouched_nodes() {
        let vec: Vector<u32> = (0..2000).collect();
        let updated = vec.update(500, 0).unwrap();
        updated.check_invariants();

        let mut before = Vec::new();
        let mut after = Vec::new();
        nodes(vec.root(), &mut before);
        nodes(updated.root(), &mut after);

        // shift 10: the root, one level-5 node and one leaf get copied.
        assert_eq!(vec.shift(), 10);
        let fresh = after.iter().filter(|p| !before.contains(p)).count();
        assert_eq!(fresh, 3);
        assert_eq!(before.len(), after.len());
        assert!(Arc::ptr_eq(&vec.tail, &updated.tail));
    }

    #[test]
    fn append_shares_the_trie() {
        let vec: Vector<u32> = (0..100).collect();
        let appended = vec.append(100);
        assert!(Arc::ptr_eq(vec.root(), appended.root()));

        // Filling the tail pushes it into a copied spine.
        let full: Vector<u32> = (0..96).collect();
        let pushed = full.append(96);
        pushed.check_invariants();
        for (old, new) in full.root().children().iter().zip(pushed.root().children().iter()) {
            assert!(Arc::ptr_eq(old, new));
        }
        assert_eq!(pushed.root().children().len(), 3);
    }

    #[test]
    fn committed_roots_are_unstamped() {
        let mut transient = Vector::<u32>::new().begin_edit();
        for i in 0..100 {
            transient.append(i).unwrap();
        }
        let vec = transient.end_edit().unwrap();
        assert_eq!(vec.root().edit(), None);
        // Leaves keep the tag of the closed session, which no live session
        // can match.
        assert!(vec.root().children()[0].edit().is_some());

        let updated = vec.update(3, 7).unwrap();
        assert_eq!(updated.root().edit(), None);
        assert_eq!(updated.root().children()[0].edit(), None);
        assert_eq!(vec[3], 3);
        assert_eq!(updated[3], 7);

        let built: Vector<u32> = (0..100).collect();
        assert_eq!(built.root().edit(), None);
    }

    #[test]
    fn editing_a_committed_vector_leaves_it_alone() {
        let vec: Vector<u32> = (0..2000).collect();
        let mut transient = vec.begin_edit();
        transient.update(0, 100).unwrap().pop().unwrap();
        let edited = transient.end_edit().unwrap();
        assert_eq!(edited.root().edit(), None);

        let mut again = edited.begin_edit();
        again.update(1, 200).unwrap().update(0, 300).unwrap();
        let twice = again.end_edit().unwrap();
        twice.check_invariants();

        assert_eq!((vec[0], vec[1], vec.len()), (0, 1, 2000));
        assert_eq!((edited[0], edited[1], edited.len()), (100, 1, 1999));
        assert_eq!((twice[0], twice[1], twice.len()), (300, 200, 1999));
    }

    #[test]
    fn entries() {
        let vec: Vector<u32> = (0..40).collect();
        assert!(vec.contains_key(&39));
        assert!(!vec.contains_key(&40));
        assert!(!vec.contains_key(&-1i64));
        assert!(!vec.contains_key("0"));
        assert_eq!(vec.entry_at(&35u8), Some((35, &35)));
        assert_eq!(vec.entry_at(&1.0f64), None);
    }

    #[test]
    fn from_slice_matches_appends() {
        for len in [0, 1, 32, 33, 1056, 1057, 2000] {
            let elts: Vec<u32> = (0..len).collect();
            let bulk = Vector::from_slice(Config::default(), &elts);
            let appended = elts.iter().fold(Vector::new(), |v, x| v.append(*x));
            bulk.check_invariants();
            assert_eq!(bulk.shift(), appended.shift());
            assert_eq!(bulk, appended);
        }
    }
}
