//! Editing sessions over persistent vectors.
//!
//! A [`TransientVector`] is opened with [`Vector::begin_edit`]. It owns a
//! private copy of the root and the tail, and stamps every other node it
//! modifies with its own token the first time it touches it; after that, the
//! node is modified in place. Nodes it hasn't touched are still shared with
//! the vector it came from, and are never modified.
//!
//! [`TransientVector::end_edit`] publishes the result as a new [`Vector`]
//! and closes the session: every later call fails with
//! [`Error::SessionClosed`].
//!
//! Mutation goes through `&mut self`, so a session has a single writer at
//! any time. It may still be moved to another thread between calls.

use std::{fmt, mem, ops::ControlFlow, sync::Arc};

use imbl_sized_chunks::Chunk;

use crate::{
    config::Config,
    error::{Error, Result},
    key::{self, Key},
    node::{self, tail_offset, Edit, Leaf, Node, MASK, WIDTH},
    Vector,
};

pub struct TransientVector<T> {
    edit: Option<Edit>,
    count: usize,
    shift: u32,
    root: Arc<Node<T>>,
    tail: Leaf<T>,
    config: Config<T>,
}

impl<T: Clone> TransientVector<T> {
    pub(crate) fn new(vec: &Vector<T>) -> Self {
        let edit = Edit::fresh();
        log::debug!("opened edit session {edit:?} over {} elements", vec.len());
        TransientVector {
            edit: Some(edit),
            count: vec.len(),
            shift: vec.shift(),
            root: Arc::new(vec.root().stamped(Some(edit))),
            tail: vec.tail().clone(),
            config: vec.config().clone(),
        }
    }

    fn edit(&self) -> Result<Edit> {
        self.edit.ok_or(Error::SessionClosed)
    }

    /// Is this session still open?
    pub fn is_editable(&self) -> bool {
        self.edit.is_some()
    }

    pub fn len(&self) -> Result<usize> {
        self.edit()?;
        Ok(self.count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn shift(&self) -> Result<u32> {
        self.edit()?;
        Ok(self.shift)
    }

    fn array_for(&self, idx: usize) -> &[T] {
        debug_assert!(idx < self.count);
        if idx >= tail_offset(self.count) {
            &self.tail
        } else {
            node::leaf_for(&self.root, self.shift, idx)
        }
    }

    pub fn get(&self, idx: usize) -> Result<Option<&T>> {
        self.edit()?;
        Ok((idx < self.count).then(|| &self.array_for(idx)[idx & MASK]))
    }

    pub fn nth(&self, idx: usize) -> Result<&T> {
        self.get(idx)?
            .ok_or_else(|| Error::out_of_range(idx, self.count))
    }

    /// Associative lookup; misses on anything that isn't an in-range integer.
    pub fn val_at<K: Key + ?Sized>(&self, key: &K) -> Result<Option<&T>> {
        self.edit()?;
        match key::resolve(key, self.count) {
            Ok(Ok(idx)) => self.get(idx),
            _ => Ok(None),
        }
    }

    pub fn contains_key<K: Key + ?Sized>(&self, key: &K) -> Result<bool> {
        Ok(self.val_at(key)?.is_some())
    }

    /// The index and element `key` denotes, if it denotes one.
    pub fn entry_at<K: Key + ?Sized>(&self, key: &K) -> Result<Option<(usize, &T)>> {
        self.edit()?;
        match key::resolve(key, self.count) {
            Ok(Ok(idx)) if idx < self.count => Ok(Some((idx, &self.array_for(idx)[idx & MASK]))),
            _ => Ok(None),
        }
    }

    /// Looks up an element the way calling the session as a function does:
    /// the key must be an integer, and it must be in range.
    pub fn lookup<K: Key + ?Sized>(&self, key: &K) -> Result<&T> {
        self.edit()?;
        let idx = key::resolve(key, self.count)??;
        self.nth(idx)
    }

    /// Replaces the element at `idx`, or appends if `idx` is one past the end.
    pub fn update(&mut self, idx: usize, val: T) -> Result<&mut Self> {
        let edit = self.edit()?;
        if idx < self.count {
            if idx >= tail_offset(self.count) {
                self.tail[idx & MASK] = val;
            } else {
                node::assoc(&mut self.root, Some(edit), self.shift, idx, val);
            }
            Ok(self)
        } else if idx == self.count {
            self.push(edit, val);
            Ok(self)
        } else {
            Err(Error::out_of_range(idx, self.count))
        }
    }

    /// Like [`TransientVector::update`], but keyed associatively.
    pub fn assoc<K: Key + ?Sized>(&mut self, key: &K, val: T) -> Result<&mut Self> {
        self.edit()?;
        let idx = key::resolve(key, self.count)??;
        self.update(idx, val)
    }

    pub fn append(&mut self, val: T) -> Result<&mut Self> {
        let edit = self.edit()?;
        self.push(edit, val);
        Ok(self)
    }

    pub fn extend_from<I: IntoIterator<Item = T>>(&mut self, iter: I) -> Result<&mut Self> {
        let edit = self.edit()?;
        for elt in iter {
            self.push(edit, elt);
        }
        Ok(self)
    }

    fn push(&mut self, edit: Edit, val: T) {
        if self.tail.len() < WIDTH {
            self.tail.push_back(val);
        } else {
            let full = mem::replace(&mut self.tail, Chunk::unit(val));
            let leaf = Arc::new(Node::Leaf {
                edit: Some(edit),
                data: full,
            });
            node::push_leaf(&mut self.root, &mut self.shift, Some(edit), self.count, leaf);
        }
        self.count += 1;
    }

    /// Appends to a session that can't have been closed yet.
    pub(crate) fn push_unchecked(&mut self, val: T) {
        debug_assert!(self.is_editable());
        if let Some(edit) = self.edit {
            self.push(edit, val);
        }
    }

    pub fn pop(&mut self) -> Result<&mut Self> {
        let edit = self.edit()?;
        if self.count == 0 {
            return Err(Error::EmptyCollection);
        }

        if self.tail.len() > 1 || self.count == 1 {
            self.tail.pop_back();
        } else {
            self.tail = node::pop_leaf(&mut self.root, &mut self.shift, Some(edit));
        }
        self.count -= 1;
        Ok(self)
    }

    /// Folds the elements in order, stopping early as soon as `f` breaks.
    pub fn fold<B, F>(&self, init: B, mut f: F) -> Result<B>
    where
        F: FnMut(B, &T) -> ControlFlow<B, B>,
    {
        self.edit()?;
        let mut acc = init;
        let mut idx = 0;
        while idx < self.count {
            for elt in self.array_for(idx) {
                match f(acc, elt) {
                    ControlFlow::Continue(next) => acc = next,
                    ControlFlow::Break(reduced) => return Ok(reduced),
                }
                idx += 1;
            }
        }
        Ok(acc)
    }

    /// Ends the session, publishing its contents as a persistent vector.
    pub fn end_edit(&mut self) -> Result<Vector<T>> {
        let edit = self.edit.take().ok_or(Error::SessionClosed)?;
        log::debug!("committed edit session {edit:?} with {} elements", self.count);
        let mut root = mem::replace(&mut self.root, Arc::new(Node::empty(None)));
        node::release(&mut root);
        let tail = mem::take(&mut self.tail);
        let count = mem::take(&mut self.count);
        Ok(Vector::from_parts(
            count,
            self.shift,
            root,
            Arc::new(tail),
            self.config.clone(),
        ))
    }

    /// Ends a session that can't have been closed yet.
    pub(crate) fn commit(mut self) -> Vector<T> {
        debug_assert!(self.is_editable());
        node::release(&mut self.root);
        Vector::from_parts(
            self.count,
            self.shift,
            self.root,
            Arc::new(self.tail),
            self.config,
        )
    }
}

impl<T: fmt::Debug> fmt::Debug for TransientVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransientVector")
            .field("edit", &self.edit)
            .field("count", &self.count)
            .field("shift", &self.shift)
            .finish_non_exhaustive()
    }
}
