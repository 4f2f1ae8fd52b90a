//! Trie nodes and the path-copying algorithms over them.
//!
//! The trie stores the first `tail_offset(count)` elements of a vector in
//! 32-element leaves. Interior nodes at height `level` (measured in bits,
//! so the parents of leaves sit at level [`BITS`]) select a child with the
//! five bits of the index starting at `level`. Nodes are densely packed:
//! every node except those on the rightmost spine is full, and unused slots
//! are simply past the end of the chunk.
//!
//! All the algorithms here take the node to modify as a `&mut Arc<Node<T>>`
//! together with the edit token of the caller. A node is only ever modified
//! in place if it carries the caller's token and nobody else holds a
//! reference to it; otherwise it is replaced by a copy first (see
//! [`editable`]). Persistent vectors pass `None` as their token, which makes
//! every operation copy exactly the nodes on the path it touches and share
//! everything else with the original.

use std::{
    num::NonZeroU64,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use imbl_sized_chunks::Chunk;

pub(crate) const BITS: u32 = 5;
pub(crate) const WIDTH: usize = 1 << BITS;
pub(crate) const MASK: usize = WIDTH - 1;

pub(crate) type Leaf<T> = Chunk<T, WIDTH>;
pub(crate) type Interior<T> = Chunk<Arc<Node<T>>, WIDTH>;

/// Identifies one transient editing session.
///
/// Tokens are never reused, so a node stamped by a session that has ended
/// can't be claimed by any other session: for every practical purpose it is
/// as immutable as an unstamped node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Edit(NonZeroU64);

impl Edit {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let id = NEXT.fetch_add(1, Ordering::Relaxed);
        Edit(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Node<T> {
    Leaf { edit: Option<Edit>, data: Leaf<T> },
    Interior { edit: Option<Edit>, children: Interior<T> },
}

/// `idx` is the global index into the root node, and we are some interior
/// node at height `level`. Which of our children does the index belong to?
fn extract_index(idx: usize, level: u32) -> usize {
    (idx >> level) & MASK
}

/// The index of the first element that lives in the tail rather than in the
/// trie.
pub(crate) fn tail_offset(count: usize) -> usize {
    if count < WIDTH {
        0
    } else {
        ((count - 1) >> BITS) << BITS
    }
}

impl<T> Node<T> {
    pub(crate) fn empty(edit: Option<Edit>) -> Self {
        Node::Interior {
            edit,
            children: Chunk::new(),
        }
    }

    pub(crate) fn edit(&self) -> Option<Edit> {
        match self {
            Node::Leaf { edit, .. } | Node::Interior { edit, .. } => *edit,
        }
    }

    fn set_edit(&mut self, new_edit: Option<Edit>) {
        match self {
            Node::Leaf { edit, .. } | Node::Interior { edit, .. } => *edit = new_edit,
        }
    }

    pub(crate) fn children(&self) -> &Interior<T> {
        let Node::Interior { children, .. } = self else {
            unreachable!("found a leaf where an interior node was expected");
        };
        children
    }

    fn children_mut(&mut self) -> &mut Interior<T> {
        let Node::Interior { children, .. } = self else {
            unreachable!("found a leaf where an interior node was expected");
        };
        children
    }

    /// Number of elements in this subtree. Only used for sanity checks.
    pub(crate) fn len(&self) -> usize {
        match self {
            Node::Leaf { data, .. } => data.len(),
            Node::Interior { children, .. } => children.iter().map(|c| c.len()).sum(),
        }
    }

    /// Checks that this subtree, rooted at `level`, is densely packed: all
    /// leaves are full and all interior nodes except the rightmost ones are
    /// full and non-empty.
    pub(crate) fn is_packed(&self, level: u32, right_most: bool) -> bool {
        match self {
            Node::Leaf { data, .. } => level == 0 && data.is_full(),
            Node::Interior { children, .. } => {
                if level == 0 || !(children.is_full() || right_most) {
                    return false;
                }
                match children.split_last() {
                    Some((last, others)) => {
                        others.iter().all(|n| n.is_packed(level - BITS, false))
                            && last.is_packed(level - BITS, right_most)
                    }
                    None => false,
                }
            }
        }
    }
}

impl<T: Clone> Node<T> {
    /// A shallow copy of this node owned by `edit`. Children are shared.
    pub(crate) fn stamped(&self, edit: Option<Edit>) -> Self {
        let mut ret = self.clone();
        ret.set_edit(edit);
        ret
    }
}

/// Clears the tag of a root that is about to be published. Nodes below it
/// keep the tag of the session that created them.
pub(crate) fn release<T: Clone>(root: &mut Arc<Node<T>>) {
    if root.edit().is_some() {
        Arc::make_mut(root).set_edit(None);
    }
}

/// Gives mutable access to `node` on behalf of `edit`, replacing it with a
/// copy first unless it already belongs to `edit` and isn't shared.
pub(crate) fn editable<T: Clone>(node: &mut Arc<Node<T>>, edit: Option<Edit>) -> &mut Node<T> {
    if node.edit() != edit {
        *node = Arc::new(node.stamped(edit));
    }
    Arc::make_mut(node)
}

/// Finds the leaf holding index `idx` in the trie rooted at `root`.
pub(crate) fn leaf_for<T>(root: &Node<T>, shift: u32, idx: usize) -> &[T] {
    let mut node = root;
    let mut level = shift;
    loop {
        match node {
            Node::Interior { children, .. } => {
                node = &children[extract_index(idx, level)];
                level = level.saturating_sub(BITS);
            }
            Node::Leaf { data, .. } => {
                debug_assert_eq!(level, 0);
                return data;
            }
        }
    }
}

/// Builds a chain of single-child interior nodes from `level` down to
/// `node`.
fn new_path<T>(edit: Option<Edit>, level: u32, node: Arc<Node<T>>) -> Arc<Node<T>> {
    if level == 0 {
        node
    } else {
        Arc::new(Node::Interior {
            edit,
            children: Chunk::unit(new_path(edit, level - BITS, node)),
        })
    }
}

/// Attaches the full leaf `tail` below `node` (at height `level`), in the
/// position of the vector's last `count` elements.
fn push_tail<T: Clone>(
    node: &mut Arc<Node<T>>,
    edit: Option<Edit>,
    level: u32,
    count: usize,
    tail: Arc<Node<T>>,
) {
    let sub = extract_index(count - 1, level);
    let children = editable(node, edit).children_mut();

    if level == BITS {
        debug_assert_eq!(sub, children.len());
        children.push_back(tail);
    } else if sub < children.len() {
        push_tail(&mut children[sub], edit, level - BITS, count, tail);
    } else {
        children.push_back(new_path(edit, level - BITS, tail));
    }
}

/// Moves the full tail of a vector with `count` elements into the trie,
/// growing the trie by one level if the root is out of room.
pub(crate) fn push_leaf<T: Clone>(
    root: &mut Arc<Node<T>>,
    shift: &mut u32,
    edit: Option<Edit>,
    count: usize,
    leaf: Arc<Node<T>>,
) {
    if (count >> BITS) > (1 << *shift) {
        let mut children = Chunk::unit(Arc::clone(root));
        children.push_back(new_path(edit, *shift, leaf));
        *root = Arc::new(Node::Interior { edit, children });
        *shift += BITS;
        log::trace!("trie grew to shift {} at {} elements", *shift, count + 1);
    } else {
        push_tail(root, edit, *shift, count, leaf);
    }
}

/// Replaces the element at `idx` in the trie below `node`.
pub(crate) fn assoc<T: Clone>(
    node: &mut Arc<Node<T>>,
    edit: Option<Edit>,
    level: u32,
    idx: usize,
    val: T,
) {
    match editable(node, edit) {
        Node::Leaf { data, .. } => data[idx & MASK] = val,
        Node::Interior { children, .. } => {
            assoc(
                &mut children[extract_index(idx, level)],
                edit,
                level - BITS,
                idx,
                val,
            );
        }
    }
}

/// Detaches the rightmost leaf below `node` and returns its elements, along
/// with whether `node` has become empty (in which case the caller drops it).
fn pop_tail<T: Clone>(node: &mut Arc<Node<T>>, edit: Option<Edit>, level: u32) -> (Leaf<T>, bool) {
    let children = editable(node, edit).children_mut();

    let leaf = if level > BITS {
        let last = children.last_mut().expect("empty interior node");
        let (leaf, child_empty) = pop_tail(last, edit, level - BITS);
        if child_empty {
            children.pop_back();
        }
        leaf
    } else {
        match Arc::unwrap_or_clone(children.pop_back()) {
            Node::Leaf { data, .. } => data,
            Node::Interior { .. } => unreachable!("found an interior node below level {BITS}"),
        }
    };

    (leaf, children.is_empty())
}

/// Takes the rightmost leaf out of a non-empty trie so that it can become
/// the new tail, dropping a root level if the root is left with a single
/// child.
pub(crate) fn pop_leaf<T: Clone>(
    root: &mut Arc<Node<T>>,
    shift: &mut u32,
    edit: Option<Edit>,
) -> Leaf<T> {
    let (leaf, _empty) = pop_tail(root, edit, *shift);

    if *shift > BITS && root.children().len() == 1 {
        let child = Arc::clone(&root.children()[0]);
        *root = child;
        *shift -= BITS;
        log::trace!("trie shrank to shift {}", *shift);
    }

    leaf
}

/// Builds a trie bottom-up from a slice whose length is a multiple of the
/// leaf width, returning the root and its shift.
///
/// The result has exactly the shape that appending the elements one at a
/// time would produce.
pub(crate) fn build<T: Clone>(elts: &[T]) -> (Arc<Node<T>>, u32) {
    debug_assert_eq!(elts.len() % WIDTH, 0);

    let mut nodes: Vec<Arc<Node<T>>> = elts
        .chunks(WIDTH)
        .map(|chunk| {
            Arc::new(Node::Leaf {
                edit: None,
                data: chunk.iter().cloned().collect(),
            })
        })
        .collect();
    let mut shift = BITS;

    loop {
        let mut parents: Vec<Arc<Node<T>>> = nodes
            .chunks(WIDTH)
            .map(|chunk| {
                Arc::new(Node::Interior {
                    edit: None,
                    children: chunk.iter().cloned().collect(),
                })
            })
            .collect();

        match parents.len() {
            0 => return (Arc::new(Node::empty(None)), shift),
            1 => return (parents.swap_remove(0), shift),
            _ => {
                nodes = parents;
                shift += BITS;
            }
        }
    }
}
