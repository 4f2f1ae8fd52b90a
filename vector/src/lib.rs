//! Persistent vectors with structural sharing.
//!
//! [`Vector`] is a persistent vector (also known as a "bitmapped vector
//! trie"): a 32-way trie holding all but the last few elements, plus a tail
//! buffer of up to 32 elements that makes appending cheap. Every update
//! returns a new vector that shares everything it didn't touch with the old
//! one, so old versions stay valid and cloning is `O(1)`.
//!
//! For batches of updates, [`Vector::begin_edit`] opens a
//! [`TransientVector`]: an editing session that modifies its own copies of
//! the nodes in place and is turned back into a [`Vector`] with
//! [`TransientVector::end_edit`].
//!
//! [`ChunkedSeq`] traverses a vector one 32-element block at a time, and
//! folds over vectors and sequences stop early when the folding function
//! returns [`ControlFlow::Break`](std::ops::ControlFlow::Break).
//!
//! Each vector also carries a [`Config`]: a handler that
//! [`Vector::invoke`] forwards calls to, and the delimiters used when
//! displaying it.

pub mod config;
pub mod error;
pub mod key;
mod node;
pub mod seq;
pub mod transient;
pub mod vector;

pub use config::{Config, Delimiters, Handler, Options};
pub use error::{Error, Result};
pub use key::Key;
pub use seq::{ChunkedSeq, Iter};
pub use transient::TransientVector;
pub use vector::{Metadata, Vector};
