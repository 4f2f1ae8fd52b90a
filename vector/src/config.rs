//! Configuration for calling and displaying vectors.
//!
//! A vector carries a [`Config`] handle that it never interprets: the
//! handler is called with the vector and the call arguments by
//! [`Vector::invoke`], and the delimiters are spliced around the elements
//! when the vector is displayed. The handle is shared by every vector derived
//! from the one it was given to, and swapping its contents is visible to all
//! of them.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::Vector;

/// What a vector does when it is called like a function.
pub type Handler<T> = Arc<dyn Fn(&Vector<T>, &[T]) -> T + Send + Sync>;

/// The strings printed before and after a vector's elements.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            left: "[".to_owned(),
            right: "]".to_owned(),
        }
    }
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Delimiters {
            left: left.into(),
            right: right.into(),
        }
    }
}

pub struct Options<T> {
    pub handler: Option<Handler<T>>,
    pub delimiters: Delimiters,
}

impl<T> Options<T> {
    pub fn new<F>(handler: F, delimiters: Delimiters) -> Self
    where
        F: Fn(&Vector<T>, &[T]) -> T + Send + Sync + 'static,
    {
        Options {
            handler: Some(Arc::new(handler)),
            delimiters,
        }
    }
}

impl<T> Default for Options<T> {
    fn default() -> Self {
        Options {
            handler: None,
            delimiters: Delimiters::default(),
        }
    }
}

// Can't be derived: that would require `T: Clone`.
impl<T> Clone for Options<T> {
    fn clone(&self) -> Self {
        Options {
            handler: self.handler.clone(),
            delimiters: self.delimiters.clone(),
        }
    }
}

impl<T> fmt::Debug for Options<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .field("delimiters", &self.delimiters)
            .finish()
    }
}

/// A shared, swappable reference to some [`Options`].
///
/// Cloning the handle is cheap and the clone refers to the same options.
/// Reads take a snapshot without locking.
pub struct Config<T> {
    options: Arc<ArcSwap<Options<T>>>,
}

impl<T> Config<T> {
    pub fn new(options: Options<T>) -> Self {
        Config {
            options: Arc::new(ArcSwap::from_pointee(options)),
        }
    }

    /// A snapshot of the current options.
    pub fn options(&self) -> Arc<Options<T>> {
        self.options.load_full()
    }

    /// Replaces the options for every vector sharing this handle.
    pub fn store(&self, options: Options<T>) {
        self.options.store(Arc::new(options));
    }

    /// Atomically replaces the options with a function of the current ones.
    ///
    /// `f` may run more than once if another thread updates the options
    /// concurrently.
    pub fn update(&self, f: impl Fn(&Options<T>) -> Options<T>) {
        self.options.rcu(|current| f(current));
    }

    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&Vector<T>, &[T]) -> T + Send + Sync + 'static,
    {
        let handler: Handler<T> = Arc::new(handler);
        self.update(|current| Options {
            handler: Some(Arc::clone(&handler)),
            delimiters: current.delimiters.clone(),
        });
    }

    pub fn set_delimiters(&self, delimiters: Delimiters) {
        self.update(|current| Options {
            handler: current.handler.clone(),
            delimiters: delimiters.clone(),
        });
    }

    /// Do both handles refer to the same options?
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.options, &other.options)
    }
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            options: Arc::clone(&self.options),
        }
    }
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Config::new(Options::default())
    }
}

impl<T> From<Options<T>> for Config<T> {
    fn from(options: Options<T>) -> Self {
        Config::new(options)
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Config").field(&*self.options()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiters_from_json() {
        let delims: Delimiters = serde_json::from_str(r#"{"left": "<<"}"#).unwrap();
        assert_eq!(delims, Delimiters::new("<<", "]"));

        let delims: Delimiters = serde_json::from_str("{}").unwrap();
        assert_eq!(delims, Delimiters::default());
    }

    #[test]
    fn shared_updates() {
        let config: Config<i32> = Config::default();
        let other = config.clone();
        assert!(config.ptr_eq(&other));
        assert!(config.options().handler.is_none());

        other.set_delimiters(Delimiters::new("#{", "}"));
        assert_eq!(config.options().delimiters.left, "#{");

        config.set_handler(|v, args| v.len() as i32 + args.len() as i32);
        assert!(other.options().handler.is_some());
        assert_eq!(other.options().delimiters.right, "}");

        assert!(!config.ptr_eq(&Config::default()));
    }
}
