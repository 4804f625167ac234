//! Reference-counted handles over engine objects.
//!
//! A [`Handle`] owns one reference to a shared object, or nothing at all
//! (the null handle, e.g. a `VImage::default()` waiting to receive an
//! operation output). Cloning adds a reference, dropping releases one, and
//! the object itself goes away when the last handle does.
//!
//! The handle is deliberately a plain pointer-sized holder with no dynamic
//! dispatch: images, interpolators, sources and targets are all newtypes
//! over `Handle<T>` and get passed around by value everywhere.

use std::fmt;
use std::sync::Arc;

/// Whether a handle constructor takes over the caller's reference or adds
/// one of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Steal {
    /// Take ownership of the reference passed in.
    #[default]
    Steal,
    /// Leave the caller's reference alone and add a new one.
    NoSteal,
}

/// A nullable, reference-counted handle.
pub struct Handle<T> {
    object: Option<Arc<T>>,
}

impl<T> Handle<T> {
    /// The null handle.
    pub const fn null() -> Self {
        Self { object: None }
    }

    /// Wrap a fresh object. The handle holds the only reference.
    pub fn from_object(object: T) -> Self {
        Self {
            object: Some(Arc::new(object)),
        }
    }

    /// Take ownership of an existing reference.
    pub fn new(object: Arc<T>) -> Self {
        Self {
            object: Some(object),
        }
    }

    /// Add a reference to an object the caller keeps holding.
    pub fn from_shared(object: &Arc<T>) -> Self {
        Self {
            object: Some(Arc::clone(object)),
        }
    }

    /// Construct with an explicit ownership choice.
    ///
    /// With [`Steal::NoSteal`] the caller's `Arc` is left untouched and the
    /// handle gets a reference of its own; both stay valid.
    pub fn with_steal(object: &mut Option<Arc<T>>, steal: Steal) -> Self {
        match steal {
            Steal::Steal => Self {
                object: object.take(),
            },
            Steal::NoSteal => Self {
                object: object.clone(),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        self.object.is_none()
    }

    /// Borrow the underlying shared object, `None` for the null handle.
    pub fn get_object(&self) -> Option<&Arc<T>> {
        self.object.as_ref()
    }

    /// Number of live references to the underlying object, 0 for null.
    pub fn ref_count(&self) -> usize {
        self.object.as_ref().map_or(0, Arc::strong_count)
    }

    /// True when both handles refer to the same object (two nulls compare equal).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.object, &other.object) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Give up this handle's reference, leaving it null.
    pub fn release(&mut self) -> Option<Arc<T>> {
        self.object.take()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
        }
    }

    // The source is referenced before the old target reference is dropped,
    // so `a.clone_from(&a)` never frees the object.
    fn clone_from(&mut self, source: &Self) {
        let incoming = source.object.clone();
        self.object = incoming;
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.object {
            Some(object) => write!(
                f,
                "Handle({:p}, refs={})",
                Arc::as_ptr(object),
                Arc::strong_count(object)
            ),
            None => f.write_str("Handle(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_has_no_references() {
        let handle: Handle<u32> = Handle::default();
        assert!(handle.is_null());
        assert_eq!(handle.ref_count(), 0);
        assert!(handle.get_object().is_none());
    }

    #[test]
    fn clone_then_drop_leaves_original_valid() {
        let original = Handle::from_object(42u32);
        assert_eq!(original.ref_count(), 1);

        let copy = original.clone();
        assert_eq!(original.ref_count(), 2);
        assert!(copy.ptr_eq(&original));
        drop(copy);

        assert!(!original.is_null());
        assert_eq!(original.ref_count(), 1);
        assert_eq!(**original.get_object().unwrap(), 42);
    }

    #[test]
    fn self_assignment_is_a_no_op() {
        let mut handle = Handle::from_object(String::from("x"));
        let alias = handle.clone();
        handle.clone_from(&alias);
        assert_eq!(handle.ref_count(), 2);
        drop(alias);
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(handle.get_object().unwrap().as_str(), "x");
    }

    #[test]
    fn assignment_releases_previous_object() {
        let first = Arc::new(1u8);
        let mut handle = Handle::from_shared(&first);
        assert_eq!(Arc::strong_count(&first), 2);

        let other = Handle::from_object(2u8);
        handle.clone_from(&other);
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(other.ref_count(), 2);
    }

    #[test]
    fn steal_and_no_steal() {
        let mut slot = Some(Arc::new(7i32));
        let kept = Handle::with_steal(&mut slot, Steal::NoSteal);
        assert!(slot.is_some());
        assert_eq!(kept.ref_count(), 2);

        let taken = Handle::with_steal(&mut slot, Steal::Steal);
        assert!(slot.is_none());
        assert_eq!(taken.ref_count(), 2);
        drop(kept);
        assert_eq!(taken.ref_count(), 1);
    }

    #[test]
    fn release_nulls_the_handle() {
        let mut handle = Handle::from_object(3u16);
        let object = handle.release().unwrap();
        assert!(handle.is_null());
        assert_eq!(Arc::strong_count(&object), 1);
    }
}
