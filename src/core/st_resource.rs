use std::{
    cell::{Ref, RefCell, RefMut},
    rc::{Rc, Weak},
};

/// A single-threaded, reference-counted resource with interior mutability.
///
/// `StResource` wraps a value in `Rc<RefCell<T>>` so several owners on the same thread can
/// share and mutate it. Owners that must not keep the value alive hold an [`StWeak`] instead,
/// obtained through [`StResource::downgrade`].
///
/// # Examples
///
/// ```
/// use voxel_streamer::core::StResource;
///
/// let counter = StResource::new(0);
/// let weak = counter.downgrade();
///
/// *counter.get_mut() += 1;
/// assert_eq!(weak.with_mut(|value| *value), Some(1));
///
/// drop(counter);
/// assert_eq!(weak.with_mut(|value| *value), None);
/// ```
///
/// # Panics
/// Borrowing mutably while another borrow is alive on the same thread panics, as with
/// `RefCell`.
pub struct StResource<T> {
    resource: Rc<RefCell<T>>,
}

impl<T> StResource<T> {
    /// Creates a new `StResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Rc::new(RefCell::new(resource)),
        }
    }

    /// Returns a shared borrow of the contained value.
    pub fn get(&self) -> Ref<'_, T> {
        self.resource.borrow()
    }

    /// Returns a mutable borrow of the contained value.
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.resource.borrow_mut()
    }

    /// Creates a non-owning link to the resource.
    pub fn downgrade(&self) -> StWeak<T> {
        StWeak {
            resource: Rc::downgrade(&self.resource),
        }
    }
}

impl<T> Clone for StResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

/// Non-owning counterpart of [`StResource`].
pub struct StWeak<T> {
    resource: Weak<RefCell<T>>,
}

impl<T> StWeak<T> {
    /// Runs `f` against the resource if it is still alive.
    ///
    /// # Returns
    /// `None` once every owning `StResource` has been dropped.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let resource = self.resource.upgrade()?;
        let mut guard = resource.borrow_mut();
        Some(f(&mut guard))
    }
}

impl<T> Clone for StWeak<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}

impl<T> std::fmt::Debug for StWeak<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StWeak")
            .field("alive", &(self.resource.strong_count() > 0))
            .finish()
    }
}
