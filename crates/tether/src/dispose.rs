#![forbid(unsafe_code)]

//! Disposable resources and the [`DisposableGroup`] aggregator.
//!
//! A [`Dispose`] implementor is any resource with a zero-argument release
//! operation. [`DisposableGroup`] collects such resources so an owner can
//! release all of them in one call, which is the backbone of manual lifecycle
//! management here: subscriptions, timers, and adapter hooks are filed into a
//! group and torn down together when the owner shuts down.
//!
//! `DisposableGroup` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership; cloning a group yields another handle to the same member set.
//!
//! # Invariants
//!
//! 1. `disposed` is monotonic: once true it never reverts.
//! 2. The member set is empty whenever `disposed` is true.
//! 3. A group never holds a handle to itself (rejected at `add`).
//! 4. Adding to an already-disposed group releases the resource immediately,
//!    synchronously, before `add` returns — an owner that disposes its
//!    aggregator first must not leak resources registered afterward by
//!    surviving code paths.
//!
//! # Failure Modes
//!
//! - **Member release panics**: remaining members are not released for that
//!   `dispose()` call (the unwind propagates). The flag is already set, so
//!   the group stays disposed.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

// ─── Dispose ─────────────────────────────────────────────────────────────────

/// A resource with a zero-argument release operation.
///
/// The trait contract does not guarantee idempotence; callers must not call
/// `dispose` twice unless the specific implementor documents it. The types
/// in this crate ([`DisposableGroup`], [`Connection`](crate::Connection),
/// [`DisposeFn`]) are all idempotent.
///
/// Release is explicit by design: no type in this crate runs its release
/// from `Drop`. Dropping a handle without disposing it leaves the underlying
/// registration in place.
pub trait Dispose {
    /// Release the resource.
    fn dispose(&mut self);
}

/// A [`Dispose`] implementor backed by a closure, run at most once.
///
/// Built with [`dispose_fn`]; the closure form is how ad-hoc cleanup actions
/// (detach a callback, close a handle) enter a [`DisposableGroup`].
pub struct DisposeFn(Option<Box<dyn FnOnce()>>);

impl Dispose for DisposeFn {
    fn dispose(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl std::fmt::Debug for DisposeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DisposeFn")
            .field(&if self.0.is_some() { "armed" } else { "spent" })
            .finish()
    }
}

/// Wrap a closure as an idempotent disposable.
pub fn dispose_fn(release: impl FnOnce() + 'static) -> DisposeFn {
    DisposeFn(Some(Box::new(release)))
}

// ─── DisposeError ────────────────────────────────────────────────────────────

/// Error raised synchronously by [`DisposableGroup::add`].
///
/// The original duck-typed contract also rejected values without a callable
/// release operation; that shape error is unrepresentable here because the
/// [`Dispose`] bound is the structural check. What remains is the identity
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisposeError {
    /// A handle to the group itself was added to the group. Storing it would
    /// make disposal recurse forever.
    SelfAdd,
}

impl std::fmt::Display for DisposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfAdd => write!(f, "cannot add a disposable group to itself"),
        }
    }
}

impl std::error::Error for DisposeError {}

// ─── DisposableGroup ─────────────────────────────────────────────────────────

/// Shared interior for [`DisposableGroup`].
struct GroupInner {
    /// Owned members, released on `dispose`. Each box is a distinct identity.
    members: Vec<Box<dyn Dispose>>,
    /// Monotonic disposal flag, set before members are released.
    disposed: bool,
}

/// An aggregator that releases all member disposables together.
///
/// Cloning a `DisposableGroup` creates a new handle to the **same** member
/// set. The group owns the lifecycle trigger for its members (it calls
/// [`Dispose::dispose`] on each) but not the resources' underlying state.
///
/// A group is itself a [`Dispose`] implementor, so groups nest: filing a
/// child group into a parent releases the child's members when the parent
/// is disposed.
pub struct DisposableGroup {
    inner: Rc<RefCell<GroupInner>>,
}

impl Clone for DisposableGroup {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl PartialEq for DisposableGroup {
    /// Handle identity: two handles are equal iff they share the same group.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DisposableGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DisposableGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DisposableGroup")
            .field("members", &inner.members.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl DisposableGroup {
    /// Create an empty, live group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(GroupInner {
                members: Vec::new(),
                disposed: false,
            })),
        }
    }

    /// Add a resource to the group, returning `&self` for chaining
    /// (`group.add(a)?.add(b)?`).
    ///
    /// Returns [`DisposeError::SelfAdd`] if `disposable` is a handle to this
    /// same group; the group is left unmodified. If the group is already
    /// disposed, the resource is released immediately and not stored.
    pub fn add<D>(&self, disposable: D) -> Result<&Self, DisposeError>
    where
        D: Dispose + 'static,
    {
        if let Some(group) = (&disposable as &dyn Any).downcast_ref::<DisposableGroup>()
            && Rc::ptr_eq(&self.inner, &group.inner)
        {
            return Err(DisposeError::SelfAdd);
        }
        self.insert(Box::new(disposable));
        Ok(self)
    }

    /// Store a member, or release it immediately if the group is disposed.
    ///
    /// The interior borrow is not held across the release call, so the
    /// resource may reenter this group from its own `dispose`.
    pub(crate) fn insert(&self, mut disposable: Box<dyn Dispose>) {
        if self.inner.borrow().disposed {
            trace!("add on a disposed group; releasing the resource immediately");
            disposable.dispose();
            return;
        }
        self.inner.borrow_mut().members.push(disposable);
    }

    /// Release every member and mark the group disposed. Idempotent.
    ///
    /// The flag is set before any member is released, so a reentrant `add`
    /// from inside a member's release takes the release-immediately path
    /// instead of growing the set. Members are released in insertion order.
    pub fn dispose(&self) {
        let members = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            std::mem::take(&mut inner.members)
        };
        trace!(members = members.len(), "disposing group");
        for mut member in members {
            member.dispose();
        }
    }

    /// Whether the member set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().members.is_empty()
    }

    /// Number of members currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().members.len()
    }

    /// Whether the group has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }
}

impl Dispose for DisposableGroup {
    fn dispose(&mut self) {
        DisposableGroup::dispose(self);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Counting disposable for release-exactly-once assertions.
    fn counted(count: &Rc<Cell<u32>>) -> DisposeFn {
        let count = Rc::clone(count);
        dispose_fn(move || count.set(count.get() + 1))
    }

    #[test]
    fn add_stores_member() {
        let group = DisposableGroup::new();
        group.add(dispose_fn(|| {})).unwrap();
        assert!(!group.is_empty());
        assert_eq!(group.len(), 1);
        assert!(!group.is_disposed());
    }

    #[test]
    fn dispose_releases_each_member_exactly_once() {
        let count = Rc::new(Cell::new(0u32));
        let group = DisposableGroup::new();
        group.add(counted(&count)).unwrap();
        group.add(counted(&count)).unwrap();

        group.dispose();
        assert_eq!(count.get(), 2);
        assert!(group.is_empty());
        assert!(group.is_disposed());

        // Idempotent: a second dispose releases nothing.
        group.dispose();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn add_after_dispose_releases_immediately() {
        let count = Rc::new(Cell::new(0u32));
        let group = DisposableGroup::new();
        group.dispose();

        group.add(counted(&count)).unwrap();
        assert_eq!(count.get(), 1);
        assert!(group.is_empty());
        assert!(group.is_disposed());
    }

    #[test]
    fn add_self_is_rejected() {
        let group = DisposableGroup::new();
        assert_eq!(group.add(group.clone()), Err(DisposeError::SelfAdd));
        assert!(group.is_empty());

        // The group is still usable after the rejected add.
        group.add(dispose_fn(|| {})).unwrap();
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn nested_group_is_released_by_parent() {
        let count = Rc::new(Cell::new(0u32));
        let parent = DisposableGroup::new();
        let child = DisposableGroup::new();
        child.add(counted(&count)).unwrap();
        parent.add(child.clone()).unwrap();

        parent.dispose();
        assert_eq!(count.get(), 1);
        assert!(child.is_disposed());
    }

    #[test]
    fn add_chains() {
        let count = Rc::new(Cell::new(0u32));
        let group = DisposableGroup::new();
        group
            .add(counted(&count))
            .unwrap()
            .add(counted(&count))
            .unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn reentrant_add_during_dispose_is_released_not_stored() {
        let count = Rc::new(Cell::new(0u32));
        let group = DisposableGroup::new();

        let reentrant = {
            let group = group.clone();
            let count = Rc::clone(&count);
            dispose_fn(move || {
                // Runs while the group is mid-dispose; the flag is already
                // set, so this new member is released on the spot.
                group.add(counted(&count)).unwrap();
            })
        };
        group.add(reentrant).unwrap();

        group.dispose();
        assert_eq!(count.get(), 1);
        assert!(group.is_empty());
    }

    #[test]
    fn clone_shares_member_set() {
        let group = DisposableGroup::new();
        let alias = group.clone();
        group.add(dispose_fn(|| {})).unwrap();
        assert!(!alias.is_empty());

        alias.dispose();
        assert!(group.is_disposed());
    }

    #[test]
    fn dispose_fn_is_idempotent() {
        let count = Rc::new(Cell::new(0u32));
        let mut d = counted(&count);
        d.dispose();
        d.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            DisposeError::SelfAdd.to_string(),
            "cannot add a disposable group to itself"
        );
    }
}
