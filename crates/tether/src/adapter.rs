#![forbid(unsafe_code)]

//! Bridge from host event targets to the disposal model.
//!
//! The core does not depend on any concrete host event system; it only
//! requires "supports add/remove of a named listener with options", captured
//! by [`EventTarget`]. [`DisposableGroup::add_event_listener`] attaches a
//! callback to such a target and files a disposable whose release detaches
//! it using the identical name and options originally supplied.

use std::rc::Rc;

use crate::dispose::{DisposableGroup, dispose_fn};

/// Host object that accepts named event listeners.
///
/// `Options` travels with the registration and must be supplied identically
/// on removal (some hosts key registrations on it). Callbacks are shared
/// [`Rc`] closures; hosts that need to match a removal to a registration can
/// compare them with [`Rc::ptr_eq`].
pub trait EventTarget<E> {
    /// Listener options, passed through unchanged to removal.
    type Options: Clone;

    /// Attach `callback` for events named `name`.
    fn add_listener(&self, name: &str, callback: Rc<dyn Fn(&E)>, options: &Self::Options);

    /// Detach a previously attached callback.
    fn remove_listener(&self, name: &str, callback: &Rc<dyn Fn(&E)>, options: &Self::Options);
}

impl DisposableGroup {
    /// Attach `callback` to `target` and file its detachment into this group.
    ///
    /// Returns `&self` for chaining. If the group is already disposed, the
    /// listener is attached and then immediately detached, consistent with
    /// the group's release-on-add behavior.
    pub fn add_event_listener<E, T>(
        &self,
        target: &T,
        name: &str,
        callback: impl Fn(&E) + 'static,
        options: T::Options,
    ) -> &Self
    where
        E: 'static,
        T: EventTarget<E> + Clone + 'static,
    {
        let callback: Rc<dyn Fn(&E)> = Rc::new(callback);
        target.add_listener(name, Rc::clone(&callback), &options);

        let target = target.clone();
        let name = name.to_owned();
        self.insert(Box::new(dispose_fn(move || {
            target.remove_listener(&name, &callback, &options);
        })));
        self
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
