#![forbid(unsafe_code)]

//! Typed synchronous signal dispatch with disposable subscriptions.
//!
//! [`Signal<T>`] is an in-process publish/subscribe broadcaster for one
//! payload type. [`connect`](Signal::connect) registers a listener and
//! returns a [`Connection`] — a disposable unsubscribe handle that can be
//! filed into a [`DisposableGroup`] so an owner releases whole sets of
//! subscriptions in one call. [`trigger`](Signal::trigger) invokes all
//! currently registered listeners synchronously, in registration order.
//!
//! # Architecture
//!
//! `Signal<T>` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Listener records are identity-keyed: each gets a monotonically allocated
//! id, and a `Connection` removes its own record through a `Weak` link back
//! into the signal interior. Removal by id replaces positional bookkeeping
//! and preserves the relative order of survivors.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. `trigger` dispatches against a point-in-time snapshot: listeners added,
//!    removed, or cleared during a dispatch do not change which callbacks
//!    that dispatch invokes.
//! 3. A disposed signal's listener sequence is permanently empty; further
//!    registrations are refused with an inert handle.
//! 4. Releasing a `Connection` removes exactly its own record, idempotently.
//! 5. A `once` listener fires at most once, even across nested dispatches.
//!
//! # Failure Modes
//!
//! - **Listener panics**: the unwind propagates to the `trigger` caller and
//!   remaining listeners in that dispatch do not run. Nothing is caught here.
//! - **Signal dropped**: outstanding `Connection`s go inert; releasing them
//!   is a no-op.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::warn;

use crate::dispose::{Dispose, DisposableGroup};

/// Shared mutable callback storage. `FnMut` lets listeners carry state.
type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

// ─── Signal ──────────────────────────────────────────────────────────────────

/// One registered listener. Identity is the id, never the callback value:
/// two structurally identical listeners registered separately stay distinct.
struct ListenerEntry<T> {
    id: u64,
    callback: Callback<T>,
}

/// Shared interior for [`Signal<T>`].
struct SignalInner<T> {
    /// Registration order is dispatch order.
    listeners: Vec<ListenerEntry<T>>,
    /// Monotonic disposal flag.
    disposed: bool,
    /// Next listener id. Ids are never reused within one signal.
    next_id: u64,
}

impl<T> SignalInner<T> {
    /// Remove the entry with `id`, preserving the order of the rest.
    ///
    /// The removed entry is handed back so the caller can drop it outside
    /// the interior borrow.
    fn disconnect(&mut self, id: u64) -> Option<ListenerEntry<T>> {
        self.listeners
            .iter()
            .position(|entry| entry.id == id)
            .map(|at| self.listeners.remove(at))
    }
}

/// A synchronous, in-process broadcaster for payloads of type `T`.
///
/// Cloning a `Signal` creates a new handle to the **same** listener sequence.
/// Use `Signal<()>` for signals that carry no data.
///
/// A signal is itself a [`Dispose`] implementor, so it can be filed into a
/// [`DisposableGroup`] and torn down with its owner.
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Signal")
            .field("listeners", &inner.listeners.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl<T> Signal<T> {
    /// Create a live signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                listeners: Vec::new(),
                disposed: false,
                next_id: 0,
            })),
        }
    }

    /// Whether at least one listener is registered.
    #[must_use]
    pub fn has_listeners(&self) -> bool {
        !self.inner.borrow().listeners.is_empty()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Whether the signal has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Invoke every currently registered listener with `payload`, in
    /// registration order, synchronously. No-op when no listener is
    /// registered.
    ///
    /// Dispatch runs against a snapshot of the listener sequence, and the
    /// interior borrow is not held while callbacks run: listeners may
    /// connect, disconnect (themselves or others), or dispose this signal
    /// reentrantly without affecting which callbacks the in-flight dispatch
    /// invokes. A listener that reenters `trigger` on the same signal is
    /// skipped in the nested dispatch rather than re-entered recursively.
    ///
    /// A panicking listener halts the remaining listeners of this dispatch;
    /// the unwind propagates to the caller.
    pub fn trigger(&self, payload: T) {
        let snapshot: Vec<Callback<T>> = {
            let inner = self.inner.borrow();
            if inner.listeners.is_empty() {
                return;
            }
            inner
                .listeners
                .iter()
                .map(|entry| Rc::clone(&entry.callback))
                .collect()
        };
        for callback in snapshot {
            // Already borrowed means this exact callback is executing
            // further up the stack (a reentrant trigger); skip it.
            if let Ok(mut listener) = callback.try_borrow_mut() {
                (*listener)(&payload);
            }
        }
    }

    /// Clear all listeners and mark the signal disposed. Idempotent.
    ///
    /// The flag is set before the sequence is cleared, and the cleared
    /// records are dropped outside the interior borrow. Handles already
    /// handed out stay valid to release (as no-ops), and subsequent
    /// registrations are refused per [`connect`](Signal::connect).
    pub fn dispose(&self) {
        let cleared = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            std::mem::take(&mut inner.listeners)
        };
        drop(cleared);
    }
}

impl<T: 'static> Signal<T> {
    /// Register a listener; returns its disposable unsubscribe handle.
    ///
    /// The listener is appended to the end of the sequence and receives every
    /// subsequent [`trigger`](Signal::trigger) payload until its
    /// [`Connection`] is released or the signal is disposed.
    ///
    /// Registering on a disposed signal is refused: a warning is logged and
    /// an inert handle is returned, mirroring the group's graceful handling
    /// of post-disposal `add`.
    pub fn connect(&self, listener: impl FnMut(&T) + 'static) -> Connection {
        self.register(Rc::new(RefCell::new(listener)))
    }

    /// Register a listener bound to an owned context value.
    ///
    /// The context is stored with the record and passed as the explicit
    /// receiver argument on every dispatch; mutations persist across calls.
    pub fn connect_with<C: 'static>(
        &self,
        context: C,
        mut listener: impl FnMut(&mut C, &T) + 'static,
    ) -> Connection {
        let mut context = context;
        self.connect(move |payload| listener(&mut context, payload))
    }

    /// Register a listener and file a clone of its unsubscribe handle into
    /// `collector`, so releasing the collector also unsubscribes it.
    pub fn connect_into(
        &self,
        listener: impl FnMut(&T) + 'static,
        collector: &mut impl Collector,
    ) -> Connection {
        let connection = self.connect(listener);
        collector.collect(connection.clone());
        connection
    }

    /// Register a listener that is removed right after its first invocation.
    ///
    /// A fired flag gates re-entry, so the listener runs at most once even
    /// when dispatches nest (a snapshot taken before the first invocation
    /// may still contain the record).
    pub fn once(&self, mut listener: impl FnMut(&T) + 'static) -> Connection {
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                drop(inner);
                warn!("connect on a disposed signal; returning an inert handle");
                return Connection::noop();
            }
            let id = inner.next_id;
            inner.next_id += 1;
            id
        };

        let signal = Rc::downgrade(&self.inner);
        let mut fired = false;
        let callback = move |payload: &T| {
            if fired {
                return;
            }
            fired = true;
            listener(payload);
            if let Some(inner) = signal.upgrade() {
                let removed = inner.borrow_mut().disconnect(id);
                drop(removed);
            }
        };

        self.inner.borrow_mut().listeners.push(ListenerEntry {
            id,
            callback: Rc::new(RefCell::new(callback)),
        });
        Connection::new(Rc::downgrade(&self.inner), id)
    }

    fn register(&self, callback: Callback<T>) -> Connection {
        let mut inner = self.inner.borrow_mut();
        if inner.disposed {
            drop(inner);
            warn!("connect on a disposed signal; returning an inert handle");
            return Connection::noop();
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(ListenerEntry { id, callback });
        drop(inner);
        Connection::new(Rc::downgrade(&self.inner), id)
    }
}

impl<T> Dispose for Signal<T> {
    fn dispose(&mut self) {
        Signal::dispose(self);
    }
}

// ─── Connection ──────────────────────────────────────────────────────────────

/// Type-erased link from a [`Connection`] back to its listener record.
trait ConnectionLink {
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
}

struct SignalLink<T> {
    signal: Weak<RefCell<SignalInner<T>>>,
    id: u64,
}

impl<T> ConnectionLink for SignalLink<T> {
    fn disconnect(&self) {
        if let Some(inner) = self.signal.upgrade() {
            // Drop the removed record outside the interior borrow.
            let removed = inner.borrow_mut().disconnect(self.id);
            drop(removed);
        }
    }

    fn is_connected(&self) -> bool {
        self.signal.upgrade().is_some_and(|inner| {
            inner
                .borrow()
                .listeners
                .iter()
                .any(|entry| entry.id == self.id)
        })
    }
}

/// Disposable unsubscribe handle returned from [`Signal::connect`] and
/// [`Signal::once`].
///
/// Releasing it removes exactly one listener record, by identity. Release is
/// idempotent, preserves the relative order of remaining listeners, and is a
/// safe no-op once the signal is disposed or dropped.
///
/// The handle holds a weak link only: dropping a `Connection` without
/// disposing it does **not** unsubscribe the listener.
#[derive(Clone)]
pub struct Connection {
    link: Option<Rc<dyn ConnectionLink>>,
}

impl Connection {
    fn new<T: 'static>(signal: Weak<RefCell<SignalInner<T>>>, id: u64) -> Self {
        Self {
            link: Some(Rc::new(SignalLink { signal, id })),
        }
    }

    /// An inert handle whose release does nothing. Returned when a
    /// registration is refused.
    #[must_use]
    pub fn noop() -> Self {
        Self { link: None }
    }

    /// Remove this handle's listener record from its signal. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            link.disconnect();
        }
    }

    /// Whether the listener record is still registered on a live signal.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_connected())
    }
}

impl Dispose for Connection {
    fn dispose(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .finish()
    }
}

// ─── Collector ───────────────────────────────────────────────────────────────

/// Destination for unsubscribe handles filed at registration time via
/// [`Signal::connect_into`].
pub trait Collector {
    /// Take ownership of one handle.
    fn collect(&mut self, connection: Connection);
}

impl Collector for DisposableGroup {
    fn collect(&mut self, connection: Connection) {
        // A Connection is never the group itself, so this cannot fail;
        // if the group is disposed the handle is released immediately.
        self.insert(Box::new(connection));
    }
}

impl Collector for Vec<Connection> {
    fn collect(&mut self, connection: Connection) {
        self.push(connection);
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
