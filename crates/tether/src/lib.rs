#![forbid(unsafe_code)]

//! Manual resource lifecycle primitives: disposable groups and typed signals.
//!
//! Two cooperating pieces:
//!
//! - [`DisposableGroup`]: aggregates releasable resources so an owner can
//!   release them all in one call.
//! - [`Signal<T>`]: a synchronous, in-process publish/subscribe broadcaster
//!   whose subscriptions are themselves releasable — [`Signal::connect`]
//!   returns a [`Connection`] that can be filed into a group.
//!
//! Everything is single-threaded (`Rc`-based) and runs to completion; user
//! callbacks may reenter any of these types, and the implementations are
//! ordered so reentrancy is safe (see the module docs for how).
//!
//! ```
//! use tether::{DisposableGroup, Signal};
//!
//! let resized: Signal<(u16, u16)> = Signal::new();
//! let mut owned = DisposableGroup::new();
//!
//! resized.connect_into(|&(w, h)| println!("{w}x{h}"), &mut owned);
//! resized.trigger((80, 24));
//!
//! // Tears down the subscription along with everything else filed in.
//! owned.dispose();
//! assert!(!resized.has_listeners());
//! ```

pub mod adapter;
pub mod dispose;
pub mod signal;

pub use adapter::EventTarget;
pub use dispose::{DisposableGroup, Dispose, DisposeError, DisposeFn, dispose_fn};
pub use signal::{Collector, Connection, Signal};
