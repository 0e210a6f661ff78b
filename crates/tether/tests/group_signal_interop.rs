//! End-to-end interop between signals and disposable groups: an owner wires
//! several subscriptions into one group and tears everything down in one
//! call.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether::{Connection, DisposableGroup, Signal, dispose_fn};

/// A component that owns its subscriptions through a single group.
struct StatusPane {
    lifetime: DisposableGroup,
    resizes_seen: Rc<Cell<u32>>,
    keys_seen: Rc<RefCell<Vec<char>>>,
}

impl StatusPane {
    fn attach(resized: &Signal<(u16, u16)>, key_pressed: &Signal<char>) -> Self {
        let mut lifetime = DisposableGroup::new();
        let resizes_seen = Rc::new(Cell::new(0));
        let keys_seen = Rc::new(RefCell::new(Vec::new()));

        let resizes = Rc::clone(&resizes_seen);
        resized.connect_into(move |_| resizes.set(resizes.get() + 1), &mut lifetime);

        let keys = Rc::clone(&keys_seen);
        key_pressed.connect_into(move |key| keys.borrow_mut().push(*key), &mut lifetime);

        Self {
            lifetime,
            resizes_seen,
            keys_seen,
        }
    }

    fn detach(&self) {
        self.lifetime.dispose();
    }
}

#[test]
fn one_dispose_releases_every_subscription() {
    let resized: Signal<(u16, u16)> = Signal::new();
    let key_pressed: Signal<char> = Signal::new();
    let pane = StatusPane::attach(&resized, &key_pressed);

    resized.trigger((80, 24));
    key_pressed.trigger('q');
    assert_eq!(pane.resizes_seen.get(), 1);
    assert_eq!(*pane.keys_seen.borrow(), vec!['q']);

    pane.detach();
    assert!(!resized.has_listeners());
    assert!(!key_pressed.has_listeners());

    resized.trigger((100, 40));
    key_pressed.trigger('x');
    assert_eq!(pane.resizes_seen.get(), 1);
    assert_eq!(*pane.keys_seen.borrow(), vec!['q']);
}

#[test]
fn group_owns_signals_and_ad_hoc_cleanup_together() {
    let teardown_ran = Rc::new(Cell::new(false));
    let owned_signal: Signal<()> = Signal::new();
    owned_signal.connect(|_| {});

    let group = DisposableGroup::new();
    group.add(owned_signal.clone()).unwrap();
    let flag = Rc::clone(&teardown_ran);
    group.add(dispose_fn(move || flag.set(true))).unwrap();

    group.dispose();
    assert!(owned_signal.is_disposed());
    assert!(!owned_signal.has_listeners());
    assert!(teardown_ran.get());
}

#[test]
fn collector_vec_then_group_handoff() {
    // Handles collected into a Vec early can be filed into a group later.
    let signal: Signal<()> = Signal::new();
    let mut staged: Vec<Connection> = Vec::new();
    signal.connect_into(|_| {}, &mut staged);
    signal.connect_into(|_| {}, &mut staged);
    assert_eq!(staged.len(), 2);
    assert_eq!(signal.listener_count(), 2);

    let group = DisposableGroup::new();
    for connection in staged {
        group.add(connection).unwrap();
    }
    group.dispose();
    assert!(!signal.has_listeners());
}

#[test]
fn listener_that_disposes_its_own_group_mid_dispatch() {
    // The group releases the other subscription while a dispatch is in
    // flight; the snapshot still runs, and later dispatches reach nobody.
    let calls = Rc::new(Cell::new(0u32));
    let signal: Signal<()> = Signal::new();
    let mut group = DisposableGroup::new();

    let group_in = group.clone();
    signal.connect_into(move |_| group_in.dispose(), &mut group);
    let calls_in = Rc::clone(&calls);
    signal.connect_into(move |_| calls_in.set(calls_in.get() + 1), &mut group);

    signal.trigger(());
    assert_eq!(calls.get(), 1);
    assert!(!signal.has_listeners());

    signal.trigger(());
    assert_eq!(calls.get(), 1);
}
