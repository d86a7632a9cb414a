//! Typed, in-process publish/subscribe bus.
//!
//! Delivery rules:
//!
//! - Synchronous: [`EventBus::publish`] returns after every handler ran.
//! - Handlers for a kind run in registration order.
//! - A handler may publish other kinds; those dispatch depth-first before the
//!   outer publish returns.
//! - Publishing a kind that is already being dispatched further up the chain
//!   is refused with [`BusError::Reentrant`].
//!
//! The bus is single-threaded (`Rc`-based). Clone it to share; hand
//! [`WeakEventBus`] to handlers that publish so the bus does not own itself.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

/// Upper bound on nested dispatch, independent of the re-entrancy check.
pub const MAX_DISPATCH_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Event trait
// ---------------------------------------------------------------------------

/// An event that can travel over an [`EventBus`].
///
/// `Kind` is the event's name: subscribers register for a kind and receive
/// every event of that kind.
pub trait BusEvent {
    /// Discriminant used for routing.
    type Kind: Copy + Eq + Hash + Debug;

    /// Returns the routing kind of this event.
    fn kind(&self) -> Self::Kind;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a publish was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError<K: Debug> {
    /// The kind is already being dispatched further up the handler chain.
    #[error("event {0:?} published from within its own dispatch")]
    Reentrant(K),
    /// Nested dispatch exceeded [`MAX_DISPATCH_DEPTH`].
    #[error("dispatch depth exceeded {0}")]
    DepthExceeded(usize),
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// Handle returned by [`EventBus::subscribe`]; pass it to
/// [`EventBus::unsubscribe`] to stop delivery.
#[derive(Debug, PartialEq, Eq)]
pub struct Subscription<K> {
    id: u64,
    kind: K,
}

impl<K: Copy> Subscription<K> {
    /// The kind this subscription listens to.
    pub fn kind(&self) -> K {
        self.kind
    }
}

/// Unsubscribes when dropped. Use for subscribers with a mount/unmount
/// lifecycle so a discarded component never sees another event.
pub struct SubscriptionGuard<E: BusEvent> {
    bus: WeakEventBus<E>,
    subscription: Option<Subscription<E::Kind>>,
}

impl<E: BusEvent> SubscriptionGuard<E> {
    /// Keeps the subscription alive past the guard's lifetime.
    pub fn into_inner(mut self) -> Option<Subscription<E::Kind>> {
        self.subscription.take()
    }
}

impl<E: BusEvent> Drop for SubscriptionGuard<E> {
    fn drop(&mut self) {
        if let (Some(sub), Some(bus)) = (self.subscription.take(), self.bus.upgrade()) {
            bus.unsubscribe(&sub);
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

type Handler<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Entry<E: BusEvent> {
    id: u64,
    kind: E::Kind,
    handler: Handler<E>,
}

struct Inner<E: BusEvent> {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<Entry<E>>>,
    in_flight: RefCell<Vec<E::Kind>>,
}

/// Shared handle to a bus. Cloning is cheap and every clone addresses the
/// same subscriber table.
pub struct EventBus<E: BusEvent> {
    inner: Rc<Inner<E>>,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                next_id: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
                in_flight: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Non-owning handle for use inside handlers.
    pub fn downgrade(&self) -> WeakEventBus<E> {
        WeakEventBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Registers `handler` for every event of `kind`.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> Subscription<E::Kind>
    where
        F: FnMut(&E) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let handler: Handler<E> = Rc::new(RefCell::new(handler));
        self.inner
            .subscribers
            .borrow_mut()
            .push(Entry { id, kind, handler });
        trace!(?kind, id, "subscribed");
        Subscription { id, kind }
    }

    /// Like [`subscribe`](Self::subscribe) but unsubscribes when the returned
    /// guard is dropped.
    pub fn subscribe_scoped<F>(&self, kind: E::Kind, handler: F) -> SubscriptionGuard<E>
    where
        F: FnMut(&E) + 'static,
    {
        SubscriptionGuard {
            bus: self.downgrade(),
            subscription: Some(self.subscribe(kind, handler)),
        }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription<E::Kind>) -> bool {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|entry| entry.id != subscription.id);
        before != subscribers.len()
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Delivers `event` to every subscriber of its kind.
    ///
    /// Returns the number of handlers invoked. Handlers unsubscribed by an
    /// earlier handler in the same dispatch are skipped.
    pub fn publish(&self, event: E) -> Result<usize, BusError<E::Kind>> {
        let kind = event.kind();
        {
            let mut in_flight = self.inner.in_flight.borrow_mut();
            if in_flight.contains(&kind) {
                warn!(?kind, chain = ?in_flight.as_slice(), "dropping re-entrant publish");
                return Err(BusError::Reentrant(kind));
            }
            if in_flight.len() >= MAX_DISPATCH_DEPTH {
                warn!(?kind, "dropping publish beyond max dispatch depth");
                return Err(BusError::DepthExceeded(MAX_DISPATCH_DEPTH));
            }
            in_flight.push(kind);
        }
        let _dispatch = DispatchGuard {
            in_flight: &self.inner.in_flight,
        };

        let targets: Vec<(u64, Handler<E>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| (entry.id, Rc::clone(&entry.handler)))
            .collect();

        let mut delivered = 0;
        for (id, handler) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut handler) => {
                    (&mut *handler)(&event);
                    delivered += 1;
                }
                Err(_) => warn!(?kind, id, "handler busy, skipping"),
            }
        }

        trace!(?kind, delivered, "published");
        Ok(delivered)
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .any(|entry| entry.id == id)
    }
}

/// Pops the dispatching kind when a publish ends, including by unwinding out
/// of a panicking handler.
struct DispatchGuard<'a, K> {
    in_flight: &'a RefCell<Vec<K>>,
}

impl<K> Drop for DispatchGuard<'_, K> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.try_borrow_mut() {
            in_flight.pop();
        }
    }
}

/// Weak counterpart of [`EventBus`].
pub struct WeakEventBus<E: BusEvent> {
    inner: Weak<Inner<E>>,
}

impl<E: BusEvent> Clone for WeakEventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<E: BusEvent> WeakEventBus<E> {
    /// Recovers a strong handle if the bus is still alive.
    pub fn upgrade(&self) -> Option<EventBus<E>> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
