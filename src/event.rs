//! Change notification.
//!
//! [`Event`] is an explicit observer registry: subscribing returns a
//! [`SubscriptionId`] that detaches the handler again. [`SuspendableEvent`]
//! additionally buffers raises while suspended and reports on resume whether
//! anything was raised in between.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A change handler.
pub type Handler = Rc<dyn Fn()>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// An observer registry.
///
/// Handlers are invoked in subscription order. Handlers may subscribe or
/// unsubscribe while the event is being raised; the change takes effect on
/// the next raise.
#[derive(Default)]
pub struct Event {
    handlers: RefCell<Vec<(SubscriptionId, Handler)>>,
    next_id: Cell<u64>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, handler));
        id
    }

    /// Detach a handler. Returns `false` if it was not attached.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        match handlers.iter().position(|(handler_id, _)| *handler_id == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_subscribers(&self) -> bool {
        !self.handlers.borrow().is_empty()
    }

    pub fn raise(&self) {
        let handlers: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler();
        }
    }

    /// Detach every handler.
    pub fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handlers.borrow().len())
            .finish()
    }
}

/// An event whose raises can be deferred.
///
/// Suspension nests. While suspended, raising only records that a change is
/// pending. The owner decides on resume whether the pending change is still
/// worth reporting and then calls [`SuspendableEvent::fire`].
#[derive(Debug, Default)]
pub struct SuspendableEvent {
    event: Event,
    depth: Cell<u32>,
    pending: Cell<bool>,
}

impl SuspendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: Handler) -> SubscriptionId {
        self.event.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.event.unsubscribe(id)
    }

    pub fn has_subscribers(&self) -> bool {
        self.event.has_subscribers()
    }

    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Raise now, or mark pending while suspended.
    pub fn raise(&self) {
        if self.is_suspended() {
            self.pending.set(true);
        } else {
            self.event.raise();
        }
    }

    pub fn suspend(&self) {
        self.depth.set(self.depth.get() + 1);
    }

    /// Leave one suspension level.
    ///
    /// Returns `true` when the outermost level was left with a change
    /// pending; the pending flag is cleared.
    ///
    /// # Panics
    ///
    /// Panics if the event is not suspended.
    pub fn resume(&self) -> bool {
        let depth = self.depth.get();
        assert!(depth > 0, "resume without matching suspend");
        self.depth.set(depth - 1);
        depth == 1 && self.pending.replace(false)
    }

    /// Invoke the handlers unconditionally.
    pub fn fire(&self) {
        self.event.raise();
    }

    pub fn clear(&self) {
        self.event.clear();
        self.pending.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Handler) {
        let count = Rc::new(Cell::new(0));
        let handler_count = Rc::clone(&count);
        (count, Rc::new(move || handler_count.set(handler_count.get() + 1)))
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let event = Event::new();
        let (count, handler) = counter();
        let id = event.subscribe(handler);

        event.raise();
        assert_eq!(count.get(), 1);

        assert!(event.unsubscribe(id));
        assert!(!event.unsubscribe(id));
        event.raise();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_while_raising() {
        let event = Rc::new(Event::new());
        let id = Rc::new(Cell::new(None));
        let handler_event = Rc::clone(&event);
        let handler_id = Rc::clone(&id);
        id.set(Some(event.subscribe(Rc::new(move || {
            if let Some(id) = handler_id.get() {
                handler_event.unsubscribe(id);
            }
        }))));

        event.raise();
        assert!(!event.has_subscribers());
    }

    #[test]
    fn test_suspended_raises_are_buffered() {
        let event = SuspendableEvent::new();
        let (count, handler) = counter();
        event.subscribe(handler);

        event.suspend();
        event.raise();
        event.raise();
        assert_eq!(count.get(), 0);
        assert!(event.resume());
        assert!(!event.is_pending());
    }

    #[test]
    fn test_nested_suspension() {
        let event = SuspendableEvent::new();
        event.suspend();
        event.suspend();
        event.raise();
        assert!(!event.resume());
        assert!(event.is_suspended());
        assert!(event.resume());
    }

    #[test]
    #[should_panic(expected = "resume without matching suspend")]
    fn test_unmatched_resume_panics() {
        SuspendableEvent::new().resume();
    }
}
