//! Calculation nodes.
//!
//! A stage or modifier value is wrapped in three layers:
//!
//! ```text
//! ValueNode -> CachingNode -> View (default | suspendable) -> SubscriberCounted
//! ```
//!
//! - [`ValueNode`] evaluates a [`Calculable`] and subscribes to every node and
//!   collection the evaluation read.
//! - [`CachingNode`] memoizes the result and coalesces invalidations.
//! - [`View`] picks the channel a subscriber listens on: the eager channel
//!   used for propagation inside the graph, or the suspension-aware channel
//!   consumers use.
//! - [`SubscriberCounted`] counts subscribers so the pruner knows which
//!   nodes are still held.

use crate::context::StaticContext;
use crate::engine::{Engine, TrackingContext};
use crate::event::{Event, Handler, SubscriptionId, SuspendableEvent};
use crate::node_value::NodeValue;
use crate::suspension::SuspendableEvents;
use crate::value::Calculable;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::warn;

/// Something that can be subscribed to for change notifications.
pub trait Observable {
    fn subscribe(&self, handler: Handler) -> SubscriptionId;

    /// Returns `false` if `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// A node holding a (possibly unset) value.
///
/// # Examples
///
/// ```rust
/// use statgraph::node::{CalculationNode, NullNode};
///
/// assert_eq!(NullNode.value(), None);
/// ```
pub trait CalculationNode: Observable {
    fn value(&self) -> Option<NodeValue>;
}

/// The pointer identity of a subscription target.
pub(crate) fn observable_key(observable: &Rc<dyn Observable>) -> *const () {
    Rc::as_ptr(observable) as *const ()
}

struct Dependency {
    key: *const (),
    source: Rc<dyn Observable>,
    subscription: SubscriptionId,
}

/// Evaluates a calculable and tracks what it read.
///
/// After every evaluation the node subscribes to the nodes and collections
/// that were read and drops the subscriptions it no longer needs. A change
/// in any of them is forwarded to the node's own subscribers.
pub struct ValueNode {
    calculable: Box<dyn Calculable>,
    label: String,
    engine: Weak<Engine>,
    dependencies: RefCell<Vec<Dependency>>,
    value_changed: Event,
    calculating: Cell<bool>,
    self_weak: Weak<ValueNode>,
}

impl ValueNode {
    pub(crate) fn new(calculable: Box<dyn Calculable>, label: String, engine: Weak<Engine>) -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            calculable,
            label,
            engine,
            dependencies: RefCell::new(Vec::new()),
            value_changed: Event::new(),
            calculating: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    /// A node outside of any calculator. It evaluates against an empty
    /// context and never has dependencies.
    pub fn detached(calculable: Box<dyn Calculable>, label: impl Into<String>) -> Rc<Self> {
        Self::new(calculable, label.into(), Weak::new())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of nodes and collections this node is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.borrow().len()
    }

    /// Evaluate and re-track dependencies.
    ///
    /// Re-entrant evaluation means the node (indirectly) depends on itself;
    /// the inner evaluation yields an unset value.
    pub fn calculate(&self) -> Option<NodeValue> {
        if self.calculating.replace(true) {
            warn!(node = %self.label, "dependency cycle detected, value is unset");
            return None;
        }

        match self.engine.upgrade() {
            Some(engine) => {
                let context = TrackingContext::new(&engine);
                let value = self.calculable.calculate(&context);
                self.calculating.set(false);
                self.track(context.into_dependencies());
                value
            }
            None => {
                let value = self.calculable.calculate(&StaticContext::new());
                self.calculating.set(false);
                value
            }
        }
    }

    fn track(&self, used: Vec<Rc<dyn Observable>>) {
        let mut previous = self.dependencies.take();
        let mut next = Vec::with_capacity(used.len());

        for source in used {
            let key = observable_key(&source);
            if next.iter().any(|dependency: &Dependency| dependency.key == key) {
                continue;
            }
            match previous.iter().position(|dependency| dependency.key == key) {
                Some(index) => next.push(previous.swap_remove(index)),
                None => {
                    let subscription = source.subscribe(self.forwarder());
                    next.push(Dependency {
                        key,
                        source,
                        subscription,
                    });
                }
            }
        }

        for stale in previous {
            stale.source.unsubscribe(stale.subscription);
        }
        *self.dependencies.borrow_mut() = next;
    }

    fn forwarder(&self) -> Handler {
        let node = self.self_weak.clone();
        Rc::new(move || {
            if let Some(node) = node.upgrade() {
                node.value_changed.raise();
            }
        })
    }

    /// Drop every dependency subscription.
    pub fn dispose(&self) {
        for dependency in self.dependencies.take() {
            dependency.source.unsubscribe(dependency.subscription);
        }
    }

    #[cfg(test)]
    pub(crate) fn invalidate(&self) {
        self.value_changed.raise();
    }
}

impl Observable for ValueNode {
    fn subscribe(&self, handler: Handler) -> SubscriptionId {
        self.value_changed.subscribe(handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.value_changed.unsubscribe(id)
    }
}

impl fmt::Debug for ValueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueNode")
            .field("label", &self.label)
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}

/// A node's value as it was when the first change of a suspension arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ValueBeforeChange {
    NotRecorded,
    Unknown,
    Known(Option<NodeValue>),
}

/// Memoizes a [`ValueNode`].
///
/// `value()` re-evaluates only on the first access after an invalidation.
/// Invalidations are coalesced: the eager channel fires once per window
/// between two recomputations, however many inputs change. The
/// suspension-aware channel fires on resume, and only if the value
/// actually differs from the value before the batch.
pub struct CachingNode {
    inner: Rc<ValueNode>,
    inner_subscription: SubscriptionId,
    cache: Cell<Option<Option<NodeValue>>>,
    invalidated: Cell<bool>,
    change_received: Event,
    value_changed: SuspendableEvent,
    value_before_change: Cell<ValueBeforeChange>,
    disposed: Cell<bool>,
}

impl CachingNode {
    pub fn new(inner: Rc<ValueNode>) -> Rc<Self> {
        Rc::new_cyclic(|self_weak: &Weak<CachingNode>| {
            let node = self_weak.clone();
            let inner_subscription = inner.subscribe(Rc::new(move || {
                if let Some(node) = node.upgrade() {
                    node.on_inner_changed();
                }
            }));
            Self {
                inner,
                inner_subscription,
                cache: Cell::new(None),
                invalidated: Cell::new(false),
                change_received: Event::new(),
                value_changed: SuspendableEvent::new(),
                value_before_change: Cell::new(ValueBeforeChange::NotRecorded),
                disposed: Cell::new(false),
            }
        })
    }

    pub fn label(&self) -> &str {
        self.inner.label()
    }

    /// The cached value, recalculated if stale.
    ///
    /// A disposed node never recalculates and reports its last cached value.
    pub fn value(&self) -> Option<NodeValue> {
        if let Some(value) = self.cache.get() {
            return value;
        }
        if self.disposed.get() {
            return None;
        }
        let value = self.inner.calculate();
        self.cache.set(Some(value));
        self.invalidated.set(false);
        value
    }

    /// Whether a cached value is available.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn on_inner_changed(&self) {
        let cached = self.cache.take();
        if self.value_changed.is_suspended()
            && self.value_before_change.get() == ValueBeforeChange::NotRecorded
        {
            self.value_before_change.set(match cached {
                Some(value) => ValueBeforeChange::Known(value),
                None => ValueBeforeChange::Unknown,
            });
        }
        self.value_changed.raise();
        if !self.invalidated.replace(true) {
            self.change_received.raise();
        }
    }

    /// Unsubscribe from the wrapped node and its dependencies.
    ///
    /// # Panics
    ///
    /// Panics if the node was already disposed.
    pub fn dispose(&self) {
        assert!(!self.disposed.replace(true), "calculation node disposed twice");
        self.inner.unsubscribe(self.inner_subscription);
        self.inner.dispose();
        self.change_received.clear();
        self.value_changed.clear();
    }
}

impl SuspendableEvents for CachingNode {
    fn suspend_events(&self) {
        self.value_changed.suspend();
    }

    fn resume_events(&self) {
        let pending = self.value_changed.resume();
        if self.value_changed.is_suspended() {
            return;
        }
        let before = self.value_before_change.replace(ValueBeforeChange::NotRecorded);
        if !pending || self.disposed.get() || !self.value_changed.has_subscribers() {
            return;
        }
        let changed = match before {
            ValueBeforeChange::Known(previous) => self.value() != previous,
            ValueBeforeChange::Unknown | ValueBeforeChange::NotRecorded => true,
        };
        if changed {
            self.value_changed.fire();
        }
    }
}

impl fmt::Debug for CachingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingNode")
            .field("label", &self.label())
            .field("cache", &self.cache.get())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// A graph member with an eager and a suspension-aware channel.
pub trait Notifier {
    /// Eager channel. Fires synchronously while a batch is running.
    fn change_received(&self) -> &Event;

    /// Suspension-aware channel. Fires at the end of a batch.
    fn value_changed(&self) -> &SuspendableEvent;
}

impl Notifier for CachingNode {
    fn change_received(&self) -> &Event {
        &self.change_received
    }

    fn value_changed(&self) -> &SuspendableEvent {
        &self.value_changed
    }
}

/// Which channel a [`View`] subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Eager notifications, delivered while a batch is still running.
    /// Handlers must not read values.
    Default,
    /// Notifications deferred to the end of a batch.
    Suspendable,
}

/// A graph member seen through one of its channels.
pub struct View<T> {
    target: Rc<T>,
    kind: ViewKind,
}

impl<T> View<T> {
    pub(crate) fn new(target: Rc<T>, kind: ViewKind) -> Self {
        Self { target, kind }
    }

    pub fn target(&self) -> &Rc<T> {
        &self.target
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }
}

impl<T: Notifier> Observable for View<T> {
    fn subscribe(&self, handler: Handler) -> SubscriptionId {
        match self.kind {
            ViewKind::Default => self.target.change_received().subscribe(handler),
            ViewKind::Suspendable => self.target.value_changed().subscribe(handler),
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.kind {
            ViewKind::Default => self.target.change_received().unsubscribe(id),
            ViewKind::Suspendable => self.target.value_changed().unsubscribe(id),
        }
    }
}

impl CalculationNode for View<CachingNode> {
    fn value(&self) -> Option<NodeValue> {
        self.target.value()
    }
}

/// Counts the subscribers of the wrapped observable.
pub struct SubscriberCounted<V> {
    inner: V,
    count: Cell<usize>,
}

impl<V> SubscriberCounted<V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            count: Cell::new(0),
        }
    }

    pub fn inner(&self) -> &V {
        &self.inner
    }

    pub fn subscriber_count(&self) -> usize {
        self.count.get()
    }
}

impl<V: Observable> Observable for SubscriberCounted<V> {
    fn subscribe(&self, handler: Handler) -> SubscriptionId {
        let id = self.inner.subscribe(handler);
        self.count.set(self.count.get() + 1);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.inner.unsubscribe(id);
        if removed {
            let count = self.count.get();
            assert!(count > 0, "subscriber count went negative");
            self.count.set(count - 1);
        }
        removed
    }
}

impl<V: CalculationNode> CalculationNode for SubscriberCounted<V> {
    fn value(&self) -> Option<NodeValue> {
        self.inner.value()
    }
}

/// A counted view of a graph member.
pub type CountedView<T> = SubscriberCounted<View<T>>;

/// A graph member together with its two counted views.
pub(crate) struct NodeEntry<T> {
    target: Rc<T>,
    default_view: Rc<CountedView<T>>,
    suspendable_view: Rc<CountedView<T>>,
}

impl<T> NodeEntry<T> {
    pub(crate) fn new(target: Rc<T>) -> Self {
        Self {
            default_view: Rc::new(SubscriberCounted::new(View::new(Rc::clone(&target), ViewKind::Default))),
            suspendable_view: Rc::new(SubscriberCounted::new(View::new(
                Rc::clone(&target),
                ViewKind::Suspendable,
            ))),
            target,
        }
    }

    pub(crate) fn target(&self) -> &Rc<T> {
        &self.target
    }

    pub(crate) fn view(&self, kind: ViewKind) -> Rc<CountedView<T>> {
        match kind {
            ViewKind::Default => Rc::clone(&self.default_view),
            ViewKind::Suspendable => Rc::clone(&self.suspendable_view),
        }
    }

    /// Subscribers across both views.
    pub(crate) fn subscriber_count(&self) -> usize {
        self.default_view.subscriber_count() + self.suspendable_view.subscriber_count()
    }
}

impl<T> Clone for NodeEntry<T> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
            default_view: Rc::clone(&self.default_view),
            suspendable_view: Rc::clone(&self.suspendable_view),
        }
    }
}

/// The node returned for a missing stat. Always unset, never changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNode;

impl Observable for NullNode {
    fn subscribe(&self, _handler: Handler) -> SubscriptionId {
        SubscriptionId(u64::MAX)
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }
}

impl CalculationNode for NullNode {
    fn value(&self) -> Option<NodeValue> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CalculationContext;

    struct Counter {
        value: Rc<Cell<f64>>,
        evaluations: Rc<Cell<u32>>,
    }

    impl Calculable for Counter {
        fn calculate(&self, _context: &dyn CalculationContext) -> Option<NodeValue> {
            self.evaluations.set(self.evaluations.get() + 1);
            Some(NodeValue::from(self.value.get()))
        }
    }

    fn caching_node() -> (Rc<CachingNode>, Rc<ValueNode>, Rc<Cell<f64>>, Rc<Cell<u32>>) {
        let value = Rc::new(Cell::new(1.0));
        let evaluations = Rc::new(Cell::new(0));
        let inner = ValueNode::detached(
            Box::new(Counter {
                value: Rc::clone(&value),
                evaluations: Rc::clone(&evaluations),
            }),
            "Counter",
        );
        (CachingNode::new(Rc::clone(&inner)), inner, value, evaluations)
    }

    fn counting_handler() -> (Rc<Cell<u32>>, Handler) {
        let count = Rc::new(Cell::new(0));
        let handler_count = Rc::clone(&count);
        (count, Rc::new(move || handler_count.set(handler_count.get() + 1)))
    }

    #[test]
    fn test_value_is_cached() {
        let (node, inner, value, evaluations) = caching_node();
        assert_eq!(node.value(), Some(NodeValue::from(1.0)));
        assert_eq!(node.value(), Some(NodeValue::from(1.0)));
        assert_eq!(evaluations.get(), 1);

        value.set(2.0);
        inner.invalidate();
        assert!(!node.is_cached());
        assert_eq!(node.value(), Some(NodeValue::from(2.0)));
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    fn test_change_received_is_coalesced() {
        let (node, inner, _, _) = caching_node();
        let (count, handler) = counting_handler();
        node.change_received().subscribe(handler);
        node.value();

        inner.invalidate();
        inner.invalidate();
        assert_eq!(count.get(), 1);

        node.value();
        inner.invalidate();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_suspended_change_fires_once_on_resume() {
        let (node, inner, value, _) = caching_node();
        let (count, handler) = counting_handler();
        node.value_changed().subscribe(handler);
        node.value();

        node.suspend_events();
        value.set(5.0);
        inner.invalidate();
        inner.invalidate();
        assert_eq!(count.get(), 0);

        node.resume_events();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_resume_skips_unchanged_value() {
        let (node, inner, _, _) = caching_node();
        let (count, handler) = counting_handler();
        node.value_changed().subscribe(handler);
        node.value();

        node.suspend_events();
        inner.invalidate();
        node.resume_events();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_resume_fires_when_previous_value_unknown() {
        let (node, inner, _, _) = caching_node();
        let (count, handler) = counting_handler();
        node.value_changed().subscribe(handler);

        node.suspend_events();
        inner.invalidate();
        node.resume_events();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_disposed_node_keeps_last_value() {
        let (node, _, value, evaluations) = caching_node();
        node.value();
        node.dispose();
        value.set(9.0);
        assert_eq!(node.value(), Some(NodeValue::from(1.0)));
        assert_eq!(evaluations.get(), 1);
    }

    #[test]
    #[should_panic(expected = "calculation node disposed twice")]
    fn test_double_dispose_panics() {
        let (node, _, _, _) = caching_node();
        node.dispose();
        node.dispose();
    }

    #[test]
    fn test_subscriber_counted_views() {
        let (node, _, _, _) = caching_node();
        let entry = NodeEntry::new(node);
        let default_view = entry.view(ViewKind::Default);
        let suspendable_view = entry.view(ViewKind::Suspendable);

        let a = default_view.subscribe(Rc::new(|| {}));
        suspendable_view.subscribe(Rc::new(|| {}));
        assert_eq!(entry.subscriber_count(), 2);

        assert!(default_view.unsubscribe(a));
        assert!(!default_view.unsubscribe(a));
        assert_eq!(entry.subscriber_count(), 1);
        assert_eq!(suspendable_view.value(), Some(NodeValue::from(1.0)));
    }

    #[test]
    fn test_views_route_to_their_channel() {
        let (node, inner, _, _) = caching_node();
        let entry = NodeEntry::new(Rc::clone(&node));
        let (eager, eager_handler) = counting_handler();
        let (deferred, deferred_handler) = counting_handler();
        entry.view(ViewKind::Default).subscribe(eager_handler);
        entry.view(ViewKind::Suspendable).subscribe(deferred_handler);

        node.suspend_events();
        inner.invalidate();
        assert_eq!(eager.get(), 1);
        assert_eq!(deferred.get(), 0);
        node.resume_events();
        assert_eq!(deferred.get(), 1);
    }
}
