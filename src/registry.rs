//! Explicitly registered stats.
//!
//! Stats with an [`ExplicitRegistrationType`](crate::stat::ExplicitRegistrationType)
//! are surfaced to consumers without anyone asking for them. As soon as such
//! a stat gets a graph, the registry subscribes to its total node and keeps
//! that subscription, so the pruner never reclaims the stat.

use crate::event::{Handler, SubscriptionId, SuspendableEvent};
use crate::node::{CachingNode, CountedView, Observable};
use crate::node_type::NodeType;
use crate::stat::Stat;
use crate::suspension::SuspendableEvents;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

struct Pin {
    view: Rc<CountedView<CachingNode>>,
    subscription: SubscriptionId,
}

/// Pins the total nodes of explicitly registered stats.
#[derive(Default)]
pub(crate) struct StatRegistry {
    pins: RefCell<HashMap<Stat, Pin>>,
    registered: RefCell<Vec<Stat>>,
    changed: SuspendableEvent,
}

impl StatRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// React to a stat graph being created.
    ///
    /// `total_node` fetches the suspension-aware view of the stat's total
    /// node; it is only called for registered stats.
    pub(crate) fn on_stat_added(&self, stat: &Stat, total_node: impl FnOnce() -> Rc<CountedView<CachingNode>>) {
        let Some(registration) = stat.explicit_registration() else {
            return;
        };
        if self.pins.borrow().contains_key(stat) {
            return;
        }

        let view = total_node();
        let subscription = view.subscribe(Rc::new(|| {}));
        self.pins.borrow_mut().insert(stat.clone(), Pin { view, subscription });
        self.registered.borrow_mut().push(stat.clone());
        debug!(stat = %stat, ?registration, "explicitly registered stat pinned");
        self.changed.raise();
    }

    /// React to a stat graph being removed.
    pub(crate) fn on_stat_removed(&self, stat: &Stat) {
        let Some(pin) = self.pins.borrow_mut().remove(stat) else {
            return;
        };
        pin.view.unsubscribe(pin.subscription);
        self.registered.borrow_mut().retain(|registered| registered != stat);
        self.changed.raise();
    }

    pub(crate) fn is_pinned(&self, stat: &Stat) -> bool {
        self.pins.borrow().contains_key(stat)
    }

    /// Whether nothing but the registry holds a node.
    ///
    /// True if the node has no subscribers at all, or if it is the pinned
    /// total node of a registered stat and the pin is its only subscriber.
    pub(crate) fn can_be_removed(&self, stat: &Stat, node_type: NodeType, subscriber_count: usize) -> bool {
        if subscriber_count == 0 {
            return true;
        }
        node_type == NodeType::Total && self.is_pinned(stat) && subscriber_count <= 1
    }

    /// Registered stats that currently have a graph, in registration order.
    pub(crate) fn explicitly_registered_stats(&self) -> Vec<Stat> {
        self.registered.borrow().clone()
    }

    pub(crate) fn subscribe(&self, handler: Handler) -> SubscriptionId {
        self.changed.subscribe(handler)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.changed.unsubscribe(id)
    }

    /// Drop every pin.
    pub(crate) fn clear(&self) {
        for (_, pin) in self.pins.borrow_mut().drain() {
            pin.view.unsubscribe(pin.subscription);
        }
        self.registered.borrow_mut().clear();
        self.changed.clear();
    }
}

impl SuspendableEvents for StatRegistry {
    fn suspend_events(&self) {
        self.changed.suspend();
    }

    fn resume_events(&self) {
        if self.changed.resume() && self.changed.has_subscribers() {
            self.changed.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeEntry, ValueNode, ViewKind};
    use crate::stat::{Entity, ExplicitRegistrationType, StatDefinition, StatFactory};
    use crate::value::Value;
    use std::cell::Cell;

    fn total_entry() -> NodeEntry<CachingNode> {
        NodeEntry::new(CachingNode::new(ValueNode::detached(Box::new(Value::from(1.0)), "Total")))
    }

    #[test]
    fn test_registered_stats_are_pinned() {
        let mut factory = StatFactory::new();
        let life = factory
            .intern(StatDefinition::new("Life", Entity::Character).explicitly_registered(ExplicitRegistrationType::Displayed))
            .unwrap();
        let registry = StatRegistry::new();
        let entry = total_entry();

        registry.on_stat_added(&life, || entry.view(ViewKind::Suspendable));
        assert_eq!(entry.subscriber_count(), 1);
        assert_eq!(registry.explicitly_registered_stats(), vec![life.clone()]);
        assert!(registry.can_be_removed(&life, NodeType::Total, 1));
        assert!(!registry.can_be_removed(&life, NodeType::Total, 2));
        assert!(!registry.can_be_removed(&life, NodeType::Subtotal, 1));

        registry.on_stat_removed(&life);
        assert_eq!(entry.subscriber_count(), 0);
        assert!(registry.explicitly_registered_stats().is_empty());
    }

    #[test]
    fn test_unregistered_stats_are_ignored() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let registry = StatRegistry::new();
        let requested = Cell::new(false);

        registry.on_stat_added(&str_stat, || {
            requested.set(true);
            total_entry().view(ViewKind::Suspendable)
        });
        assert!(!requested.get());
        assert!(!registry.is_pinned(&str_stat));
        assert!(registry.can_be_removed(&str_stat, NodeType::Total, 0));
        assert!(!registry.can_be_removed(&str_stat, NodeType::Total, 1));
    }

    #[test]
    fn test_change_is_deferred_while_suspended() {
        let mut factory = StatFactory::new();
        let level = factory
            .intern(
                StatDefinition::new("Level", Entity::Character)
                    .explicitly_registered(ExplicitRegistrationType::UserSpecifiedValue),
            )
            .unwrap();
        let registry = StatRegistry::new();
        let fired = Rc::new(Cell::new(0));
        let handler_fired = Rc::clone(&fired);
        registry.subscribe(Rc::new(move || handler_fired.set(handler_fired.get() + 1)));
        let entry = total_entry();

        registry.suspend_events();
        registry.on_stat_added(&level, || entry.view(ViewKind::Suspendable));
        assert_eq!(fired.get(), 0);
        registry.resume_events();
        assert_eq!(fired.get(), 1);
    }
}
