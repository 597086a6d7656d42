//! Modifier and path collections.
//!
//! A [`ModifierNodeCollection`] holds the value nodes of all active modifiers
//! of one form on one path of one stat. A [`PathDefinitionCollection`] holds
//! the calculation paths of one stat. Both are multisets and both notify
//! their subscribers when their content changes.

use crate::event::{Event, SubscriptionId, SuspendableEvent};
use crate::modifier::Modifier;
use crate::node::{CachingNode, CountedView, Notifier, Observable, View};
use crate::node_type::PathDefinition;
use crate::node_value::NodeValue;
use crate::suspension::SuspendableEvents;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Read access to the modifiers of one form on one path.
pub trait FormNodeCollection: Observable {
    /// Active modifiers in insertion order.
    fn modifiers(&self) -> Vec<Modifier>;

    /// Values of the active modifiers in insertion order.
    fn values(&self) -> Vec<Option<NodeValue>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read access to the calculation paths of one stat.
pub trait PathCollection: Observable {
    /// All paths, main path first.
    fn paths(&self) -> Vec<PathDefinition>;
}

struct Item {
    modifier: Modifier,
    node: Rc<CachingNode>,
    subscription: SubscriptionId,
}

/// The value nodes of the active modifiers of one form on one path.
///
/// The collection fires when a modifier is added or removed, or when the
/// value of a member changes.
pub struct ModifierNodeCollection {
    items: RefCell<Vec<Item>>,
    change_received: Event,
    value_changed: SuspendableEvent,
    modifiers_before: RefCell<Vec<Modifier>>,
    item_changed: Cell<bool>,
    disposed: Cell<bool>,
    self_weak: Weak<ModifierNodeCollection>,
}

impl ModifierNodeCollection {
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            items: RefCell::new(Vec::new()),
            change_received: Event::new(),
            value_changed: SuspendableEvent::new(),
            modifiers_before: RefCell::new(Vec::new()),
            item_changed: Cell::new(false),
            disposed: Cell::new(false),
            self_weak: self_weak.clone(),
        })
    }

    /// Add a modifier's value node.
    pub fn add(&self, modifier: Modifier, node: Rc<CachingNode>) {
        let collection = self.self_weak.clone();
        let subscription = node.change_received().subscribe(Rc::new(move || {
            if let Some(collection) = collection.upgrade() {
                collection.on_item_changed();
            }
        }));
        self.items.borrow_mut().push(Item {
            modifier,
            node,
            subscription,
        });
        self.raise();
    }

    /// Remove exactly `node`, searching from the most recently added entry.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not part of this collection.
    pub fn remove(&self, node: &Rc<CachingNode>) -> Modifier {
        let item = {
            let mut items = self.items.borrow_mut();
            let index = items
                .iter()
                .rposition(|item| Rc::ptr_eq(&item.node, node))
                .unwrap_or_else(|| panic!("modifier node {} is not part of this collection", node.label()));
            items.remove(index)
        };
        item.node.change_received().unsubscribe(item.subscription);
        self.raise();
        item.modifier
    }

    pub fn modifiers(&self) -> Vec<Modifier> {
        self.items.borrow().iter().map(|item| item.modifier.clone()).collect()
    }

    pub fn nodes(&self) -> Vec<Rc<CachingNode>> {
        self.items.borrow().iter().map(|item| Rc::clone(&item.node)).collect()
    }

    /// Values of all members. Member nodes are evaluated outside of any
    /// borrow of the collection.
    pub fn values(&self) -> Vec<Option<NodeValue>> {
        self.nodes().iter().map(|node| node.value()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn on_item_changed(&self) {
        self.item_changed.set(true);
        self.raise();
    }

    fn raise(&self) {
        self.change_received.raise();
        self.value_changed.raise();
    }

    /// Dispose every member node and drop all subscriptions.
    ///
    /// # Panics
    ///
    /// Panics if the collection was already disposed.
    pub fn dispose(&self) {
        assert!(!self.disposed.replace(true), "modifier collection disposed twice");
        for item in self.items.take() {
            item.node.change_received().unsubscribe(item.subscription);
            item.node.dispose();
        }
        self.change_received.clear();
        self.value_changed.clear();
    }
}

impl Notifier for ModifierNodeCollection {
    fn change_received(&self) -> &Event {
        &self.change_received
    }

    fn value_changed(&self) -> &SuspendableEvent {
        &self.value_changed
    }
}

impl SuspendableEvents for ModifierNodeCollection {
    fn suspend_events(&self) {
        if !self.value_changed.is_suspended() {
            *self.modifiers_before.borrow_mut() = self.modifiers();
            self.item_changed.set(false);
        }
        self.value_changed.suspend();
    }

    fn resume_events(&self) {
        let pending = self.value_changed.resume();
        if self.value_changed.is_suspended() {
            return;
        }
        let modifiers_before = self.modifiers_before.take();
        let item_changed = self.item_changed.replace(false);
        if !pending || self.disposed.get() || !self.value_changed.has_subscribers() {
            return;
        }
        // Value-equal modifiers share a value, so the modifier lists decide
        // whether the members changed.
        if item_changed || modifiers_before != self.modifiers() {
            self.value_changed.fire();
        }
    }
}

impl fmt::Debug for ModifierNodeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifierNodeCollection")
            .field("modifiers", &self.modifiers())
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

impl FormNodeCollection for View<ModifierNodeCollection> {
    fn modifiers(&self) -> Vec<Modifier> {
        self.target().modifiers()
    }

    fn values(&self) -> Vec<Option<NodeValue>> {
        self.target().values()
    }

    fn len(&self) -> usize {
        self.target().len()
    }
}

impl FormNodeCollection for CountedView<ModifierNodeCollection> {
    fn modifiers(&self) -> Vec<Modifier> {
        self.inner().modifiers()
    }

    fn values(&self) -> Vec<Option<NodeValue>> {
        self.inner().values()
    }

    fn len(&self) -> usize {
        FormNodeCollection::len(self.inner())
    }
}

/// The calculation paths of one stat, as a multiset.
///
/// The main path is always present and is not counted.
pub struct PathDefinitionCollection {
    counts: RefCell<BTreeMap<PathDefinition, usize>>,
    change_received: Event,
    value_changed: SuspendableEvent,
    paths_before: RefCell<Vec<PathDefinition>>,
}

impl PathDefinitionCollection {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            counts: RefCell::new(BTreeMap::new()),
            change_received: Event::new(),
            value_changed: SuspendableEvent::new(),
            paths_before: RefCell::new(Vec::new()),
        })
    }

    pub fn add(&self, path: PathDefinition) {
        if path.is_main() {
            return;
        }
        let appeared = {
            let mut counts = self.counts.borrow_mut();
            let count = counts.entry(path).or_insert(0);
            *count += 1;
            *count == 1
        };
        if appeared {
            self.raise();
        }
    }

    /// # Panics
    ///
    /// Panics if `path` was never added.
    pub fn remove(&self, path: &PathDefinition) {
        if path.is_main() {
            return;
        }
        let disappeared = {
            let mut counts = self.counts.borrow_mut();
            let count = counts
                .get_mut(path)
                .unwrap_or_else(|| panic!("path {} is not part of this collection", path));
            *count -= 1;
            if *count == 0 {
                counts.remove(path);
                true
            } else {
                false
            }
        };
        if disappeared {
            self.raise();
        }
    }

    pub fn paths(&self) -> Vec<PathDefinition> {
        std::iter::once(PathDefinition::main())
            .chain(self.counts.borrow().keys().cloned())
            .collect()
    }

    fn raise(&self) {
        self.change_received.raise();
        self.value_changed.raise();
    }

    pub fn dispose(&self) {
        self.counts.borrow_mut().clear();
        self.change_received.clear();
        self.value_changed.clear();
    }
}

impl Notifier for PathDefinitionCollection {
    fn change_received(&self) -> &Event {
        &self.change_received
    }

    fn value_changed(&self) -> &SuspendableEvent {
        &self.value_changed
    }
}

impl SuspendableEvents for PathDefinitionCollection {
    fn suspend_events(&self) {
        if !self.value_changed.is_suspended() {
            *self.paths_before.borrow_mut() = self.paths();
        }
        self.value_changed.suspend();
    }

    fn resume_events(&self) {
        let pending = self.value_changed.resume();
        if self.value_changed.is_suspended() {
            return;
        }
        let paths_before = self.paths_before.take();
        if pending && self.value_changed.has_subscribers() && paths_before != self.paths() {
            self.value_changed.fire();
        }
    }
}

impl fmt::Debug for PathDefinitionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathDefinitionCollection")
            .field("paths", &self.paths())
            .finish()
    }
}

impl PathCollection for View<PathDefinitionCollection> {
    fn paths(&self) -> Vec<PathDefinition> {
        self.target().paths()
    }
}

impl PathCollection for CountedView<PathDefinitionCollection> {
    fn paths(&self) -> Vec<PathDefinition> {
        self.inner().paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Handler;
    use crate::modifier::{Form, ModifierSource};
    use crate::node::ValueNode;
    use crate::stat::{Entity, StatFactory};
    use crate::value::Value;

    fn modifier(value: f64) -> (Modifier, Rc<CachingNode>) {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let modifier = Modifier::new([str_stat], Form::BaseAdd, Value::from(value), ModifierSource::Global).unwrap();
        let node = CachingNode::new(ValueNode::detached(Box::new(modifier.value().clone()), "Str BaseAdd"));
        (modifier, node)
    }

    fn counting_handler() -> (Rc<Cell<u32>>, Handler) {
        let count = Rc::new(Cell::new(0));
        let handler_count = Rc::clone(&count);
        (count, Rc::new(move || handler_count.set(handler_count.get() + 1)))
    }

    #[test]
    fn test_collection_multiset() {
        let collection = ModifierNodeCollection::new();
        let (m1, n1) = modifier(10.0);
        let (m2, n2) = modifier(10.0);
        collection.add(m1.clone(), Rc::clone(&n1));
        collection.add(m2, Rc::clone(&n2));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.values(), vec![Some(NodeValue::from(10.0)); 2]);

        assert_eq!(collection.remove(&n2), m1);
        assert_eq!(collection.nodes().len(), 1);
        assert!(Rc::ptr_eq(&collection.nodes()[0], &n1));
    }

    #[test]
    #[should_panic(expected = "is not part of this collection")]
    fn test_remove_unknown_node_panics() {
        let collection = ModifierNodeCollection::new();
        let (_, node) = modifier(1.0);
        collection.remove(&node);
    }

    #[test]
    fn test_collection_fires_on_membership_change() {
        let collection = ModifierNodeCollection::new();
        let (count, handler) = counting_handler();
        collection.value_changed().subscribe(handler);

        collection.suspend_events();
        let (m, n) = modifier(3.0);
        collection.add(m.clone(), Rc::clone(&n));
        collection.add(m, n);
        assert_eq!(count.get(), 0);
        collection.resume_events();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_collection_silent_when_membership_restored() {
        let collection = ModifierNodeCollection::new();
        let (count, handler) = counting_handler();
        collection.value_changed().subscribe(handler);

        collection.suspend_events();
        let (m, n) = modifier(3.0);
        collection.add(m, Rc::clone(&n));
        collection.remove(&n);
        collection.resume_events();
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_collection_fires_when_a_member_is_replaced() {
        let collection = ModifierNodeCollection::new();
        let (old_modifier, old_node) = modifier(5.0);
        collection.add(old_modifier, Rc::clone(&old_node));
        let (count, handler) = counting_handler();
        collection.value_changed().subscribe(handler);

        collection.suspend_events();
        collection.remove(&old_node);
        drop(old_node);
        let (new_modifier, new_node) = modifier(7.0);
        collection.add(new_modifier, new_node);
        collection.resume_events();

        assert_eq!(count.get(), 1);
        assert_eq!(collection.values(), vec![Some(NodeValue::from(7.0))]);
    }

    #[test]
    fn test_paths_are_counted() {
        let paths = PathDefinitionCollection::new();
        let weapon = ModifierSource::local("Weapon").path();
        let (count, handler) = counting_handler();
        paths.change_received().subscribe(handler);

        paths.add(weapon.clone());
        paths.add(weapon.clone());
        paths.add(PathDefinition::main());
        assert_eq!(paths.paths(), vec![PathDefinition::main(), weapon.clone()]);
        assert_eq!(count.get(), 1);

        paths.remove(&weapon);
        assert_eq!(paths.paths().len(), 2);
        paths.remove(&weapon);
        assert_eq!(paths.paths(), vec![PathDefinition::main()]);
        assert_eq!(count.get(), 2);
    }

    #[test]
    #[should_panic(expected = "is not part of this collection")]
    fn test_remove_unknown_path_panics() {
        PathDefinitionCollection::new().remove(&ModifierSource::local("Ring").path());
    }
}
