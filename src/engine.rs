//! The calculation engine.
//!
//! [`Engine`] owns the calculation graph, the suspension depth, the stat
//! registry and the stage topology. It is the single place nodes and
//! collections are created, so it can start them suspended during a batch
//! and tell the registry about new stats.
//!
//! Borrows of the graph are never held while a node is evaluated or a
//! consumer handler runs.

use crate::collection::{ModifierNodeCollection, PathDefinitionCollection};
use crate::context::CalculationContext;
use crate::graph::CalculationGraph;
use crate::modifier::{Form, Modifier};
use crate::node::{observable_key, CachingNode, CountedView, Observable, ValueNode, ViewKind};
use crate::node_type::{FormNodeSelector, NodeSelector, NodeType, PathDefinition};
use crate::node_value::NodeValue;
use crate::pruner::{self, PruneReport};
use crate::registry::StatRegistry;
use crate::stage::{StageTopology, StageValue};
use crate::stat::Stat;
use crate::suspension::{SuspendableEvents, SuspendableEventsComposite};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

pub(crate) struct Engine {
    graph: RefCell<CalculationGraph>,
    suspension_depth: Cell<u32>,
    registry: Rc<StatRegistry>,
    topology: StageTopology,
    self_weak: Weak<Engine>,
}

impl Engine {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new_cyclic(|self_weak| Self {
            graph: RefCell::new(CalculationGraph::new()),
            suspension_depth: Cell::new(0),
            registry: Rc::new(StatRegistry::new()),
            topology: StageTopology::new(),
            self_weak: self_weak.clone(),
        })
    }

    pub(crate) fn registry(&self) -> &Rc<StatRegistry> {
        &self.registry
    }

    pub(crate) fn topology(&self) -> &StageTopology {
        &self.topology
    }

    pub(crate) fn graph(&self) -> Ref<'_, CalculationGraph> {
        self.graph.borrow()
    }

    pub(crate) fn graph_mut(&self) -> RefMut<'_, CalculationGraph> {
        self.graph.borrow_mut()
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspension_depth.get() > 0
    }

    /// Fetch or create the node of one stage of `stat`.
    pub(crate) fn node(&self, stat: &Stat, selector: NodeSelector, kind: ViewKind) -> Rc<CountedView<CachingNode>> {
        let (view, stat_created) = {
            let suspended = self.is_suspended();
            let mut graph = self.graph.borrow_mut();
            let (stat_graph, stat_created) = graph.get_or_add(stat, suspended);
            let view = match stat_graph.node(&selector) {
                Some(entry) => entry.view(kind),
                None => {
                    let label = format!("{} {}", stat, selector);
                    trace!(node = %label, suspended, "creating stage node");
                    let stage = StageValue::new(stat.clone(), selector.clone());
                    let node = CachingNode::new(ValueNode::new(Box::new(stage), label, self.self_weak.clone()));
                    if suspended {
                        node.suspend_events();
                    }
                    stat_graph.insert_node(selector, node).view(kind)
                }
            };
            (view, stat_created)
        };
        if stat_created {
            self.stat_added(stat);
        }
        view
    }

    /// Fetch or create the collection of one form on one path of `stat`.
    pub(crate) fn form_collection(
        &self,
        stat: &Stat,
        selector: FormNodeSelector,
        kind: ViewKind,
    ) -> Rc<CountedView<ModifierNodeCollection>> {
        let (view, stat_created) = {
            let suspended = self.is_suspended();
            let mut graph = self.graph.borrow_mut();
            let (stat_graph, stat_created) = graph.get_or_add(stat, suspended);
            let view = match stat_graph.form_collection(&selector) {
                Some(entry) => entry.view(kind),
                None => stat_graph.get_or_add_form_collection(selector, suspended).view(kind),
            };
            (view, stat_created)
        };
        if stat_created {
            self.stat_added(stat);
        }
        view
    }

    /// Fetch the path collection of `stat`, creating its graph if needed.
    pub(crate) fn paths(&self, stat: &Stat, kind: ViewKind) -> Rc<CountedView<PathDefinitionCollection>> {
        let (view, stat_created) = {
            let mut graph = self.graph.borrow_mut();
            let (stat_graph, stat_created) = graph.get_or_add(stat, self.is_suspended());
            (stat_graph.paths().view(kind), stat_created)
        };
        if stat_created {
            self.stat_added(stat);
        }
        view
    }

    fn stat_added(&self, stat: &Stat) {
        trace!(stat = %stat, "stat graph created");
        self.registry
            .on_stat_added(stat, || self.node(stat, NodeSelector::main(NodeType::Total), ViewKind::Suspendable));
    }

    pub(crate) fn add_modifier(&self, modifier: &Modifier) {
        let created = {
            let suspended = self.is_suspended();
            let engine = self.self_weak.clone();
            self.graph.borrow_mut().add_modifier(modifier, suspended, |stat| {
                let label = format!("{} {} {}", stat, modifier.form(), modifier.value());
                CachingNode::new(ValueNode::new(Box::new(modifier.value().clone()), label, engine.clone()))
            })
        };
        for stat in created {
            self.stat_added(&stat);
        }
    }

    /// Remove one instance of `modifier`. Unknown modifiers are ignored.
    pub(crate) fn remove_modifier(&self, modifier: &Modifier) {
        if !self.graph.borrow_mut().remove_modifier(modifier) {
            debug!(modifier = %modifier, "ignoring removal of an inactive modifier");
        }
    }

    fn suspenders(&self) -> SuspendableEventsComposite {
        let mut composite = self.graph.borrow().suspenders();
        composite.add(Rc::clone(&self.registry) as Rc<dyn SuspendableEvents>);
        composite
    }

    pub(crate) fn prune(&self) -> PruneReport {
        pruner::prune(self)
    }

    /// Dispose every node and release every pin.
    pub(crate) fn dispose(&self) {
        self.registry.clear();
        self.graph.borrow_mut().dispose();
    }
}

impl SuspendableEvents for Engine {
    /// Only the outermost suspension reaches the graph. Members created
    /// while suspended start suspended.
    fn suspend_events(&self) {
        let depth = self.suspension_depth.get();
        self.suspension_depth.set(depth + 1);
        if depth == 0 {
            self.suspenders().suspend_events();
        }
    }

    /// Members are collected again on resume, so everything created during
    /// the batch is resumed and everything pruned is skipped.
    fn resume_events(&self) {
        let depth = self.suspension_depth.get();
        assert!(depth > 0, "resume without matching suspend");
        self.suspension_depth.set(depth - 1);
        if depth == 1 {
            self.suspenders().resume_events();
        }
    }
}

/// A context that resolves reads through the engine and remembers what was
/// read, so the reading node can subscribe to it.
pub(crate) struct TrackingContext<'a> {
    engine: &'a Engine,
    used: RefCell<Vec<Rc<dyn Observable>>>,
}

impl<'a> TrackingContext<'a> {
    pub(crate) fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            used: RefCell::new(Vec::new()),
        }
    }

    /// Everything read, without duplicates, in first-read order.
    pub(crate) fn into_dependencies(self) -> Vec<Rc<dyn Observable>> {
        let mut dependencies: Vec<Rc<dyn Observable>> = Vec::new();
        for used in self.used.into_inner() {
            let key = observable_key(&used);
            if !dependencies.iter().any(|dependency| observable_key(dependency) == key) {
                dependencies.push(used);
            }
        }
        dependencies
    }

    fn record(&self, used: Rc<dyn Observable>) {
        self.used.borrow_mut().push(used);
    }
}

impl CalculationContext for TrackingContext<'_> {
    fn get_value(&self, stat: &Stat, node_type: NodeType, path: &PathDefinition) -> Option<NodeValue> {
        let node = self
            .engine
            .node(stat, NodeSelector::new(node_type, path.clone()), ViewKind::Default);
        self.record(Rc::clone(&node) as Rc<dyn Observable>);
        node.inner().target().value()
    }

    fn get_values(&self, form: Form, stat: &Stat, path: &PathDefinition) -> Vec<Option<NodeValue>> {
        let collection = self
            .engine
            .form_collection(stat, FormNodeSelector::new(form, path.clone()), ViewKind::Default);
        self.record(Rc::clone(&collection) as Rc<dyn Observable>);
        collection.inner().target().values()
    }

    fn get_paths(&self, stat: &Stat) -> Vec<PathDefinition> {
        let paths = self.engine.paths(stat, ViewKind::Default);
        self.record(Rc::clone(&paths) as Rc<dyn Observable>);
        paths.inner().target().paths()
    }
}
