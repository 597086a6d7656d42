//! The public entry point.
//!
//! A [`Calculator`] owns the calculation graph. Consumers feed it batches of
//! added and removed modifiers through [`Calculator::update`] and read stat
//! values through a [`NodeRepository`]. Values are calculated lazily and
//! cached until one of their inputs changes.

use crate::breakdown::StatBreakdown;
use crate::config::CalculatorConfig;
use crate::engine::Engine;
use crate::event::{Handler, SubscriptionId};
use crate::modifier::Modifier;
use crate::node::ViewKind;
use crate::node_type::{NodeSelector, NodeType};
use crate::pruner::PruneReport;
use crate::repository::NodeRepository;
use crate::stat::Stat;
use crate::suspension::SuspendableEvents;
use std::rc::Rc;
use tracing::{debug, debug_span};

/// A batch of modifier changes.
///
/// Both lists may contain value-equal modifiers; each entry adds or removes
/// one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatorUpdate {
    pub added: Vec<Modifier>,
    pub removed: Vec<Modifier>,
}

impl CalculatorUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style add.
    pub fn add(mut self, modifier: Modifier) -> Self {
        self.added.push(modifier);
        self
    }

    /// Builder-style remove.
    pub fn remove(mut self, modifier: Modifier) -> Self {
        self.removed.push(modifier);
        self
    }

    /// An update adding all of `modifiers`.
    pub fn adding(modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            added: modifiers.into_iter().collect(),
            removed: Vec::new(),
        }
    }

    /// An update removing all of `modifiers`.
    pub fn removing(modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        Self {
            added: Vec::new(),
            removed: modifiers.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// The update that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            added: self.removed.clone(),
            removed: self.added.clone(),
        }
    }
}

/// Incremental stat calculator.
///
/// # Examples
///
/// ```rust
/// use statgraph::{CalculationNode, Calculator, CalculatorUpdate, Form, Modifier, ModifierSource, NodeType, NodeValue, Value};
/// use statgraph::node::Observable;
/// use statgraph::stat::{Entity, StatFactory};
/// use std::rc::Rc;
///
/// let mut factory = StatFactory::new();
/// let life = factory.stat("Life", Entity::Character);
///
/// let mut calculator = Calculator::new();
/// let base = Modifier::new([life.clone()], Form::BaseAdd, Value::from(40.0), ModifierSource::Global).unwrap();
/// calculator.update(CalculatorUpdate::new().add(base.clone()));
///
/// let total = calculator.node_repository().get_node(Some(&life), NodeType::Total);
/// // Unobserved nodes are released after every update.
/// total.subscribe(Rc::new(|| {}));
/// assert_eq!(total.value(), Some(NodeValue::from(40.0)));
///
/// calculator.update(CalculatorUpdate::new().remove(base));
/// assert_eq!(total.value(), None);
/// ```
pub struct Calculator {
    engine: Rc<Engine>,
    config: CalculatorConfig,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    pub fn new() -> Self {
        Self::with_config(CalculatorConfig::default())
    }

    pub fn with_config(config: CalculatorConfig) -> Self {
        Self {
            engine: Engine::new(),
            config,
        }
    }

    pub fn config(&self) -> &CalculatorConfig {
        &self.config
    }

    /// Apply a batch of modifier changes.
    ///
    /// Notifications of the suspension-aware repository are deferred until
    /// the whole batch is applied, so subscribers never observe a partially
    /// applied update. Removals are applied before additions. Removing a
    /// modifier that is not active is a no-op.
    ///
    /// Returns what the closing prune released; empty when pruning after
    /// updates is disabled.
    pub fn update(&mut self, update: CalculatorUpdate) -> PruneReport {
        let span = debug_span!("update", added = update.added.len(), removed = update.removed.len());
        let _enter = span.enter();

        self.engine.suspend_events();
        for modifier in &update.removed {
            self.engine.remove_modifier(modifier);
        }
        for modifier in &update.added {
            self.engine.add_modifier(modifier);
        }
        let report = if self.config.prune_after_update {
            self.engine.prune()
        } else {
            PruneReport::default()
        };
        self.engine.resume_events();

        debug!(stats = self.engine.graph().len(), "update applied");
        report
    }

    /// Nodes that notify once per update, after the whole batch is applied.
    pub fn node_repository(&self) -> NodeRepository {
        NodeRepository::new(Rc::clone(&self.engine), ViewKind::Suspendable)
    }

    /// Nodes that notify synchronously as soon as they are invalidated, even
    /// in the middle of an update. Handlers must not read values or fetch
    /// nodes.
    pub fn default_node_repository(&self) -> NodeRepository {
        NodeRepository::new(Rc::clone(&self.engine), ViewKind::Default)
    }

    /// Stats with an explicit registration type that currently have a graph,
    /// in the order they appeared.
    pub fn explicitly_registered_stats(&self) -> Vec<Stat> {
        self.engine.registry().explicitly_registered_stats()
    }

    /// Be notified when [`explicitly_registered_stats`] changes. Changes made
    /// during an update are reported once, at its end.
    ///
    /// [`explicitly_registered_stats`]: Calculator::explicitly_registered_stats
    pub fn subscribe_explicitly_registered_stats(&self, handler: Handler) -> SubscriptionId {
        self.engine.registry().subscribe(handler)
    }

    pub fn unsubscribe_explicitly_registered_stats(&self, id: SubscriptionId) -> bool {
        self.engine.registry().unsubscribe(id)
    }

    /// Every stat that currently has a graph, sorted.
    pub fn live_stats(&self) -> Vec<Stat> {
        let mut stats = self.engine.graph().stats();
        stats.sort();
        stats
    }

    pub fn is_live(&self, stat: &Stat) -> bool {
        self.engine.graph().contains(stat)
    }

    /// Release unused graph state now.
    ///
    /// Only needed when [`CalculatorConfig::prune_after_update`] is off.
    pub fn prune(&mut self) -> PruneReport {
        self.engine.suspend_events();
        let report = self.engine.prune();
        self.engine.resume_events();
        report
    }

    /// Whether the main-path node of a stage is held by nothing except the
    /// calculator itself. Nodes that do not exist can always be removed.
    pub fn can_be_removed(&self, stat: &Stat, node_type: NodeType) -> bool {
        let count = self
            .engine
            .graph()
            .get(stat)
            .and_then(|stat_graph| stat_graph.node(&NodeSelector::main(node_type)).map(|entry| entry.subscriber_count()))
            .unwrap_or(0);
        self.engine.registry().can_be_removed(stat, node_type, count)
    }

    /// Snapshot how a stat's total is calculated.
    ///
    /// Reading creates the stat's nodes if needed; they are released again
    /// by the next prune unless something subscribes to them.
    pub fn breakdown(&self, stat: &Stat) -> StatBreakdown {
        let order = self.engine.topology().evaluation_order().to_vec();
        StatBreakdown::collect(&self.node_repository(), stat, &order)
    }
}

impl Drop for Calculator {
    fn drop(&mut self) {
        self.engine.dispose();
    }
}
