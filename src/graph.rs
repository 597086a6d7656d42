//! Per-stat graphs and the calculation graph.
//!
//! A [`StatGraph`] owns the live nodes and modifier collections of one stat.
//! The [`CalculationGraph`] owns all stat graphs plus, for every active
//! modifier, a LIFO stack of the value nodes it created. Value-equal
//! modifiers are a multiset: adding one twice needs two removals, and each
//! removal pops the most recently added instance.

use crate::collection::{ModifierNodeCollection, PathDefinitionCollection};
use crate::modifier::Modifier;
use crate::node::{CachingNode, NodeEntry};
use crate::node_type::{FormNodeSelector, NodeSelector};
use crate::stat::Stat;
use crate::suspension::{SuspendableEvents, SuspendableEventsComposite};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// The live nodes and collections of one stat.
pub(crate) struct StatGraph {
    stat: Stat,
    nodes: BTreeMap<NodeSelector, NodeEntry<CachingNode>>,
    form_collections: BTreeMap<FormNodeSelector, NodeEntry<ModifierNodeCollection>>,
    paths: NodeEntry<PathDefinitionCollection>,
    modifier_count: usize,
}

impl StatGraph {
    fn new(stat: Stat, suspended: bool) -> Self {
        let paths = PathDefinitionCollection::new();
        if suspended {
            paths.suspend_events();
        }
        Self {
            stat,
            nodes: BTreeMap::new(),
            form_collections: BTreeMap::new(),
            paths: NodeEntry::new(paths),
            modifier_count: 0,
        }
    }

    pub(crate) fn stat(&self) -> &Stat {
        &self.stat
    }

    pub(crate) fn node(&self, selector: &NodeSelector) -> Option<&NodeEntry<CachingNode>> {
        self.nodes.get(selector)
    }

    /// Insert a freshly created node. The caller suspends it first if a
    /// batch is running.
    pub(crate) fn insert_node(&mut self, selector: NodeSelector, node: Rc<CachingNode>) -> &NodeEntry<CachingNode> {
        self.nodes.entry(selector).or_insert_with(|| NodeEntry::new(node))
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (&NodeSelector, &NodeEntry<CachingNode>)> {
        self.nodes.iter()
    }

    pub(crate) fn form_collection(&self, selector: &FormNodeSelector) -> Option<&NodeEntry<ModifierNodeCollection>> {
        self.form_collections.get(selector)
    }

    pub(crate) fn get_or_add_form_collection(
        &mut self,
        selector: FormNodeSelector,
        suspended: bool,
    ) -> &NodeEntry<ModifierNodeCollection> {
        self.form_collections.entry(selector).or_insert_with(|| {
            let collection = ModifierNodeCollection::new();
            if suspended {
                collection.suspend_events();
            }
            NodeEntry::new(collection)
        })
    }

    pub(crate) fn form_collections(
        &self,
    ) -> impl Iterator<Item = (&FormNodeSelector, &NodeEntry<ModifierNodeCollection>)> {
        self.form_collections.iter()
    }

    pub(crate) fn paths(&self) -> &NodeEntry<PathDefinitionCollection> {
        &self.paths
    }

    pub(crate) fn modifier_count(&self) -> usize {
        self.modifier_count
    }

    /// Insert a modifier's value node into its form collection.
    pub(crate) fn add_modifier(&mut self, modifier: &Modifier, node: Rc<CachingNode>, suspended: bool) {
        let path = modifier.path();
        let selector = FormNodeSelector::new(modifier.form(), path.clone());
        self.get_or_add_form_collection(selector, suspended)
            .target()
            .add(modifier.clone(), node);
        if modifier.form().defines_path() {
            self.paths.target().add(path);
        }
        self.modifier_count += 1;
    }

    /// Remove and dispose exactly `node`.
    ///
    /// # Panics
    ///
    /// Panics if the modifier's collection is missing, if `node` is not part
    /// of it, or if the stat has no modifiers left to remove.
    pub(crate) fn remove_modifier(&mut self, modifier: &Modifier, node: &Rc<CachingNode>) {
        let path = modifier.path();
        let selector = FormNodeSelector::new(modifier.form(), path.clone());
        let collection = self
            .form_collections
            .get(&selector)
            .unwrap_or_else(|| panic!("no {} collection on {} for a tracked modifier", selector, self.stat));
        collection.target().remove(node);
        node.dispose();
        if modifier.form().defines_path() {
            self.paths.target().remove(&path);
        }
        self.modifier_count = self
            .modifier_count
            .checked_sub(1)
            .unwrap_or_else(|| panic!("modifier count of {} went negative", self.stat));
    }

    /// Dispose and drop a node. Returns `false` if there was none.
    pub(crate) fn remove_node(&mut self, selector: &NodeSelector) -> bool {
        match self.nodes.remove(selector) {
            Some(entry) => {
                entry.target().dispose();
                true
            }
            None => false,
        }
    }

    /// Dispose and drop a modifier collection. Returns `false` if there was none.
    pub(crate) fn remove_form_node_collection(&mut self, selector: &FormNodeSelector) -> bool {
        match self.form_collections.remove(selector) {
            Some(entry) => {
                entry.target().dispose();
                true
            }
            None => false,
        }
    }

    /// Whether nothing in this graph is live any more.
    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.form_collections.is_empty()
            && self.modifier_count == 0
            && self.paths.subscriber_count() == 0
    }

    /// Everything in this graph that can suspend its notifications.
    pub(crate) fn suspenders(&self) -> SuspendableEventsComposite {
        let mut composite = SuspendableEventsComposite::new();
        for entry in self.nodes.values() {
            composite.add(Rc::clone(entry.target()) as Rc<dyn SuspendableEvents>);
        }
        for entry in self.form_collections.values() {
            composite.add(Rc::clone(entry.target()) as Rc<dyn SuspendableEvents>);
        }
        composite.add(Rc::clone(self.paths.target()) as Rc<dyn SuspendableEvents>);
        composite
    }

    pub(crate) fn dispose(&mut self) {
        for (_, entry) in std::mem::take(&mut self.nodes) {
            entry.target().dispose();
        }
        for (_, entry) in std::mem::take(&mut self.form_collections) {
            entry.target().dispose();
        }
        self.paths.target().dispose();
    }
}

/// The nodes one addition of a modifier created, one per target stat.
type ModifierNodes = Vec<(Stat, Rc<CachingNode>)>;

/// All live stat graphs and the per-modifier LIFO stacks.
#[derive(Default)]
pub(crate) struct CalculationGraph {
    stat_graphs: HashMap<Stat, StatGraph>,
    modifier_nodes: HashMap<Modifier, Vec<ModifierNodes>>,
}

impl CalculationGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fetch or create a stat's graph. The flag is `true` if it was created.
    pub(crate) fn get_or_add(&mut self, stat: &Stat, suspended: bool) -> (&mut StatGraph, bool) {
        let created = !self.stat_graphs.contains_key(stat);
        let graph = self
            .stat_graphs
            .entry(stat.clone())
            .or_insert_with(|| StatGraph::new(stat.clone(), suspended));
        (graph, created)
    }

    pub(crate) fn get(&self, stat: &Stat) -> Option<&StatGraph> {
        self.stat_graphs.get(stat)
    }

    pub(crate) fn get_mut(&mut self, stat: &Stat) -> Option<&mut StatGraph> {
        self.stat_graphs.get_mut(stat)
    }

    /// Drop an empty stat graph.
    pub(crate) fn remove(&mut self, stat: &Stat) -> Option<StatGraph> {
        self.stat_graphs.remove(stat)
    }

    pub(crate) fn contains(&self, stat: &Stat) -> bool {
        self.stat_graphs.contains_key(stat)
    }

    pub(crate) fn stats(&self) -> Vec<Stat> {
        self.stat_graphs.keys().cloned().collect()
    }

    pub(crate) fn stat_graphs(&self) -> impl Iterator<Item = &StatGraph> {
        self.stat_graphs.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.stat_graphs.len()
    }

    /// How many instances of a value-equal modifier are active.
    pub(crate) fn modifier_instances(&self, modifier: &Modifier) -> usize {
        self.modifier_nodes.get(modifier).map_or(0, Vec::len)
    }

    /// Add one instance of `modifier` to every stat it targets.
    ///
    /// `create_node` builds the value node for one target stat. Returns the
    /// stats whose graphs had to be created.
    pub(crate) fn add_modifier(
        &mut self,
        modifier: &Modifier,
        suspended: bool,
        mut create_node: impl FnMut(&Stat) -> Rc<CachingNode>,
    ) -> Vec<Stat> {
        let mut created_stats = Vec::new();
        let mut nodes = Vec::with_capacity(modifier.stats().len());
        for stat in modifier.stats() {
            let node = create_node(stat);
            let (graph, created) = self.get_or_add(stat, suspended);
            graph.add_modifier(modifier, Rc::clone(&node), suspended);
            if created {
                created_stats.push(stat.clone());
            }
            nodes.push((stat.clone(), node));
        }
        self.modifier_nodes
            .entry(modifier.clone())
            .or_default()
            .push(nodes);
        created_stats
    }

    /// Remove the most recently added instance of `modifier`.
    ///
    /// Returns `false` if no instance is active.
    pub(crate) fn remove_modifier(&mut self, modifier: &Modifier) -> bool {
        let Some(stack) = self.modifier_nodes.get_mut(modifier) else {
            return false;
        };
        let nodes = stack.pop();
        if stack.is_empty() {
            self.modifier_nodes.remove(modifier);
        }
        let Some(nodes) = nodes else {
            return false;
        };

        for (stat, node) in nodes {
            let graph = self
                .stat_graphs
                .get_mut(&stat)
                .unwrap_or_else(|| panic!("stat graph of {} is missing for a tracked modifier", stat));
            graph.remove_modifier(modifier, &node);
        }
        true
    }

    /// Every live node and collection that can suspend its notifications.
    pub(crate) fn suspenders(&self) -> SuspendableEventsComposite {
        let mut composite = SuspendableEventsComposite::new();
        for graph in self.stat_graphs.values() {
            composite.extend(graph.suspenders());
        }
        composite
    }

    /// Dispose everything. Nodes of different stats may reference each
    /// other; disposing breaks those links.
    pub(crate) fn dispose(&mut self) {
        self.modifier_nodes.clear();
        for (_, mut graph) in self.stat_graphs.drain() {
            graph.dispose();
        }
    }
}

impl Drop for CalculationGraph {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifier::{Form, ModifierSource};
    use crate::node::ValueNode;
    use crate::node_type::PathDefinition;
    use crate::stat::{Entity, StatFactory};
    use crate::value::Value;

    fn value_node(modifier: &Modifier, stat: &Stat) -> Rc<CachingNode> {
        CachingNode::new(ValueNode::detached(
            Box::new(modifier.value().clone()),
            format!("{} {}", stat, modifier.form()),
        ))
    }

    fn base_add(stat: &Stat, value: f64, source: ModifierSource) -> Modifier {
        Modifier::new([stat.clone()], Form::BaseAdd, Value::from(value), source).unwrap()
    }

    #[test]
    fn test_add_modifier_creates_stat_graphs() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let dex = factory.stat("Dex", Entity::Character);
        let mut graph = CalculationGraph::new();
        let modifier = Modifier::new(
            [str_stat.clone(), dex.clone()],
            Form::BaseAdd,
            Value::from(10.0),
            ModifierSource::Global,
        )
        .unwrap();

        let created = graph.add_modifier(&modifier, false, |stat| value_node(&modifier, stat));
        assert_eq!(created.len(), 2);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(&str_stat).map(StatGraph::modifier_count), Some(1));

        let created = graph.add_modifier(&modifier, false, |stat| value_node(&modifier, stat));
        assert!(created.is_empty());
        assert_eq!(graph.modifier_instances(&modifier), 2);
    }

    #[test]
    fn test_remove_pops_most_recent_instance() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let mut graph = CalculationGraph::new();
        let modifier = base_add(&str_stat, 5.0, ModifierSource::Global);

        let mut created_nodes = Vec::new();
        for _ in 0..2 {
            graph.add_modifier(&modifier, false, |stat| {
                let node = value_node(&modifier, stat);
                created_nodes.push(Rc::clone(&node));
                node
            });
        }

        assert!(graph.remove_modifier(&modifier));
        assert!(created_nodes[1].is_disposed());
        assert!(!created_nodes[0].is_disposed());

        assert!(graph.remove_modifier(&modifier));
        assert!(!graph.remove_modifier(&modifier));
        assert_eq!(graph.modifier_instances(&modifier), 0);

        let stat_graph = graph.get(&str_stat).unwrap();
        assert_eq!(stat_graph.modifier_count(), 0);
        // Emptied collections stay until pruned.
        assert_eq!(stat_graph.form_collections().count(), 1);
        assert!(!stat_graph.is_empty());
    }

    #[test]
    fn test_local_base_modifiers_define_paths() {
        let mut factory = StatFactory::new();
        let damage = factory.stat("Damage", Entity::Character);
        let mut graph = CalculationGraph::new();
        let local = base_add(&damage, 3.0, ModifierSource::local("Weapon"));

        graph.add_modifier(&local, false, |stat| value_node(&local, stat));
        let paths = graph.get(&damage).unwrap().paths().target().paths();
        assert_eq!(paths, vec![PathDefinition::main(), ModifierSource::local("Weapon").path()]);

        graph.remove_modifier(&local);
        let paths = graph.get(&damage).unwrap().paths().target().paths();
        assert_eq!(paths, vec![PathDefinition::main()]);
    }

    #[test]
    fn test_unknown_modifier_removal_is_a_no_op() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let mut graph = CalculationGraph::new();
        assert!(!graph.remove_modifier(&base_add(&str_stat, 1.0, ModifierSource::Global)));
        assert!(!graph.contains(&str_stat));
    }

    #[test]
    fn test_suspenders_cover_all_members() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let mut graph = CalculationGraph::new();
        let modifier = base_add(&str_stat, 1.0, ModifierSource::Global);
        graph.add_modifier(&modifier, false, |stat| value_node(&modifier, stat));

        // One form collection plus the path collection.
        assert_eq!(graph.suspenders().len(), 2);
    }
}
