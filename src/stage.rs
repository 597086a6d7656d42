//! Stage wiring.
//!
//! [`StageTopology`] is the fixed dependency graph between a stat's stages.
//! [`StageValue`] is the formula that calculates one stage of one stat from
//! the stages and modifier collections it depends on.
//!
//! For a path `p` the stages combine as
//!
//! ```text
//! PathTotal(p)     = Base(p) * (1 + Increase(p) / 100) * More(p)
//! UncappedSubtotal = sum of PathTotal(p) over all paths
//! Subtotal         = UncappedSubtotal clamped to [Total(min), Total(max)]
//! Total            = TotalOverride if set, else Subtotal
//! ```

use crate::context::CalculationContext;
use crate::modifier::Form;
use crate::node_type::{NodeSelector, NodeType, PathDefinition};
use crate::node_value::{product_present, sum_present, NodeValue};
use crate::stat::{DataType, Stat};
use crate::value::Calculable;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// The dependency DAG between stages.
///
/// An edge points from a stage to the stage that reads it.
///
/// # Examples
///
/// ```rust
/// use statgraph::stage::StageTopology;
/// use statgraph::NodeType;
///
/// let topology = StageTopology::new();
/// let order = topology.prune_order();
/// let position = |node_type: NodeType| order.iter().position(|t| *t == node_type).unwrap();
///
/// // Dependents are released before their dependencies.
/// assert!(position(NodeType::Total) < position(NodeType::Subtotal));
/// assert!(position(NodeType::PathTotal) < position(NodeType::Base));
/// ```
#[derive(Debug, Clone)]
pub struct StageTopology {
    graph: DiGraph<NodeType, ()>,
    indices: HashMap<NodeType, NodeIndex>,
    evaluation_order: Vec<NodeType>,
}

impl StageTopology {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let indices: HashMap<NodeType, NodeIndex> = NodeType::ALL
            .iter()
            .map(|node_type| (*node_type, graph.add_node(*node_type)))
            .collect();

        let edges = [
            (NodeType::TotalOverride, NodeType::Total),
            (NodeType::Subtotal, NodeType::Total),
            (NodeType::UncappedSubtotal, NodeType::Subtotal),
            (NodeType::PathTotal, NodeType::UncappedSubtotal),
            (NodeType::Base, NodeType::PathTotal),
            (NodeType::Increase, NodeType::PathTotal),
            (NodeType::More, NodeType::PathTotal),
            (NodeType::BaseOverride, NodeType::Base),
            (NodeType::BaseSet, NodeType::Base),
            (NodeType::BaseAdd, NodeType::Base),
        ];
        for (dependency, dependent) in edges {
            graph.add_edge(indices[&dependency], indices[&dependent], ());
        }

        // Unreachable while the edge list stays acyclic.
        let evaluation_order = match toposort(&graph, None) {
            Ok(order) => order.into_iter().map(|index| graph[index]).collect(),
            Err(_) => NodeType::ALL.iter().rev().copied().collect(),
        };

        Self {
            graph,
            indices,
            evaluation_order,
        }
    }

    /// Stages in dependency order: every stage comes after the stages it reads.
    pub fn evaluation_order(&self) -> &[NodeType] {
        &self.evaluation_order
    }

    /// Stages in the order the pruner releases them: dependents first.
    pub fn prune_order(&self) -> Vec<NodeType> {
        self.evaluation_order.iter().rev().copied().collect()
    }

    /// The stages `node_type` reads directly.
    pub fn dependencies(&self, node_type: NodeType) -> Vec<NodeType> {
        self.neighbors(node_type, Direction::Incoming)
    }

    /// The stages that read `node_type` directly.
    pub fn dependents(&self, node_type: NodeType) -> Vec<NodeType> {
        self.neighbors(node_type, Direction::Outgoing)
    }

    fn neighbors(&self, node_type: NodeType, direction: Direction) -> Vec<NodeType> {
        let mut neighbors: Vec<NodeType> = self
            .graph
            .neighbors_directed(self.indices[&node_type], direction)
            .map(|index| self.graph[index])
            .collect();
        neighbors.sort();
        neighbors
    }
}

impl Default for StageTopology {
    fn default() -> Self {
        Self::new()
    }
}

/// The formula of one stage of one stat.
///
/// # Examples
///
/// ```rust
/// use statgraph::context::StaticContext;
/// use statgraph::stage::StageValue;
/// use statgraph::stat::{Entity, StatFactory};
/// use statgraph::{Calculable, NodeSelector, NodeType, NodeValue};
///
/// let mut factory = StatFactory::new();
/// let str_stat = factory.stat("Str", Entity::Character);
///
/// let mut context = StaticContext::new();
/// context.set_value(&str_stat, NodeType::Base, NodeValue::from(10.0));
/// context.set_value(&str_stat, NodeType::Increase, NodeValue::from(50.0));
///
/// let path_total = StageValue::new(str_stat, NodeSelector::main(NodeType::PathTotal));
/// assert_eq!(path_total.calculate(&context), Some(NodeValue::from(15.0)));
/// ```
#[derive(Debug, Clone)]
pub struct StageValue {
    stat: Stat,
    selector: NodeSelector,
}

impl StageValue {
    pub fn new(stat: Stat, selector: NodeSelector) -> Self {
        Self { stat, selector }
    }

    pub fn stat(&self) -> &Stat {
        &self.stat
    }

    pub fn selector(&self) -> &NodeSelector {
        &self.selector
    }

    fn stage(&self, context: &dyn CalculationContext, node_type: NodeType) -> Option<NodeValue> {
        context.get_value(&self.stat, node_type, &self.selector.path)
    }

    fn main_stage(&self, context: &dyn CalculationContext, node_type: NodeType) -> Option<NodeValue> {
        context.get_value(&self.stat, node_type, &PathDefinition::main())
    }

    /// Values of `form` on this path, plus the main path's values for forms
    /// that global modifiers contribute to every path.
    fn path_values(&self, context: &dyn CalculationContext, form: Form) -> Vec<Option<NodeValue>> {
        let path = &self.selector.path;
        let mut values = context.get_values(form, &self.stat, path);
        if !path.is_main() {
            values.extend(context.get_values(form, &self.stat, &PathDefinition::main()));
        }
        values
    }

    fn bound(&self, context: &dyn CalculationContext, bound: Option<&Stat>) -> Option<NodeValue> {
        bound.and_then(|stat| context.get_value(stat, NodeType::Total, &PathDefinition::main()))
    }

    fn formula(&self, context: &dyn CalculationContext) -> Option<NodeValue> {
        let path = &self.selector.path;
        match self.selector.node_type {
            NodeType::Total => self
                .main_stage(context, NodeType::TotalOverride)
                .or_else(|| self.main_stage(context, NodeType::Subtotal)),
            NodeType::Subtotal => {
                let uncapped = self.main_stage(context, NodeType::UncappedSubtotal)?;
                let minimum = self.bound(context, self.stat.minimum());
                let maximum = self.bound(context, self.stat.maximum());
                Some(uncapped.clamp_to(minimum, maximum))
            }
            NodeType::UncappedSubtotal => sum_present(
                context
                    .get_paths(&self.stat)
                    .iter()
                    .map(|path| context.get_value(&self.stat, NodeType::PathTotal, path)),
            ),
            NodeType::TotalOverride => {
                override_value(context.get_values(Form::TotalOverride, &self.stat, &PathDefinition::main()))
            }
            NodeType::PathTotal => {
                let base = self.stage(context, NodeType::Base)?;
                let increase = self.stage(context, NodeType::Increase).unwrap_or(NodeValue::ZERO);
                let more = self.stage(context, NodeType::More).unwrap_or(NodeValue::ONE);
                Some(base * (NodeValue::ONE + increase / NodeValue::from(100.0)) * more)
            }
            NodeType::Base => self
                .stage(context, NodeType::BaseOverride)
                .or_else(|| sum_present([self.stage(context, NodeType::BaseSet), self.stage(context, NodeType::BaseAdd)])),
            NodeType::BaseOverride => override_value(context.get_values(Form::BaseOverride, &self.stat, path)),
            NodeType::BaseSet => sum_present(context.get_values(Form::BaseSet, &self.stat, path)),
            NodeType::BaseAdd => sum_present(context.get_values(Form::BaseAdd, &self.stat, path)),
            NodeType::Increase => sum_present(self.path_values(context, Form::Increase)),
            NodeType::More => product_present(
                self.path_values(context, Form::More)
                    .into_iter()
                    .map(|value| value.map(|v| NodeValue::ONE + v / NodeValue::from(100.0))),
            ),
        }
    }
}

impl Calculable for StageValue {
    fn calculate(&self, context: &dyn CalculationContext) -> Option<NodeValue> {
        let node_type = self.selector.node_type;
        let value = self
            .stat
            .behaviors()
            .iter()
            .filter(|behavior| behavior.affects(node_type))
            .fold(self.formula(context), |value, behavior| {
                behavior.transform(&self.stat, value, context)
            });

        if node_type == NodeType::Total {
            apply_data_type(self.stat.data_type(), value)
        } else {
            value
        }
    }
}

/// Override aggregation: unset without values, zero if any value is zero,
/// otherwise the most recently added value.
fn override_value(values: Vec<Option<NodeValue>>) -> Option<NodeValue> {
    let set: Vec<NodeValue> = values.into_iter().flatten().collect();
    if set.iter().any(|value| *value == NodeValue::ZERO) {
        return Some(NodeValue::ZERO);
    }
    set.last().copied()
}

fn apply_data_type(data_type: DataType, value: Option<NodeValue>) -> Option<NodeValue> {
    match data_type {
        DataType::Double => value,
        DataType::Int | DataType::Enum => value.map(NodeValue::floor),
        DataType::Bool => value.map(|v| NodeValue::from(v.is_true())),
    }
}
