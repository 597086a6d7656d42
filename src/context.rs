//! Calculation contexts.
//!
//! A [`CalculationContext`] is the read-only view a value expression or stage
//! formula gets of the rest of the graph. Inside a calculator the context
//! records every read so that the reading node can subscribe to what it
//! used. [`StaticContext`] is a plain map-backed context for evaluating
//! values outside of a graph.

use crate::modifier::Form;
use crate::node_type::{FormNodeSelector, NodeSelector, NodeType, PathDefinition};
use crate::node_value::NodeValue;
use crate::stat::Stat;
use std::collections::HashMap;

/// Read access to stage values, modifier values and paths.
pub trait CalculationContext {
    /// The value of a stat's stage on `path`.
    fn get_value(&self, stat: &Stat, node_type: NodeType, path: &PathDefinition) -> Option<NodeValue>;

    /// The values of all active modifiers of `form` on `path`, in insertion order.
    fn get_values(&self, form: Form, stat: &Stat, path: &PathDefinition) -> Vec<Option<NodeValue>>;

    /// The stat's paths. The main path is always first.
    fn get_paths(&self, stat: &Stat) -> Vec<PathDefinition>;
}

/// A map-backed context.
///
/// Missing stage values are unset, missing modifier collections are empty.
///
/// # Examples
///
/// ```rust
/// use statgraph::context::{CalculationContext, StaticContext};
/// use statgraph::stat::{Entity, StatFactory};
/// use statgraph::{NodeType, NodeValue, PathDefinition};
///
/// let mut factory = StatFactory::new();
/// let str_stat = factory.stat("Str", Entity::Character);
///
/// let mut context = StaticContext::new();
/// context.set_value(&str_stat, NodeType::Total, NodeValue::from(12.0));
///
/// let main = PathDefinition::main();
/// assert_eq!(context.get_value(&str_stat, NodeType::Total, &main), Some(NodeValue::from(12.0)));
/// assert_eq!(context.get_value(&str_stat, NodeType::Base, &main), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    values: HashMap<(Stat, NodeSelector), NodeValue>,
    modifier_values: HashMap<(Stat, FormNodeSelector), Vec<Option<NodeValue>>>,
    paths: HashMap<Stat, Vec<PathDefinition>>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a stage value on the main path.
    pub fn set_value(&mut self, stat: &Stat, node_type: NodeType, value: NodeValue) {
        self.set_path_value(stat, NodeSelector::main(node_type), value);
    }

    /// Set a stage value on a specific path.
    pub fn set_path_value(&mut self, stat: &Stat, selector: NodeSelector, value: NodeValue) {
        self.values.insert((stat.clone(), selector), value);
    }

    /// Append a modifier value. Base forms also register their path.
    pub fn push_modifier_value(&mut self, stat: &Stat, selector: FormNodeSelector, value: Option<NodeValue>) {
        if selector.form.defines_path() && !selector.path.is_main() {
            let paths = self.paths.entry(stat.clone()).or_default();
            if !paths.contains(&selector.path) {
                paths.push(selector.path.clone());
            }
        }
        self.modifier_values
            .entry((stat.clone(), selector))
            .or_default()
            .push(value);
    }
}

impl CalculationContext for StaticContext {
    fn get_value(&self, stat: &Stat, node_type: NodeType, path: &PathDefinition) -> Option<NodeValue> {
        let key = (stat.clone(), NodeSelector::new(node_type, path.clone()));
        self.values.get(&key).copied()
    }

    fn get_values(&self, form: Form, stat: &Stat, path: &PathDefinition) -> Vec<Option<NodeValue>> {
        let key = (stat.clone(), FormNodeSelector::new(form, path.clone()));
        self.modifier_values.get(&key).cloned().unwrap_or_default()
    }

    fn get_paths(&self, stat: &Stat) -> Vec<PathDefinition> {
        let mut paths = vec![PathDefinition::main()];
        if let Some(extra) = self.paths.get(stat) {
            paths.extend(extra.iter().cloned());
        }
        paths
    }
}
