//! Stat breakdowns.
//!
//! A [`StatBreakdown`] is a read-only snapshot of how one stat's total came
//! about: the value of every stage and the modifiers feeding it. It is
//! meant for tooltips and debugging and serializes to JSON.

use crate::collection::{FormNodeCollection, PathCollection};
use crate::error::StatError;
use crate::modifier::Form;
use crate::node::CalculationNode;
use crate::node_type::{NodeType, PathDefinition};
use crate::node_value::NodeValue;
use crate::repository::NodeRepository;
use crate::stat::Stat;
use serde::Serialize;
use std::fmt;

/// The value of one stage on one path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageEntry {
    pub node_type: NodeType,
    pub path: PathDefinition,
    pub value: Option<NodeValue>,
}

/// One active modifier and its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifierEntry {
    pub form: Form,
    pub path: PathDefinition,
    pub value: Option<NodeValue>,
    /// Human-readable description of the modifier.
    pub description: String,
}

/// How a stat's total was calculated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatBreakdown {
    /// The stat this breakdown describes.
    pub stat: Stat,

    /// The final value.
    pub total: Option<NodeValue>,

    /// Every set stage, in dependency order. Path-scoped stages appear once
    /// per path.
    pub stages: Vec<StageEntry>,

    /// Every active modifier, grouped by path and form, in insertion order.
    pub modifiers: Vec<ModifierEntry>,
}

impl StatBreakdown {
    pub(crate) fn collect(repository: &NodeRepository, stat: &Stat, order: &[NodeType]) -> Self {
        let paths = repository.get_paths(stat).paths();
        let main = PathDefinition::main();

        let mut stages = Vec::new();
        for node_type in order {
            let stage_paths = if node_type.is_path_scoped() {
                paths.as_slice()
            } else {
                std::slice::from_ref(&main)
            };
            for path in stage_paths {
                let value = repository.get_path_node(Some(stat), *node_type, path).value();
                if value.is_some() {
                    stages.push(StageEntry {
                        node_type: *node_type,
                        path: path.clone(),
                        value,
                    });
                }
            }
        }

        let mut modifiers = Vec::new();
        for path in &paths {
            for form in Form::ALL {
                if !form.is_path_scoped() && !path.is_main() {
                    continue;
                }
                let collection = repository.get_form_node_collection(stat, form, path);
                for (modifier, value) in collection.modifiers().into_iter().zip(collection.values()) {
                    modifiers.push(ModifierEntry {
                        form,
                        path: path.clone(),
                        value,
                        description: modifier.to_string(),
                    });
                }
            }
        }

        Self {
            stat: stat.clone(),
            total: repository.get_node(Some(stat), NodeType::Total).value(),
            stages,
            modifiers,
        }
    }

    /// The value of a stage on a path, if it was set.
    pub fn stage(&self, node_type: NodeType, path: &PathDefinition) -> Option<NodeValue> {
        self.stages
            .iter()
            .find(|entry| entry.node_type == node_type && &entry.path == path)
            .and_then(|entry| entry.value)
    }

    /// Serialize the breakdown to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, StatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for StatBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total {
            Some(total) => writeln!(f, "{}: {}", self.stat, total)?,
            None => writeln!(f, "{}: unset", self.stat)?,
        }
        for entry in &self.stages {
            if let Some(value) = entry.value {
                if entry.path.is_main() {
                    writeln!(f, "  {} = {}", entry.node_type, value)?;
                } else {
                    writeln!(f, "  {}[{}] = {}", entry.node_type, entry.path, value)?;
                }
            }
        }
        for entry in &self.modifiers {
            writeln!(f, "  + {}", entry.description)?;
        }
        Ok(())
    }
}
