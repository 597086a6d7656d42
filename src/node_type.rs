//! Calculation stages and paths.
//!
//! Every stat is calculated through the same fixed pipeline of stages
//! ([`NodeType`]). Base values are grouped into paths ([`PathDefinition`]):
//! each path is scaled by increases and multipliers on its own before the
//! paths are summed.

use crate::modifier::{Form, ModifierSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage of a stat's calculation pipeline.
///
/// The order of [`NodeType::ALL`] goes from the final result down to the
/// stages fed directly by modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// The final value: the total override if set, else the subtotal.
    Total,
    /// The uncapped subtotal clamped to the stat's bounds.
    Subtotal,
    /// The sum of all path totals.
    UncappedSubtotal,
    /// Aggregated `TotalOverride` modifiers.
    TotalOverride,
    /// One path's base scaled by its increases and multipliers.
    PathTotal,
    /// The base override if set, else base set plus base add.
    Base,
    /// Aggregated `BaseOverride` modifiers.
    BaseOverride,
    /// Summed `BaseSet` modifiers.
    BaseSet,
    /// Summed `BaseAdd` modifiers.
    BaseAdd,
    /// Summed percentage increases.
    Increase,
    /// Compounded percentage multipliers.
    More,
}

impl NodeType {
    /// All stages, from the total down to the modifier-fed stages.
    pub const ALL: [NodeType; 11] = [
        NodeType::Total,
        NodeType::Subtotal,
        NodeType::UncappedSubtotal,
        NodeType::TotalOverride,
        NodeType::PathTotal,
        NodeType::Base,
        NodeType::BaseOverride,
        NodeType::BaseSet,
        NodeType::BaseAdd,
        NodeType::Increase,
        NodeType::More,
    ];

    /// Whether this stage exists once per path rather than once per stat.
    pub fn is_path_scoped(self) -> bool {
        !matches!(
            self,
            NodeType::Total | NodeType::Subtotal | NodeType::UncappedSubtotal | NodeType::TotalOverride
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A calculation path, identified by the source of its base modifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PathDefinition {
    source: ModifierSource,
}

impl PathDefinition {
    /// The path of globally sourced modifiers. Every stat has it.
    pub fn main() -> Self {
        Self {
            source: ModifierSource::Global,
        }
    }

    pub fn new(source: ModifierSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &ModifierSource {
        &self.source
    }

    pub fn is_main(&self) -> bool {
        self.source == ModifierSource::Global
    }
}

impl Default for PathDefinition {
    fn default() -> Self {
        Self::main()
    }
}

impl fmt::Display for PathDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Key of a stage node inside a stat's graph.
///
/// Stat-wide stages are always keyed by the main path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeSelector {
    pub node_type: NodeType,
    pub path: PathDefinition,
}

impl NodeSelector {
    pub fn new(node_type: NodeType, path: PathDefinition) -> Self {
        let path = if node_type.is_path_scoped() {
            path
        } else {
            PathDefinition::main()
        };
        Self { node_type, path }
    }

    pub fn main(node_type: NodeType) -> Self {
        Self::new(node_type, PathDefinition::main())
    }
}

impl fmt::Display for NodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_main() {
            write!(f, "{}", self.node_type)
        } else {
            write!(f, "{}[{}]", self.node_type, self.path)
        }
    }
}

/// Key of a modifier collection inside a stat's graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormNodeSelector {
    pub form: Form,
    pub path: PathDefinition,
}

impl FormNodeSelector {
    pub fn new(form: Form, path: PathDefinition) -> Self {
        let path = if form.is_path_scoped() {
            path
        } else {
            PathDefinition::main()
        };
        Self { form, path }
    }
}

impl fmt::Display for FormNodeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_main() {
            write!(f, "{}", self.form)
        } else {
            write!(f, "{}[{}]", self.form, self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_wide_stages_ignore_path() {
        let local = PathDefinition::new(ModifierSource::local("Weapon"));
        let selector = NodeSelector::new(NodeType::Total, local.clone());
        assert!(selector.path.is_main());

        let selector = NodeSelector::new(NodeType::Base, local.clone());
        assert_eq!(selector.path, local);
    }

    #[test]
    fn test_total_override_collections_ignore_path() {
        let local = PathDefinition::new(ModifierSource::local("Weapon"));
        let selector = FormNodeSelector::new(Form::TotalOverride, local);
        assert!(selector.path.is_main());
    }

    #[test]
    fn test_selector_display() {
        let local = PathDefinition::new(ModifierSource::local("Weapon"));
        assert_eq!(NodeSelector::main(NodeType::Base).to_string(), "Base");
        assert_eq!(NodeSelector::new(NodeType::Base, local).to_string(), "Base[Local(Weapon)]");
    }
}
