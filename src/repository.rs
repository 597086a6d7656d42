//! Read access to the calculation graph.
//!
//! A [`NodeRepository`] hands out nodes and collections, creating them on
//! first request. Each repository is bound to one view:
//!
//! - the suspension-aware repository ([`Calculator::node_repository`]) only
//!   notifies at the end of a batch, when values are consistent;
//! - the default repository ([`Calculator::default_node_repository`])
//!   notifies synchronously while a batch is running. Its handlers must not
//!   read values or call back into a repository: the graph is mutably
//!   borrowed during the batch and a nested `get_node` panics with a
//!   `BorrowMutError`.
//!
//! Nodes nobody subscribes to are reclaimed by the next update. Subscribe to
//! keep a node alive, or fetch it again after every update.
//!
//! A node only learns its inputs when it is calculated. After subscribing to
//! a node of the suspension-aware repository, read its
//! [`value`](crate::node::CalculationNode::value) once; a node that was never
//! read does not notify.
//!
//! [`Calculator::node_repository`]: crate::Calculator::node_repository
//! [`Calculator::default_node_repository`]: crate::Calculator::default_node_repository

use crate::collection::{FormNodeCollection, PathCollection};
use crate::engine::Engine;
use crate::modifier::Form;
use crate::node::{CalculationNode, NullNode, ViewKind};
use crate::node_type::{FormNodeSelector, NodeSelector, NodeType, PathDefinition};
use crate::stat::Stat;
use std::rc::Rc;

/// Hands out nodes and collections through one view.
#[derive(Clone)]
pub struct NodeRepository {
    engine: Rc<Engine>,
    kind: ViewKind,
}

impl NodeRepository {
    pub(crate) fn new(engine: Rc<Engine>, kind: ViewKind) -> Self {
        Self { engine, kind }
    }

    /// The view nodes from this repository notify through.
    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    /// The main-path node of one stage of a stat.
    ///
    /// A missing stat yields a node that is always unset.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use statgraph::{Calculator, NodeType};
    /// use statgraph::node::CalculationNode;
    ///
    /// let calculator = Calculator::new();
    /// let node = calculator.node_repository().get_node(None, NodeType::Total);
    /// assert_eq!(node.value(), None);
    /// ```
    pub fn get_node(&self, stat: Option<&Stat>, node_type: NodeType) -> Rc<dyn CalculationNode> {
        self.get_path_node(stat, node_type, &PathDefinition::main())
    }

    /// The node of one stage of a stat on a specific path.
    ///
    /// Stat-wide stages ignore `path`.
    pub fn get_path_node(
        &self,
        stat: Option<&Stat>,
        node_type: NodeType,
        path: &PathDefinition,
    ) -> Rc<dyn CalculationNode> {
        match stat {
            Some(stat) => self
                .engine
                .node(stat, NodeSelector::new(node_type, path.clone()), self.kind) as Rc<dyn CalculationNode>,
            None => Rc::new(NullNode),
        }
    }

    /// The active modifiers of one form on one path of a stat.
    pub fn get_form_node_collection(
        &self,
        stat: &Stat,
        form: Form,
        path: &PathDefinition,
    ) -> Rc<dyn FormNodeCollection> {
        self.engine
            .form_collection(stat, FormNodeSelector::new(form, path.clone()), self.kind)
    }

    /// The calculation paths of a stat.
    pub fn get_paths(&self, stat: &Stat) -> Rc<dyn PathCollection> {
        self.engine.paths(stat, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Observable;
    use crate::stat::{Entity, StatFactory};

    #[test]
    fn test_null_node_for_missing_stat() {
        let repository = NodeRepository::new(Engine::new(), ViewKind::Suspendable);
        let node = repository.get_node(None, NodeType::Subtotal);
        assert_eq!(node.value(), None);
    }

    #[test]
    fn test_repositories_share_nodes() {
        let mut factory = StatFactory::new();
        let str_stat = factory.stat("Str", Entity::Character);
        let engine = Engine::new();
        let suspendable = NodeRepository::new(Rc::clone(&engine), ViewKind::Suspendable);
        let eager = NodeRepository::new(engine, ViewKind::Default);

        let a = suspendable.get_node(Some(&str_stat), NodeType::Total);
        let b = eager.get_node(Some(&str_stat), NodeType::Total);
        a.subscribe(Rc::new(|| {}));
        b.subscribe(Rc::new(|| {}));
        assert_eq!(a.value(), b.value());
        assert_eq!(suspendable.get_paths(&str_stat).paths(), vec![PathDefinition::main()]);
        assert!(eager
            .get_form_node_collection(&str_stat, Form::BaseAdd, &PathDefinition::main())
            .is_empty());
    }
}
