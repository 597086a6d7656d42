//! Reclaiming unused graph state.
//!
//! After every batch the pruner releases nodes nobody subscribes to, empty
//! modifier collections nobody subscribes to, and stat graphs left with
//! nothing in them. Releasing a node drops its own subscriptions, which can
//! free its dependencies, possibly in other stats, so passes repeat until
//! nothing more is released.

use crate::engine::Engine;
use crate::node_type::{FormNodeSelector, NodeSelector, NodeType};
use serde::Serialize;
use std::ops::AddAssign;
use tracing::debug;

/// What one pruning run released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub nodes_removed: usize,
    pub collections_removed: usize,
    pub stats_removed: usize,
}

impl PruneReport {
    /// Whether nothing was released.
    pub fn is_empty(&self) -> bool {
        self.nodes_removed == 0 && self.collections_removed == 0 && self.stats_removed == 0
    }
}

impl AddAssign for PruneReport {
    fn add_assign(&mut self, other: Self) {
        self.nodes_removed += other.nodes_removed;
        self.collections_removed += other.collections_removed;
        self.stats_removed += other.stats_removed;
    }
}

/// Prune until a pass releases nothing.
pub(crate) fn prune(engine: &Engine) -> PruneReport {
    let order = engine.topology().prune_order();
    let mut report = PruneReport::default();
    let mut passes = 0;
    loop {
        let pass = prune_pass(engine, &order);
        passes += 1;
        if pass.is_empty() {
            break;
        }
        report += pass;
    }
    debug!(
        passes,
        nodes = report.nodes_removed,
        collections = report.collections_removed,
        stats = report.stats_removed,
        "pruned calculation graph"
    );
    report
}

fn prune_pass(engine: &Engine, order: &[NodeType]) -> PruneReport {
    let mut pass = PruneReport::default();
    let mut removed_stats = Vec::new();
    {
        let mut graph = engine.graph_mut();
        for stat in graph.stats() {
            let Some(stat_graph) = graph.get_mut(&stat) else {
                continue;
            };

            for node_type in order {
                let unused: Vec<NodeSelector> = stat_graph
                    .nodes()
                    .filter(|(selector, entry)| selector.node_type == *node_type && entry.subscriber_count() == 0)
                    .map(|(selector, _)| selector.clone())
                    .collect();
                for selector in unused {
                    if stat_graph.remove_node(&selector) {
                        pass.nodes_removed += 1;
                    }
                }
            }

            let unused: Vec<FormNodeSelector> = stat_graph
                .form_collections()
                .filter(|(_, entry)| entry.subscriber_count() == 0 && entry.target().is_empty())
                .map(|(selector, _)| selector.clone())
                .collect();
            for selector in unused {
                if stat_graph.remove_form_node_collection(&selector) {
                    pass.collections_removed += 1;
                }
            }

            if stat_graph.is_empty() {
                if let Some(mut removed) = graph.remove(&stat) {
                    removed.dispose();
                    removed_stats.push(stat);
                }
            }
        }
    }

    pass.stats_removed = removed_stats.len();
    for stat in &removed_stats {
        engine.registry().on_stat_removed(stat);
    }
    pass
}
