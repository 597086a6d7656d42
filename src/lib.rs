//! # statgraph - Incremental Stat Calculation Graph
//!
//! A stat calculation engine for build planners and RPG engines that provides:
//! - **Incremental** recalculation (only stages whose inputs changed are recomputed)
//! - **Batched** updates (subscribers see one notification per update, never a half-applied batch)
//! - **Self-pruning** graphs (nodes nobody observes are released after every update)
//! - **Stat-to-stat** dependencies discovered while calculating
//!
//! ## Core Concepts
//!
//! ### Stage Pipeline
//!
//! Every stat is calculated through the same fixed stages:
//!
//! ```text
//! [Modifiers] → [Base / Increase / More per path] → [PathTotal] → [UncappedSubtotal] → [Subtotal] → [Total]
//! ```
//!
//! 1. **Modifiers** add values of one [`Form`] to one or more stats
//! 2. **Paths** scale their own base by increases and multipliers
//! 3. **Subtotal** sums the paths and clamps them to the stat's bounds
//! 4. **Total** applies overrides and the stat's data type
//!
//! ### Key Features
//!
//! - **Lazy evaluation**: values are computed on first read and cached
//! - **Dependency tracking**: a stage reading another stat subscribes to it
//! - **Cycle tolerance**: a cyclic read yields an unset value instead of recursing
//! - **Registration**: stats flagged for explicit registration are kept alive and reported
//! - **Debug-Friendly**: [`StatBreakdown`] lists every stage and modifier of a stat
//!
//! ## Example
//!
//! ```rust
//! use statgraph::*;
//! use statgraph::node::Observable;
//! use statgraph::stat::{Entity, StatFactory};
//! use std::rc::Rc;
//!
//! let mut factory = StatFactory::new();
//! let str_stat = factory.stat("Str", Entity::Character);
//!
//! let mut calculator = Calculator::new();
//! let total = calculator.node_repository().get_node(Some(&str_stat), NodeType::Total);
//! total.subscribe(Rc::new(|| {}));
//!
//! calculator.update(CalculatorUpdate::adding([
//!     Modifier::new([str_stat.clone()], Form::BaseAdd, Value::from(10.0), ModifierSource::Global).unwrap(),
//!     Modifier::new([str_stat.clone()], Form::Increase, Value::from(50.0), ModifierSource::Global).unwrap(),
//! ]));
//!
//! assert_eq!(total.value(), Some(NodeValue::from(15.0))); // 10 * (1 + 50%)
//! ```
//!
//! ## Modules
//!
//! - [`calculator`] - Main entry point and update batches
//! - [`repository`] - Access to nodes and collections
//! - [`stat`] - Stat definitions and interning
//! - [`modifier`] - Modifiers and their forms
//! - [`value`] - Modifier value expressions
//! - [`node`] - Calculation nodes and their views
//! - [`collection`] - Modifier and path collections
//! - [`stage`] - Stage formulas and their order
//! - [`breakdown`] - Per-stat debugging snapshots
//! - [`config`] - Calculator settings
//! - [`error`] - Error types

pub mod breakdown;
pub mod calculator;
pub mod collection;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod modifier;
pub mod node;
pub mod node_type;
pub mod node_value;
pub mod repository;
pub mod stage;
pub mod stat;
pub mod suspension;
pub mod value;

mod engine;
mod graph;
mod pruner;
mod registry;

// Re-export main types for convenience
pub use breakdown::StatBreakdown;
pub use calculator::{Calculator, CalculatorUpdate};
pub use config::CalculatorConfig;
pub use error::StatError;
pub use modifier::{Form, Modifier, ModifierSource};
pub use node::{CalculationNode, ViewKind};
pub use node_type::{FormNodeSelector, NodeSelector, NodeType, PathDefinition};
pub use node_value::{product_present, sum_present, NodeValue, NullableValue};
pub use pruner::PruneReport;
pub use repository::NodeRepository;
pub use value::{Calculable, Value};
