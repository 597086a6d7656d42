//! Modifiers.
//!
//! A [`Modifier`] is one contribution to one or more stats. It is a plain
//! immutable value: two modifiers with the same stats, form, value and source
//! are equal, and the calculation graph tracks them as a multiset.

use crate::error::StatError;
use crate::node_type::{NodeType, PathDefinition};
use crate::stat::Stat;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a modifier's value is aggregated.
///
/// Each form feeds exactly one stage.
///
/// # Examples
///
/// ```rust
/// use statgraph::{Form, NodeType};
///
/// assert_eq!(Form::Increase.node_type(), NodeType::Increase);
/// assert!(Form::BaseAdd.defines_path());
/// assert!(!Form::TotalOverride.is_path_scoped());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Form {
    /// Replaces the base of a path.
    BaseOverride,
    /// Sets the base of a path; multiple values are summed.
    BaseSet,
    /// Adds to the base of a path.
    BaseAdd,
    /// Percentage increase; increases are summed before being applied.
    Increase,
    /// Percentage multiplier; multipliers compound.
    More,
    /// Replaces the total.
    TotalOverride,
}

impl Form {
    /// All forms.
    pub const ALL: [Form; 6] = [
        Form::BaseOverride,
        Form::BaseSet,
        Form::BaseAdd,
        Form::Increase,
        Form::More,
        Form::TotalOverride,
    ];

    /// The stage this form's collection feeds.
    pub fn node_type(self) -> NodeType {
        match self {
            Form::BaseOverride => NodeType::BaseOverride,
            Form::BaseSet => NodeType::BaseSet,
            Form::BaseAdd => NodeType::BaseAdd,
            Form::Increase => NodeType::Increase,
            Form::More => NodeType::More,
            Form::TotalOverride => NodeType::TotalOverride,
        }
    }

    /// Whether modifiers of this form are grouped by path.
    pub fn is_path_scoped(self) -> bool {
        self.node_type().is_path_scoped()
    }

    /// Whether a modifier of this form creates its source's path.
    pub fn defines_path(self) -> bool {
        matches!(self, Form::BaseOverride | Form::BaseSet | Form::BaseAdd)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a modifier comes from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModifierSource {
    /// Applies to the stat as a whole.
    Global,
    /// Local to one item or skill; base modifiers form their own path.
    Local(String),
}

impl ModifierSource {
    pub fn local(name: impl Into<String>) -> Self {
        ModifierSource::Local(name.into())
    }

    /// The path base modifiers from this source belong to.
    pub fn path(&self) -> PathDefinition {
        PathDefinition::new(self.clone())
    }
}

impl fmt::Display for ModifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierSource::Global => f.write_str("Global"),
            ModifierSource::Local(name) => write!(f, "Local({})", name),
        }
    }
}

/// One contribution to one or more stats.
///
/// # Examples
///
/// ```rust
/// use statgraph::stat::{Entity, StatFactory};
/// use statgraph::{Form, Modifier, ModifierSource, Value};
///
/// let mut factory = StatFactory::new();
/// let str_stat = factory.stat("Str", Entity::Character);
///
/// let modifier = Modifier::new([str_stat], Form::BaseAdd, Value::from(10.0), ModifierSource::Global).unwrap();
/// assert_eq!(modifier.form(), Form::BaseAdd);
///
/// let empty = Modifier::new(Vec::new(), Form::BaseAdd, Value::from(10.0), ModifierSource::Global);
/// assert!(empty.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Modifier {
    stats: Vec<Stat>,
    form: Form,
    value: Value,
    source: ModifierSource,
}

impl Modifier {
    pub fn new(
        stats: impl IntoIterator<Item = Stat>,
        form: Form,
        value: Value,
        source: ModifierSource,
    ) -> Result<Self, StatError> {
        let stats: Vec<Stat> = stats.into_iter().collect();
        if stats.is_empty() {
            return Err(StatError::EmptyStatSet);
        }
        Ok(Self {
            stats,
            form,
            value,
            source,
        })
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn form(&self) -> Form {
        self.form
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn source(&self) -> &ModifierSource {
        &self.source
    }

    /// The path this modifier's collection is keyed by.
    pub fn path(&self) -> PathDefinition {
        if self.form.is_path_scoped() {
            self.source.path()
        } else {
            PathDefinition::main()
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats: Vec<String> = self.stats.iter().map(|stat| stat.to_string()).collect();
        write!(
            f,
            "{} {} {} ({})",
            stats.join(", "),
            self.form,
            self.value,
            self.source
        )
    }
}
