//! Stats and the stat factory.
//!
//! A [`Stat`] is an immutable, shared description of one attribute of one
//! entity. Stats are interned by a [`StatFactory`]: asking for the same
//! identity and entity twice yields the same allocation, so equality checks
//! are usually a pointer comparison.

use crate::context::CalculationContext;
use crate::error::StatError;
use crate::node_type::NodeType;
use crate::node_value::NodeValue;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// The entity a stat belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Entity {
    Character,
    Enemy,
    Minion,
    Totem,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Character => "Character",
            Entity::Enemy => "Enemy",
            Entity::Minion => "Minion",
            Entity::Totem => "Totem",
        };
        f.write_str(name)
    }
}

/// How a stat's total is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Plain floating point.
    #[default]
    Double,
    /// Integral; totals are rounded down.
    Int,
    /// Boolean; totals are `1` when true and `0` otherwise.
    Bool,
    /// Enumeration stored as a double; totals are rounded down.
    Enum,
}

/// Why a stat is surfaced to consumers without them asking for it.
///
/// Explicitly registered stats are pinned by the registry and are never
/// pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplicitRegistrationType {
    /// The user is expected to supply a value (e.g. a configuration toggle).
    UserSpecifiedValue,
    /// The stat is shown to the user.
    Displayed,
}

/// Extra behavior attached to a stat.
///
/// A behavior post-processes the value of the stages it affects. It may read
/// other stats through the context, in which case the stage is recalculated
/// whenever those stats change.
pub trait Behavior {
    /// Whether this behavior applies to `node_type`.
    fn affects(&self, node_type: NodeType) -> bool;

    /// Transform the value calculated for an affected stage.
    fn transform(
        &self,
        stat: &Stat,
        value: Option<NodeValue>,
        context: &dyn CalculationContext,
    ) -> Option<NodeValue>;
}

struct StatData {
    identity: String,
    entity: Entity,
    data_type: DataType,
    explicit_registration: Option<ExplicitRegistrationType>,
    behaviors: Vec<Rc<dyn Behavior>>,
    minimum: Option<Stat>,
    maximum: Option<Stat>,
}

/// An interned stat.
///
/// Equality, hashing and ordering only consider identity and entity.
#[derive(Clone)]
pub struct Stat(Rc<StatData>);

impl Stat {
    /// The stat's identity string.
    pub fn identity(&self) -> &str {
        &self.0.identity
    }

    /// The entity this stat belongs to.
    pub fn entity(&self) -> Entity {
        self.0.entity
    }

    pub fn data_type(&self) -> DataType {
        self.0.data_type
    }

    pub fn explicit_registration(&self) -> Option<ExplicitRegistrationType> {
        self.0.explicit_registration
    }

    pub fn behaviors(&self) -> &[Rc<dyn Behavior>] {
        &self.0.behaviors
    }

    /// The stat holding this stat's lower bound, if it is bounded.
    pub fn minimum(&self) -> Option<&Stat> {
        self.0.minimum.as_ref()
    }

    /// The stat holding this stat's upper bound, if it is bounded.
    pub fn maximum(&self) -> Option<&Stat> {
        self.0.maximum.as_ref()
    }

    /// Whether both handles point at the same interned allocation.
    pub fn ptr_eq(&self, other: &Stat) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Stat {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.0.entity == other.0.entity && self.0.identity == other.0.identity)
    }
}

impl Eq for Stat {}

impl Hash for Stat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.identity.hash(state);
        self.0.entity.hash(state);
    }
}

impl PartialOrd for Stat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .identity
            .cmp(&other.0.identity)
            .then(self.0.entity.cmp(&other.0.entity))
    }
}

impl fmt::Debug for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stat")
            .field("identity", &self.0.identity)
            .field("entity", &self.0.entity)
            .field("data_type", &self.0.data_type)
            .field("behaviors", &self.0.behaviors.len())
            .finish()
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.entity {
            Entity::Character => write!(f, "{}", self.0.identity),
            entity => write!(f, "{}.{}", entity, self.0.identity),
        }
    }
}

impl Serialize for Stat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Everything needed to intern a stat.
///
/// # Examples
///
/// ```rust
/// use statgraph::stat::{DataType, Entity, StatDefinition, StatFactory};
///
/// let mut factory = StatFactory::new();
/// let life = factory
///     .intern(StatDefinition::new("Life", Entity::Character).data_type(DataType::Int).bounded())
///     .unwrap();
///
/// assert_eq!(life.minimum().unwrap().identity(), "Life.Minimum");
/// assert!(life.ptr_eq(&factory.stat("Life", Entity::Character)));
/// ```
pub struct StatDefinition {
    identity: String,
    entity: Entity,
    data_type: DataType,
    explicit_registration: Option<ExplicitRegistrationType>,
    behaviors: Vec<Rc<dyn Behavior>>,
    bounded: bool,
}

impl StatDefinition {
    pub fn new(identity: impl Into<String>, entity: Entity) -> Self {
        Self {
            identity: identity.into(),
            entity,
            data_type: DataType::Double,
            explicit_registration: None,
            behaviors: Vec::new(),
            bounded: false,
        }
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn explicitly_registered(mut self, registration: ExplicitRegistrationType) -> Self {
        self.explicit_registration = Some(registration);
        self
    }

    pub fn behavior(mut self, behavior: Rc<dyn Behavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Give the stat `.Minimum` and `.Maximum` sub-stats that clamp its subtotal.
    pub fn bounded(mut self) -> Self {
        self.bounded = true;
        self
    }
}

/// Interns stats by identity and entity.
#[derive(Default)]
pub struct StatFactory {
    stats: HashMap<(String, Entity), Stat>,
}

impl StatFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a stat definition.
    ///
    /// Returns the existing stat if one with the same identity and entity was
    /// interned before with the same data type and registration.
    pub fn intern(&mut self, definition: StatDefinition) -> Result<Stat, StatError> {
        let key = (definition.identity.clone(), definition.entity);
        if let Some(existing) = self.stats.get(&key) {
            if existing.data_type() != definition.data_type {
                return Err(StatError::ConflictingDefinition {
                    stat: existing.to_string(),
                    existing: existing.data_type(),
                    requested: definition.data_type,
                });
            }
            if existing.explicit_registration() != definition.explicit_registration {
                return Err(StatError::ConflictingRegistration(existing.to_string()));
            }
            return Ok(existing.clone());
        }

        let (minimum, maximum) = if definition.bounded {
            let minimum = self.stat_with_type(
                &format!("{}.Minimum", definition.identity),
                definition.entity,
                definition.data_type,
            );
            let maximum = self.stat_with_type(
                &format!("{}.Maximum", definition.identity),
                definition.entity,
                definition.data_type,
            );
            (Some(minimum), Some(maximum))
        } else {
            (None, None)
        };

        let stat = Stat(Rc::new(StatData {
            identity: definition.identity,
            entity: definition.entity,
            data_type: definition.data_type,
            explicit_registration: definition.explicit_registration,
            behaviors: definition.behaviors,
            minimum,
            maximum,
        }));
        self.stats.insert(key, stat.clone());
        Ok(stat)
    }

    /// Get or create a plain `Double` stat.
    ///
    /// An existing stat is returned as is, whatever its definition.
    pub fn stat(&mut self, identity: &str, entity: Entity) -> Stat {
        self.stat_with_type(identity, entity, DataType::Double)
    }

    /// Look up an interned stat.
    pub fn get(&self, identity: &str, entity: Entity) -> Option<Stat> {
        self.stats.get(&(identity.to_owned(), entity)).cloned()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    fn stat_with_type(&mut self, identity: &str, entity: Entity, data_type: DataType) -> Stat {
        self.stats
            .entry((identity.to_owned(), entity))
            .or_insert_with(|| {
                Stat(Rc::new(StatData {
                    identity: identity.to_owned(),
                    entity,
                    data_type,
                    explicit_registration: None,
                    behaviors: Vec::new(),
                    minimum: None,
                    maximum: None,
                }))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_are_interned() {
        let mut factory = StatFactory::new();
        let str1 = factory.stat("Str", Entity::Character);
        let str2 = factory.stat("Str", Entity::Character);
        assert!(str1.ptr_eq(&str2));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_equality_by_identity_and_entity() {
        let mut factory = StatFactory::new();
        let player = factory.stat("Life", Entity::Character);
        let enemy = factory.stat("Life", Entity::Enemy);
        assert_ne!(player, enemy);
        assert_eq!(enemy.to_string(), "Enemy.Life");
        assert_eq!(player.to_string(), "Life");
    }

    #[test]
    fn test_conflicting_data_type() {
        let mut factory = StatFactory::new();
        factory
            .intern(StatDefinition::new("Level", Entity::Character).data_type(DataType::Int))
            .unwrap();
        let result = factory.intern(StatDefinition::new("Level", Entity::Character));
        assert!(matches!(
            result,
            Err(StatError::ConflictingDefinition { existing: DataType::Int, .. })
        ));
    }

    #[test]
    fn test_bounded_stat_has_sub_stats() {
        let mut factory = StatFactory::new();
        let life = factory
            .intern(StatDefinition::new("Life", Entity::Character).bounded())
            .unwrap();
        let maximum = life.maximum().unwrap();
        assert_eq!(maximum.identity(), "Life.Maximum");
        assert!(maximum.ptr_eq(&factory.stat("Life.Maximum", Entity::Character)));
        assert!(maximum.minimum().is_none());
    }

    #[test]
    fn test_stat_ordering() {
        let mut factory = StatFactory::new();
        let dex = factory.stat("Dex", Entity::Character);
        let str = factory.stat("Str", Entity::Character);
        assert!(dex < str);
    }

    struct Doubled;

    impl Behavior for Doubled {
        fn affects(&self, node_type: NodeType) -> bool {
            node_type == NodeType::Total
        }

        fn transform(
            &self,
            _stat: &Stat,
            value: Option<NodeValue>,
            _context: &dyn CalculationContext,
        ) -> Option<NodeValue> {
            value.map(|value| value * NodeValue::from(2.0))
        }
    }

    #[test]
    fn test_stat_clones_share_behaviors() {
        let mut factory = StatFactory::new();
        let behavior: Rc<dyn Behavior> = Rc::new(Doubled);
        let armour = factory
            .intern(StatDefinition::new("Armour", Entity::Character).behavior(Rc::clone(&behavior)))
            .unwrap();
        assert_eq!(Rc::strong_count(&behavior), 2);

        let handle = armour.clone();
        assert!(handle.ptr_eq(&armour));
        assert_eq!(handle.behaviors().len(), 1);
        assert!(handle.behaviors()[0].affects(NodeType::Total));
        assert_eq!(Rc::strong_count(&behavior), 2);
    }
}
