//! Value expressions.
//!
//! A [`Value`] is the hashable expression a modifier contributes. It is
//! evaluated against a [`CalculationContext`], so a value can read other
//! stats without owning them.

use crate::context::CalculationContext;
use crate::error::StatError;
use crate::node_type::{NodeType, PathDefinition};
use crate::node_value::{NodeValue, NullableValue};
use crate::stat::Stat;
use std::fmt;

/// Something that can be calculated against a context.
///
/// Implemented by modifier values and by the stage formulas.
pub trait Calculable {
    fn calculate(&self, context: &dyn CalculationContext) -> Option<NodeValue>;
}

/// A modifier value expression.
///
/// Arithmetic is strict: an unset operand makes the result unset.
///
/// # Examples
///
/// ```rust
/// use statgraph::context::StaticContext;
/// use statgraph::stat::{Entity, StatFactory};
/// use statgraph::{Calculable, NodeType, NodeValue, Value};
///
/// let mut factory = StatFactory::new();
/// let str_stat = factory.stat("Str", Entity::Character);
///
/// let mut context = StaticContext::new();
/// context.set_value(&str_stat, NodeType::Total, NodeValue::from(50.0));
///
/// // 1 life per 2 strength
/// let value = Value::product([Value::stat(str_stat), Value::from(0.5)]);
/// assert_eq!(value.calculate(&context), Some(NodeValue::from(25.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// A fixed value, possibly unset.
    Constant(Option<NodeValue>),
    /// The main-path value of another stat's stage.
    Stat { stat: Stat, node_type: NodeType },
    /// Sum of all operands.
    Sum(Vec<Value>),
    /// Product of all operands.
    Product(Vec<Value>),
    /// Negated operand.
    Negate(Box<Value>),
    /// `then` if `condition` is true, else `otherwise`.
    Conditional {
        condition: Box<Value>,
        then: Box<Value>,
        otherwise: Box<Value>,
    },
}

impl Value {
    /// The unset value.
    pub fn unset() -> Self {
        Value::Constant(None)
    }

    /// A stat's total.
    pub fn stat(stat: Stat) -> Self {
        Value::Stat {
            stat,
            node_type: NodeType::Total,
        }
    }

    /// A stat's stage.
    pub fn stat_stage(stat: Stat, node_type: NodeType) -> Self {
        Value::Stat { stat, node_type }
    }

    /// The total of the only stat in `stats`.
    ///
    /// Expressions that structurally need exactly one stat are rejected here,
    /// before any modifier is built from them.
    pub fn single_stat(stats: &[Stat]) -> Result<Self, StatError> {
        match stats {
            [stat] => Ok(Value::stat(stat.clone())),
            _ => Err(StatError::SingleStatRequired { found: stats.len() }),
        }
    }

    pub fn sum(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Sum(values.into_iter().collect())
    }

    pub fn product(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Product(values.into_iter().collect())
    }

    pub fn negate(value: Value) -> Self {
        Value::Negate(Box::new(value))
    }

    pub fn conditional(condition: Value, then: Value, otherwise: Value) -> Self {
        Value::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

impl Calculable for Value {
    fn calculate(&self, context: &dyn CalculationContext) -> Option<NodeValue> {
        match self {
            Value::Constant(value) => *value,
            Value::Stat { stat, node_type } => {
                context.get_value(stat, *node_type, &PathDefinition::main())
            }
            Value::Sum(values) => values
                .iter()
                .try_fold(NodeValue::ZERO, |sum, value| Some(sum + value.calculate(context)?)),
            Value::Product(values) => values
                .iter()
                .try_fold(NodeValue::ONE, |product, value| Some(product * value.calculate(context)?)),
            Value::Negate(value) => value.calculate(context).map(|v| -v),
            Value::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if condition.calculate(context).is_true() {
                    then.calculate(context)
                } else {
                    otherwise.calculate(context)
                }
            }
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Constant(Some(NodeValue::from(value)))
    }
}

impl From<NodeValue> for Value {
    fn from(value: NodeValue) -> Self {
        Value::Constant(Some(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Constant(Some(NodeValue::from(value)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, values: &[Value], separator: &str) -> fmt::Result {
            f.write_str("(")?;
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    f.write_str(separator)?;
                }
                write!(f, "{}", value)?;
            }
            f.write_str(")")
        }

        match self {
            Value::Constant(Some(value)) => write!(f, "{}", value),
            Value::Constant(None) => f.write_str("null"),
            Value::Stat { stat, node_type } => write!(f, "{}.{}", stat, node_type),
            Value::Sum(values) => join(f, values, " + "),
            Value::Product(values) => join(f, values, " * "),
            Value::Negate(value) => write!(f, "-{}", value),
            Value::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticContext;
    use crate::stat::{Entity, StatFactory};

    #[test]
    fn test_constant() {
        let ctx = StaticContext::new();
        assert_eq!(Value::from(3.0).calculate(&ctx), Some(NodeValue::from(3.0)));
        assert_eq!(Value::unset().calculate(&ctx), None);
    }

    #[test]
    fn test_sum_is_strict() {
        let mut factory = StatFactory::new();
        let missing = factory.stat("Missing", Entity::Character);
        let ctx = StaticContext::new();

        let value = Value::sum([Value::from(1.0), Value::stat(missing)]);
        assert_eq!(value.calculate(&ctx), None);
        assert_eq!(
            Value::sum([Value::from(1.0), Value::from(2.0)]).calculate(&ctx),
            Some(NodeValue::from(3.0))
        );
    }

    #[test]
    fn test_conditional() {
        let mut factory = StatFactory::new();
        let flag = factory.stat("IsBlinded", Entity::Enemy);
        let mut ctx = StaticContext::new();
        let value = Value::conditional(Value::stat(flag.clone()), Value::from(20.0), Value::from(0.0));

        assert_eq!(value.calculate(&ctx), Some(NodeValue::ZERO));
        ctx.set_value(&flag, NodeType::Total, NodeValue::ONE);
        assert_eq!(value.calculate(&ctx), Some(NodeValue::from(20.0)));
    }

    #[test]
    fn test_single_stat() {
        let mut factory = StatFactory::new();
        let a = factory.stat("A", Entity::Character);
        let b = factory.stat("B", Entity::Character);

        assert_eq!(Value::single_stat(&[a.clone()]), Ok(Value::stat(a.clone())));
        assert_eq!(
            Value::single_stat(&[a, b]),
            Err(StatError::SingleStatRequired { found: 2 })
        );
        assert_eq!(Value::single_stat(&[]), Err(StatError::SingleStatRequired { found: 0 }));
    }

    #[test]
    fn test_display() {
        let value = Value::sum([Value::from(1.0), Value::negate(Value::from(2.0))]);
        assert_eq!(value.to_string(), "(1 + -2)");
    }
}
