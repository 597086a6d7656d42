//! Node values.
//!
//! A [`NodeValue`] is a pair of `f64`s describing a (possibly degenerate)
//! range. Calculation results are `Option<NodeValue>`, where `None` means
//! "unset". The [`NullableValue`] extension trait spells out how `None`
//! propagates through every operation the stage formulas use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A two-ended numeric value.
///
/// Most values are single numbers, in which case `minimum == maximum`.
/// Arithmetic is applied element-wise to both ends.
///
/// # Examples
///
/// ```rust
/// use statgraph::NodeValue;
///
/// let damage = NodeValue::new(10.0, 20.0);
/// let doubled = damage * NodeValue::from(2.0);
/// assert_eq!(doubled, NodeValue::new(20.0, 40.0));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeValue {
    minimum: f64,
    maximum: f64,
}

impl NodeValue {
    /// The single value `0`.
    pub const ZERO: NodeValue = NodeValue::single(0.0);

    /// The single value `1`.
    pub const ONE: NodeValue = NodeValue::single(1.0);

    /// Create a range value.
    pub const fn new(minimum: f64, maximum: f64) -> Self {
        Self { minimum, maximum }
    }

    /// Create a value where both ends are `value`.
    pub const fn single(value: f64) -> Self {
        Self {
            minimum: value,
            maximum: value,
        }
    }

    /// The lower end.
    pub fn minimum(self) -> f64 {
        self.minimum
    }

    /// The upper end.
    pub fn maximum(self) -> f64 {
        self.maximum
    }

    /// Whether both ends are equal.
    pub fn is_single(self) -> bool {
        self.minimum == self.maximum
    }

    /// The value as a single number. Ranges report their upper end.
    pub fn single_value(self) -> f64 {
        self.maximum
    }

    /// Apply `f` to both ends.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.minimum), f(self.maximum))
    }

    /// Combine both ends element-wise with `other`.
    pub fn zip_with(self, other: Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self::new(f(self.minimum, other.minimum), f(self.maximum, other.maximum))
    }

    /// Round both ends down.
    pub fn floor(self) -> Self {
        self.map(f64::floor)
    }

    /// `true` unless the upper end is zero.
    pub fn is_true(self) -> bool {
        self.maximum != 0.0
    }

    /// Clamp both ends. Missing bounds leave that side unbounded.
    pub fn clamp_to(self, minimum: Option<NodeValue>, maximum: Option<NodeValue>) -> Self {
        let mut value = self;
        if let Some(lower) = minimum {
            value = value.zip_with(lower, f64::max);
        }
        if let Some(upper) = maximum {
            value = value.zip_with(upper, f64::min);
        }
        value
    }
}

impl From<f64> for NodeValue {
    fn from(value: f64) -> Self {
        NodeValue::single(value)
    }
}

impl From<bool> for NodeValue {
    fn from(value: bool) -> Self {
        if value {
            NodeValue::ONE
        } else {
            NodeValue::ZERO
        }
    }
}

/// Bit pattern used for equality and hashing: -0.0 folds into 0.0 and every
/// NaN into one canonical NaN.
fn canonical_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        (value + 0.0).to_bits()
    }
}

// Values are keys of modifier stacks, so equality has to be reflexive even
// for NaN and agree with `Hash`.
impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        canonical_bits(self.minimum) == canonical_bits(other.minimum)
            && canonical_bits(self.maximum) == canonical_bits(other.maximum)
    }
}

impl Eq for NodeValue {}

impl Hash for NodeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        canonical_bits(self.minimum).hash(state);
        canonical_bits(self.maximum).hash(state);
    }
}

impl Add for NodeValue {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a + b)
    }
}

impl Sub for NodeValue {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a - b)
    }
}

impl Mul for NodeValue {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a * b)
    }
}

impl Div for NodeValue {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        self.zip_with(other, |a, b| a / b)
    }
}

impl Neg for NodeValue {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|v| -v)
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.maximum)
        } else {
            write!(f, "{} to {}", self.minimum, self.maximum)
        }
    }
}

/// Null propagation rules for `Option<NodeValue>`.
///
/// Strict operations (`plus`, `minus`, `times`, `divided_by`) are unset when
/// either side is unset. Aggregations ([`sum_present`], [`product_present`])
/// skip unset operands and are unset only when every operand is.
///
/// # Examples
///
/// ```rust
/// use statgraph::{NodeValue, NullableValue};
///
/// let five = Some(NodeValue::from(5.0));
/// assert_eq!(five.plus(Some(NodeValue::from(1.0))), Some(NodeValue::from(6.0)));
/// assert_eq!(five.plus(None), None);
/// assert!(!None::<NodeValue>.is_true());
/// ```
pub trait NullableValue: Sized {
    /// Strict addition.
    fn plus(self, other: Self) -> Self;
    /// Strict subtraction.
    fn minus(self, other: Self) -> Self;
    /// Strict multiplication.
    fn times(self, other: Self) -> Self;
    /// Strict division.
    fn divided_by(self, other: Self) -> Self;
    /// Clamp; unset stays unset and unset bounds are ignored.
    fn clamp_to(self, minimum: Self, maximum: Self) -> Self;
    /// Unset is false.
    fn is_true(self) -> bool;
}

impl NullableValue for Option<NodeValue> {
    fn plus(self, other: Self) -> Self {
        Some(self? + other?)
    }

    fn minus(self, other: Self) -> Self {
        Some(self? - other?)
    }

    fn times(self, other: Self) -> Self {
        Some(self? * other?)
    }

    fn divided_by(self, other: Self) -> Self {
        Some(self? / other?)
    }

    fn clamp_to(self, minimum: Self, maximum: Self) -> Self {
        self.map(|value| value.clamp_to(minimum, maximum))
    }

    fn is_true(self) -> bool {
        self.is_some_and(NodeValue::is_true)
    }
}

/// Sum all set values. Unset if every value is unset.
pub fn sum_present(values: impl IntoIterator<Item = Option<NodeValue>>) -> Option<NodeValue> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, value| Some(acc.map_or(value, |sum| sum + value)))
}

/// Multiply all set values. Unset if every value is unset.
pub fn product_present(values: impl IntoIterator<Item = Option<NodeValue>>) -> Option<NodeValue> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, value| Some(acc.map_or(value, |product| product * value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_arithmetic() {
        let a = NodeValue::new(1.0, 3.0);
        let b = NodeValue::new(2.0, 4.0);
        assert_eq!(a + b, NodeValue::new(3.0, 7.0));
        assert_eq!(b - a, NodeValue::new(1.0, 1.0));
        assert_eq!(a * b, NodeValue::new(2.0, 12.0));
        assert_eq!(-a, NodeValue::new(-1.0, -3.0));
    }

    #[test]
    fn test_strict_propagation() {
        let some = Some(NodeValue::from(4.0));
        assert_eq!(some.times(None), None);
        assert_eq!(None::<NodeValue>.minus(some), None);
        assert_eq!(some.divided_by(Some(NodeValue::from(2.0))), Some(NodeValue::from(2.0)));
    }

    #[test]
    fn test_aggregation_skips_unset() {
        assert_eq!(sum_present(Vec::new()), None);
        assert_eq!(sum_present(vec![None, None]), None);
        assert_eq!(
            sum_present(vec![None, Some(NodeValue::from(2.0)), Some(NodeValue::from(3.0))]),
            Some(NodeValue::from(5.0))
        );
        assert_eq!(
            product_present(vec![Some(NodeValue::from(1.5)), None, Some(NodeValue::from(2.0))]),
            Some(NodeValue::from(3.0))
        );
    }

    #[test]
    fn test_clamp_with_missing_bounds() {
        let value = Some(NodeValue::from(150.0));
        assert_eq!(value.clamp_to(None, Some(NodeValue::from(100.0))), Some(NodeValue::from(100.0)));
        assert_eq!(value.clamp_to(None, None), value);
        assert_eq!(None::<NodeValue>.clamp_to(Some(NodeValue::ZERO), None), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Some(NodeValue::ONE).is_true());
        assert!(!Some(NodeValue::ZERO).is_true());
        assert!(!None::<NodeValue>.is_true());
    }

    #[test]
    fn test_negative_zero_hashes_like_zero() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |value: NodeValue| {
            let mut hasher = DefaultHasher::new();
            value.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(NodeValue::from(-0.0), NodeValue::ZERO);
        assert_eq!(hash(NodeValue::from(-0.0)), hash(NodeValue::ZERO));
    }

    #[test]
    fn test_nan_equals_itself() {
        use std::collections::HashSet;

        let nan = NodeValue::from(f64::NAN);
        assert_eq!(nan, nan);
        assert_eq!(nan, NodeValue::from(-f64::NAN));
        assert_ne!(nan, NodeValue::ZERO);

        let mut values = HashSet::new();
        values.insert(nan);
        assert!(values.remove(&NodeValue::from(f64::NAN)));
        assert!(values.is_empty());
    }
}
