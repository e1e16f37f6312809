use serde::Serialize;
use std::fmt;

/// The one runtime type: a 32-bit signed integer that doubles as a boolean
/// (`0` is false, anything else is true).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Value(i32);

impl Value {
    pub const ZERO: Value = Value(0);
    pub const ONE: Value = Value(1);

    pub fn new(n: i32) -> Self {
        Value(n)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    pub fn from_bool(b: bool) -> Self {
        if b {
            Value::ONE
        } else {
            Value::ZERO
        }
    }

    pub fn is_truthy(self) -> bool {
        self.0 != 0
    }

    // Arithmetic wraps on overflow, like two's-complement machine integers.

    pub fn wrapping_add(self, other: Value) -> Value {
        Value(self.0.wrapping_add(other.0))
    }

    pub fn wrapping_sub(self, other: Value) -> Value {
        Value(self.0.wrapping_sub(other.0))
    }

    pub fn wrapping_mul(self, other: Value) -> Value {
        Value(self.0.wrapping_mul(other.0))
    }

    /// Truncating division, `None` for a zero divisor
    pub fn checked_div(self, other: Value) -> Option<Value> {
        if other.0 == 0 {
            None
        } else {
            Some(Value(self.0.wrapping_div(other.0)))
        }
    }

    /// Remainder with the sign of the dividend, `None` for a zero divisor
    pub fn checked_rem(self, other: Value) -> Option<Value> {
        if other.0 == 0 {
            None
        } else {
            Some(Value(self.0.wrapping_rem(other.0)))
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::from_bool(b)
    }
}

impl From<Value> for i32 {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_truthy() {
        assert!(!Value::ZERO.is_truthy());
        assert!(Value::ONE.is_truthy());
        assert!(Value::new(-3).is_truthy());
        assert!(Value::new(i32::MIN).is_truthy());
    }

    #[test]
    fn test_from_bool() {
        assert_eq!(Value::from(true), Value::ONE);
        assert_eq!(Value::from(false), Value::ZERO);
    }

    #[test]
    fn test_arithmetic_wraps() {
        assert_eq!(Value::new(i32::MAX).wrapping_add(Value::ONE), Value::new(i32::MIN));
        assert_eq!(Value::new(i32::MIN).wrapping_sub(Value::ONE), Value::new(i32::MAX));
        assert_eq!(Value::new(1 << 16).wrapping_mul(Value::new(1 << 16)), Value::ZERO);
        assert_eq!(Value::new(i32::MIN).checked_div(Value::new(-1)), Some(Value::new(i32::MIN)));
    }

    #[test]
    fn test_division_truncates_and_remainder_follows_dividend() {
        assert_eq!(Value::new(7).checked_div(Value::new(2)), Some(Value::new(3)));
        assert_eq!(Value::new(-7).checked_div(Value::new(2)), Some(Value::new(-3)));
        assert_eq!(Value::new(-7).checked_rem(Value::new(2)), Some(Value::new(-1)));
        assert_eq!(Value::new(7).checked_rem(Value::new(-2)), Some(Value::new(1)));
    }

    #[test]
    fn test_zero_divisor() {
        assert_eq!(Value::ONE.checked_div(Value::ZERO), None);
        assert_eq!(Value::ONE.checked_rem(Value::ZERO), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::new(-42).to_string(), "-42");
        assert_eq!(i32::from(Value::new(9)), 9);
    }
}
