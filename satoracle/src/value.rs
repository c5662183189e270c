//! Rigid values that the oracle can assign to choice atoms, and the
//! natural semantics of comparison and arithmetic on them.
use super::{ArithOp, CmpOp};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;

/// A fully evaluated constant.  Numbers are exact rationals; integers
/// are simply rationals with a unit denominator.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Value {
    Bool(bool),
    Number(BigRational),
    Name(String),
}

impl Value {
    #[must_use]
    pub fn int(value: i64) -> Self {
        Value::Number(BigRational::from_integer(BigInt::from(value)))
    }

    #[must_use]
    pub fn ratio(numerator: i64, denominator: i64) -> Self {
        Value::Number(BigRational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        ))
    }

    #[must_use]
    pub fn name(name: &str) -> Self {
        Value::Name(name.into())
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<&BigRational> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Returns whether `lhs op rhs` holds.  Values of different
    /// kinds are only ever different, never ordered.
    #[must_use]
    pub fn compare(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
        let ordering = match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp(b),
            (Value::Name(a), Value::Name(b)) => a.cmp(b),
            _ => return op == CmpOp::Ne,
        };

        op.holds(ordering)
    }

    /// Applies `op` to two numbers.  Returns `None` when the result
    /// is undefined (division by zero, fractional exponent, ...) or
    /// when an operand is not a number.
    #[must_use]
    pub fn arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Option<Value> {
        let (a, b) = (lhs.as_number()?, rhs.as_number()?);
        let result = match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => {
                if b.is_zero() {
                    return None;
                }
                a / b
            }
            ArithOp::IntDiv => {
                if b.is_zero() {
                    return None;
                }
                (a / b).trunc()
            }
            ArithOp::Mod => {
                if b.is_zero() || !a.is_integer() || !b.is_integer() {
                    return None;
                }
                // Truncated remainder: the sign follows the dividend.
                a - b * (a / b).trunc()
            }
            ArithOp::Pow => power(a, b)?,
        };

        Some(Value::Number(result))
    }

    #[must_use]
    pub fn negate(&self) -> Option<Value> {
        self.as_number().map(|n| Value::Number(-n))
    }
}

fn power(base: &BigRational, exponent: &BigRational) -> Option<BigRational> {
    if !exponent.is_integer() {
        return None;
    }

    let exp = exponent.to_integer().abs().to_u32()?;
    let mut acc = BigRational::one();
    for _ in 0..exp {
        acc = acc * base;
    }

    if exponent.is_negative() {
        if acc.is_zero() {
            return None;
        }
        acc = acc.recip();
    }

    Some(acc)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.is_integer() => write!(f, "{}", n.to_integer()),
            Value::Number(n) => write!(f, "{}/{}", n.numer(), n.denom()),
            Value::Name(s) => write!(f, "{}", s),
        }
    }
}

impl CmpOp {
    /// Returns whether an `ordering` between two operands satisfies
    /// this operator.
    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[test]
fn test_compare() {
    assert!(Value::compare(CmpOp::Lt, &Value::int(1), &Value::int(2)));
    assert!(Value::compare(CmpOp::Eq, &Value::ratio(4, 2), &Value::int(2)));
    assert!(!Value::compare(CmpOp::Eq, &Value::int(1), &Value::name("a")));
    assert!(Value::compare(CmpOp::Ne, &Value::int(1), &Value::name("a")));
    assert!(Value::compare(CmpOp::Ge, &Value::name("b"), &Value::name("a")));
}

#[test]
fn test_arith() {
    let seven = Value::int(7);
    let two = Value::int(2);

    assert_eq!(Value::arith(ArithOp::Add, &seven, &two), Some(Value::int(9)));
    assert_eq!(
        Value::arith(ArithOp::Div, &seven, &two),
        Some(Value::ratio(7, 2))
    );
    assert_eq!(
        Value::arith(ArithOp::IntDiv, &seven, &two),
        Some(Value::int(3))
    );
    assert_eq!(
        Value::arith(ArithOp::IntDiv, &Value::int(-7), &two),
        Some(Value::int(-3))
    );
    assert_eq!(Value::arith(ArithOp::Mod, &seven, &two), Some(Value::int(1)));
    assert_eq!(Value::arith(ArithOp::Pow, &two, &seven), Some(Value::int(128)));
    assert_eq!(
        Value::arith(ArithOp::Pow, &two, &Value::int(-1)),
        Some(Value::ratio(1, 2))
    );
    assert_eq!(Value::arith(ArithOp::Div, &seven, &Value::int(0)), None);
    assert_eq!(Value::arith(ArithOp::Add, &seven, &Value::Bool(true)), None);
}

#[test]
fn test_display() {
    assert_eq!(Value::int(-3).to_string(), "-3");
    assert_eq!(Value::ratio(1, 2).to_string(), "1/2");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::name("red").to_string(), "red");
}
