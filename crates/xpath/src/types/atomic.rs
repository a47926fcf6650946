use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::ast::AtomicType;
use crate::error::EvalError;

/// An atomized value. Node string values stay untyped until an operator
/// decides what to cast them to.
#[derive(Debug, Clone, PartialEq)]
pub enum Atomic {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    String(String),
    Boolean(bool),
    Untyped(String),
}

/// An atomic value after numeric promotion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
}

impl Atomic {
    pub fn type_name(&self) -> &'static str {
        match self {
            Atomic::Integer(_) => "xs:integer",
            Atomic::Decimal(_) => "xs:decimal",
            Atomic::Double(_) => "xs:double",
            Atomic::String(_) => "xs:string",
            Atomic::Boolean(_) => "xs:boolean",
            Atomic::Untyped(_) => "xs:untypedAtomic",
        }
    }

    /// The lexical form used by `string()` and `||`.
    pub fn to_string_value(&self) -> String {
        match self {
            Atomic::Integer(i) => i.to_string(),
            Atomic::Decimal(d) => d.normalize().to_string(),
            Atomic::Double(d) => format_double(*d),
            Atomic::String(s) | Atomic::Untyped(s) => s.clone(),
            Atomic::Boolean(b) => b.to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Atomic::Integer(_) | Atomic::Decimal(_) | Atomic::Double(_)
        )
    }

    /// Numeric view for arithmetic: untyped values are read as doubles,
    /// strings and booleans are rejected.
    pub fn to_numeric(&self, op: &str, other: &Atomic) -> Result<Numeric, EvalError> {
        match self {
            Atomic::Integer(i) => Ok(Numeric::Integer(*i)),
            Atomic::Decimal(d) => Ok(Numeric::Decimal(*d)),
            Atomic::Double(d) => Ok(Numeric::Double(*d)),
            Atomic::Untyped(s) => parse_double(s)
                .map(Numeric::Double)
                .ok_or_else(|| EvalError::cast("xs:untypedAtomic", "xs:double")),
            _ => Err(EvalError::mismatch(op, self.type_name(), other.type_name())),
        }
    }

    /// Casts to `target`, following the lexical rules of each type.
    pub fn cast(&self, target: AtomicType) -> Result<Atomic, EvalError> {
        let fail = || EvalError::cast(self.type_name(), target.name());
        let text = || self.to_string_value().trim().to_string();
        Ok(match target {
            AtomicType::AnyAtomic => self.clone(),
            AtomicType::String => Atomic::String(self.to_string_value()),
            AtomicType::Untyped => Atomic::Untyped(self.to_string_value()),
            AtomicType::Boolean => match self {
                Atomic::Boolean(b) => Atomic::Boolean(*b),
                Atomic::Integer(i) => Atomic::Boolean(*i != 0),
                Atomic::Decimal(d) => Atomic::Boolean(!d.is_zero()),
                Atomic::Double(d) => Atomic::Boolean(*d != 0.0 && !d.is_nan()),
                Atomic::String(_) | Atomic::Untyped(_) => match text().as_str() {
                    "true" | "1" => Atomic::Boolean(true),
                    "false" | "0" => Atomic::Boolean(false),
                    _ => return Err(fail()),
                },
            },
            AtomicType::Integer => match self {
                Atomic::Integer(i) => Atomic::Integer(*i),
                Atomic::Decimal(d) => Atomic::Integer(d.trunc().to_i64().ok_or_else(fail)?),
                Atomic::Double(d) if d.is_finite() => {
                    let truncated = d.trunc();
                    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                        return Err(fail());
                    }
                    Atomic::Integer(truncated as i64)
                }
                Atomic::Double(_) => return Err(fail()),
                Atomic::Boolean(b) => Atomic::Integer(i64::from(*b)),
                Atomic::String(_) | Atomic::Untyped(_) => {
                    Atomic::Integer(text().parse::<i64>().map_err(|_| fail())?)
                }
            },
            AtomicType::Decimal => match self {
                Atomic::Integer(i) => Atomic::Decimal(Decimal::from(*i)),
                Atomic::Decimal(d) => Atomic::Decimal(*d),
                Atomic::Double(d) => Atomic::Decimal(Decimal::from_f64(*d).ok_or_else(fail)?),
                Atomic::Boolean(b) => Atomic::Decimal(Decimal::from(i64::from(*b))),
                Atomic::String(_) | Atomic::Untyped(_) => {
                    let s = text();
                    if s.contains(['e', 'E']) {
                        return Err(fail());
                    }
                    Atomic::Decimal(Decimal::from_str(&s).map_err(|_| fail())?)
                }
            },
            AtomicType::Double | AtomicType::Numeric => match self {
                Atomic::Integer(i) => Atomic::Double(*i as f64),
                Atomic::Decimal(d) => Atomic::Double(d.to_f64().ok_or_else(fail)?),
                Atomic::Double(d) => Atomic::Double(*d),
                Atomic::Boolean(b) => Atomic::Double(if *b { 1.0 } else { 0.0 }),
                Atomic::String(s) | Atomic::Untyped(s) => {
                    Atomic::Double(parse_double(s).ok_or_else(fail)?)
                }
            },
        })
    }

    /// Whether this value is an instance of `ty` without casting.
    pub fn is_instance_of(&self, ty: AtomicType) -> bool {
        match ty {
            AtomicType::AnyAtomic => true,
            AtomicType::Numeric => self.is_numeric(),
            AtomicType::Integer => matches!(self, Atomic::Integer(_)),
            AtomicType::Decimal => matches!(self, Atomic::Integer(_) | Atomic::Decimal(_)),
            AtomicType::Double => matches!(self, Atomic::Double(_)),
            AtomicType::String => matches!(self, Atomic::String(_)),
            AtomicType::Boolean => matches!(self, Atomic::Boolean(_)),
            AtomicType::Untyped => matches!(self, Atomic::Untyped(_)),
        }
    }
}

impl Numeric {
    pub fn to_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            Numeric::Double(d) => d,
        }
    }

    pub fn is_nan(self) -> bool {
        matches!(self, Numeric::Double(d) if d.is_nan())
    }

    /// Orders two numbers after promoting them to a common type.
    /// `None` when either side is NaN.
    pub fn compare(self, other: Numeric) -> Option<Ordering> {
        match promote(self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(&b)),
            (Numeric::Decimal(a), Numeric::Decimal(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }
}

impl From<Numeric> for Atomic {
    fn from(n: Numeric) -> Self {
        match n {
            Numeric::Integer(i) => Atomic::Integer(i),
            Numeric::Decimal(d) => Atomic::Decimal(d),
            Numeric::Double(d) => Atomic::Double(d),
        }
    }
}

/// Integer ⊕ Decimal → Decimal, anything ⊕ Double → Double.
pub fn promote(a: Numeric, b: Numeric) -> (Numeric, Numeric) {
    match (a, b) {
        (Numeric::Integer(x), Numeric::Decimal(_)) => (Numeric::Decimal(Decimal::from(x)), b),
        (Numeric::Decimal(_), Numeric::Integer(y)) => (a, Numeric::Decimal(Decimal::from(y))),
        (Numeric::Double(_), Numeric::Double(_)) => (a, b),
        (Numeric::Double(_), _) | (_, Numeric::Double(_)) => {
            (Numeric::Double(a.to_f64()), Numeric::Double(b.to_f64()))
        }
        _ => (a, b),
    }
}

/// Reads a double the way an untyped value is cast: surrounding whitespace
/// is ignored and `INF`, `-INF`, `NaN` are accepted.
pub fn parse_double(text: &str) -> Option<f64> {
    match text.trim() {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        s if s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("nan") => None,
        s if s.eq_ignore_ascii_case("infinity") || s.eq_ignore_ascii_case("-infinity") => None,
        s => s.parse().ok(),
    }
}

pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "INF" } else { "-INF" }.to_string()
    } else if d == 0.0 && d.is_sign_negative() {
        "-0".to_string()
    } else {
        d.to_string()
    }
}

impl fmt::Display for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_lattice() {
        let (a, b) = promote(Numeric::Integer(3), Numeric::Decimal(Decimal::new(15, 1)));
        assert_eq!(a, Numeric::Decimal(Decimal::from(3)));
        assert_eq!(b, Numeric::Decimal(Decimal::new(15, 1)));

        let (a, b) = promote(Numeric::Decimal(Decimal::ONE), Numeric::Double(1.0));
        assert_eq!((a, b), (Numeric::Double(1.0), Numeric::Double(1.0)));

        let (a, b) = promote(Numeric::Integer(1), Numeric::Integer(2));
        assert_eq!((a, b), (Numeric::Integer(1), Numeric::Integer(2)));
    }

    #[test]
    fn test_numeric_compare() {
        assert_eq!(
            Numeric::Integer(2).compare(Numeric::Double(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Numeric::Double(f64::NAN).compare(Numeric::Integer(1)), None);
    }

    #[test]
    fn test_untyped_to_numeric() {
        let untyped = Atomic::Untyped(" 9.5 ".into());
        assert_eq!(
            untyped.to_numeric("+", &Atomic::Integer(1)),
            Ok(Numeric::Double(9.5))
        );
        let text = Atomic::String("9.5".into());
        assert_eq!(
            text.to_numeric("+", &Atomic::Integer(1)),
            Err(EvalError::mismatch("+", "xs:string", "xs:integer"))
        );
    }

    #[test]
    fn test_casts() {
        let s = Atomic::String("42".into());
        assert_eq!(s.cast(AtomicType::Integer), Ok(Atomic::Integer(42)));
        assert_eq!(s.cast(AtomicType::Double), Ok(Atomic::Double(42.0)));
        assert_eq!(
            Atomic::String("4.2".into()).cast(AtomicType::Integer),
            Err(EvalError::cast("xs:string", "xs:integer"))
        );
        assert_eq!(Atomic::Double(3.9).cast(AtomicType::Integer), Ok(Atomic::Integer(3)));
        assert_eq!(
            Atomic::Untyped("true".into()).cast(AtomicType::Boolean),
            Ok(Atomic::Boolean(true))
        );
        assert!(Atomic::Double(f64::NAN).cast(AtomicType::Integer).is_err());
    }

    #[test]
    fn test_string_values() {
        assert_eq!(Atomic::Double(2.0).to_string_value(), "2");
        assert_eq!(Atomic::Double(f64::NEG_INFINITY).to_string_value(), "-INF");
        assert_eq!(Atomic::Decimal(Decimal::new(450, 2)).to_string_value(), "4.5");
        assert_eq!(Atomic::Boolean(false).to_string_value(), "false");
    }

    #[test]
    fn test_parse_double() {
        assert_eq!(parse_double(" 1e2 "), Some(100.0));
        assert_eq!(parse_double("-INF"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_double("inf"), None);
        assert_eq!(parse_double("abc"), None);
    }
}
