use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

/// Largest precision an `i64` needs; `NUMERIC(19, 0)` holds every BIGINT.
pub const BIGINT_PRECISION: u32 = 19;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    /// 64-bit signed integer (BIGINT).
    Int,
    Text,
    Bool,
    /// Fixed-precision decimal.
    Numeric { precision: u32, scale: u32 },
}

impl SqlType {
    /// `NUMERIC(19, 0)`, the decimal rendition of BIGINT.
    pub fn numeric_bigint() -> Self {
        SqlType::Numeric {
            precision: BIGINT_PRECISION,
            scale: 0,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Int => f.write_str("BIGINT"),
            SqlType::Text => f.write_str("TEXT"),
            SqlType::Bool => f.write_str("BOOLEAN"),
            SqlType::Numeric { precision, scale } => write!(f, "NUMERIC({precision}, {scale})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Bool(bool),
    Numeric(BigDecimal),
    Null,
}

/// Failure converting a value between SQL types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionError {
    pub value: String,
    pub target: SqlType,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot convert {} to {}", self.value, self.target)
    }
}

impl std::error::Error for ConversionError {}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form of the value, `None` for NULL.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Bool(true) => Some("TRUE".into()),
            Value::Bool(false) => Some("FALSE".into()),
            Value::Numeric(d) => Some(d.to_string()),
            Value::Null => None,
        }
    }

    /// Convert to `target`, keeping NULL as NULL.
    pub fn convert_to(&self, target: &SqlType) -> Result<Value, ConversionError> {
        let fail = || ConversionError {
            value: self.to_string(),
            target: target.clone(),
        };

        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Int(_), SqlType::Int)
            | (Value::Text(_), SqlType::Text)
            | (Value::Bool(_), SqlType::Bool) => Ok(self.clone()),
            (Value::Int(i), SqlType::Numeric { precision, scale }) => {
                fit_numeric(BigDecimal::from(*i), *precision, *scale).ok_or_else(fail)
            }
            (Value::Numeric(d), SqlType::Numeric { precision, scale }) => {
                fit_numeric(d.clone(), *precision, *scale).ok_or_else(fail)
            }
            (Value::Numeric(d), SqlType::Int) => {
                if d.with_scale(0) != *d {
                    return Err(fail());
                }
                d.to_i64().map(Value::Int).ok_or_else(fail)
            }
            (Value::Bool(b), SqlType::Int) => Ok(Value::Int(i64::from(*b))),
            (Value::Text(s), SqlType::Int) => {
                s.trim().parse::<i64>().map(Value::Int).map_err(|_| fail())
            }
            (Value::Text(s), SqlType::Numeric { precision, scale }) => {
                let parsed = BigDecimal::from_str(s.trim()).map_err(|_| fail())?;
                fit_numeric(parsed, *precision, *scale).ok_or_else(fail)
            }
            (Value::Text(s), SqlType::Bool) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            (other, SqlType::Text) => other.to_text().map(Value::Text).ok_or_else(fail),
            _ => Err(fail()),
        }
    }

    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Numeric(a), Value::Numeric(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Numeric(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (Value::Numeric(a), Value::Int(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            _ => None,
        }
    }
}

fn fit_numeric(value: BigDecimal, precision: u32, scale: u32) -> Option<Value> {
    let scaled = value.with_scale_round(i64::from(scale), RoundingMode::HalfUp);
    if scaled.digits() > u64::from(precision) {
        return None;
    }
    Some(Value::Numeric(scaled))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_text().unwrap_or_default()),
        }
    }
}
