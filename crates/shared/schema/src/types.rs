use crate::invalid::Invalid;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Semantic type of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaType {
    Str,
    Int,
    Float,
    Bool,
}

impl SchemaType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "Str",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
        }
    }

    /// The value a node of this type falls back to when nothing else is set.
    #[must_use]
    pub fn type_default(self) -> Value {
        match self {
            Self::Str => Value::Str(String::new()),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Bool => Value::Bool(false),
        }
    }

    /// Parses the raw string form.
    ///
    /// # Errors
    /// Returns [`Invalid`] when `raw` cannot be read as this type.
    pub fn deserialize(self, raw: &str) -> Result<Value, Invalid> {
        match self {
            Self::Str => Ok(Value::Str(raw.to_owned())),
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| Invalid::new(format!("\"{raw}\" is not a number"))),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| Invalid::new(format!("\"{raw}\" is not a number"))),
            Self::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| Invalid::new(format!("\"{raw}\" is not a boolean"))),
        }
    }

    /// Renders a value of this type into its raw string form.
    ///
    /// # Errors
    /// Returns [`Invalid`] when `value` does not fit this type.
    pub fn serialize(self, value: &Value) -> Result<String, Invalid> {
        self.coerce(value.clone()).map(|v| v.to_string())
    }

    /// Converts `value` into this type, parsing strings and widening integers to floats.
    ///
    /// # Errors
    /// Returns [`Invalid`] when no lossless conversion exists.
    pub fn coerce(self, value: Value) -> Result<Value, Invalid> {
        match (self, value) {
            (Self::Str, Value::Str(s)) => Ok(Value::Str(s)),
            (Self::Int, Value::Int(n)) => Ok(Value::Int(n)),
            (Self::Float, Value::Float(x)) => Ok(Value::Float(x)),
            (Self::Float, Value::Int(n)) => Ok(Value::Float(int_to_float(n))),
            (Self::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (Self::Str, other) => Ok(Value::Str(other.to_string())),
            (kind, Value::Str(s)) => kind.deserialize(&s),
            (kind, other) => {
                Err(Invalid::new(format!("\"{other}\" is not a valid {}", kind.name())))
            },
        }
    }
}

#[allow(clippy::cast_precision_loss)]
const fn int_to_float(n: i64) -> f64 {
    n as f64
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_parses_and_rejects_garbage() {
        assert_eq!(SchemaType::Int.deserialize(" 40 ").ok(), Some(Value::Int(40)));
        let err = SchemaType::Int.deserialize("vadfw234lue").expect_err("not a number");
        assert_eq!(err.message(), "\"vadfw234lue\" is not a number");
    }

    #[test]
    fn bool_accepts_common_spellings() {
        for raw in ["true", "Yes", "ON", "1"] {
            assert_eq!(SchemaType::Bool.deserialize(raw).ok(), Some(Value::Bool(true)));
        }
        for raw in ["false", "no", "Off", "0"] {
            assert_eq!(SchemaType::Bool.deserialize(raw).ok(), Some(Value::Bool(false)));
        }
        assert!(SchemaType::Bool.deserialize("maybe").is_err());
    }

    #[test]
    fn coerce_widens_and_parses() {
        assert_eq!(SchemaType::Float.coerce(Value::Int(3)).ok(), Some(Value::Float(3.0)));
        assert_eq!(SchemaType::Int.coerce(Value::from("12")).ok(), Some(Value::Int(12)));
        assert_eq!(SchemaType::Str.coerce(Value::Int(12)).ok(), Some(Value::from("12")));
        assert!(SchemaType::Int.coerce(Value::Bool(true)).is_err());
    }

    #[test]
    fn serialize_produces_raw_strings() {
        assert_eq!(SchemaType::Int.serialize(&Value::Int(90)).ok().as_deref(), Some("90"));
        assert_eq!(SchemaType::Bool.serialize(&Value::Bool(true)).ok().as_deref(), Some("true"));
    }
}
