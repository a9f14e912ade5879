use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A statement parameter or a result cell.
///
/// Numbers never pass through a lossy conversion: integers that fit in 64
/// bits become [`Value::Integer`], decimals that survive an `f64` round trip
/// become [`Value::Float`], and everything else keeps its literal text in
/// [`Value::Number`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Numeric literal that has no exact `i64`/`f64` form, kept verbatim.
    Number(String),
    Text(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn null() -> Self {
        Self::Null
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn float(value: f64) -> Self {
        Self::Float(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as a float, parsing [`Value::Number`] literals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Number(literal) => literal.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

fn from_number(number: serde_json::Number) -> Value {
    if let Some(value) = number.as_i64() {
        return Value::Integer(value);
    }
    let literal = number.to_string();
    if let Ok(parsed) = literal.parse::<f64>() {
        let exact = serde_json::Number::from_f64(parsed)
            .is_some_and(|rendered| rendered.to_string() == literal);
        if exact {
            return Value::Float(parsed);
        }
    }
    Value::Number(literal)
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => from_number(number),
            serde_json::Value::String(value) => Self::Text(value),
            serde_json::Value::Array(values) => {
                Self::Array(values.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Number(literal) => match literal.parse::<serde_json::Number>() {
                Ok(number) => number.serialize(serializer),
                Err(_) => serializer.serialize_str(literal),
            },
            Self::Text(value) => serializer.serialize_str(value),
            Self::Array(values) => values.serialize(serializer),
            Self::Object(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Self::Integer(value),
            Err(_) => Self::Number(value.to_string()),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use crate::Value;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).expect("must parse")
    }

    #[test]
    fn helper_constructors() {
        assert_eq!(Value::null(), Value::Null);
        assert_eq!(Value::integer(7), Value::Integer(7));
        assert_eq!(Value::float(1.25), Value::Float(1.25));
        assert_eq!(Value::text("abc"), Value::Text("abc".to_owned()));
    }

    #[test]
    fn large_integers_keep_full_precision() {
        assert_eq!(parse("9223372036854775807"), Value::Integer(i64::MAX));
        assert_eq!(
            parse("18446744073709551615"),
            Value::Number("18446744073709551615".to_owned())
        );
        assert_eq!(
            parse("123456789012345678901234567890"),
            Value::Number("123456789012345678901234567890".to_owned())
        );
    }

    #[test]
    fn decimals_become_floats_only_when_exact() {
        assert_eq!(parse("1.5"), Value::Float(1.5));
        assert_eq!(parse("0.1"), Value::Float(0.1));
        assert_eq!(
            parse("3.14159265358979323846264338327950288"),
            Value::Number("3.14159265358979323846264338327950288".to_owned())
        );
    }

    #[test]
    fn number_literal_serializes_as_json_number() {
        let value = Value::Number("18446744073709551615".to_owned());
        assert_eq!(
            serde_json::to_string(&value).expect("must serialize"),
            "18446744073709551615"
        );
    }

    #[test]
    fn nested_values_decode() {
        let value = parse(r#"{"a":[1,"x",null,true]}"#);
        let Value::Object(entries) = value else {
            panic!("expected object");
        };
        assert_eq!(
            entries["a"],
            Value::Array(vec![
                Value::Integer(1),
                Value::text("x"),
                Value::Null,
                Value::Bool(true)
            ])
        );
    }

    #[test]
    fn unsigned_conversion_overflows_to_literal() {
        assert_eq!(Value::from(5u64), Value::Integer(5));
        assert_eq!(
            Value::from(u64::MAX),
            Value::Number(u64::MAX.to_string())
        );
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
