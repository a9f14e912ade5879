use std::collections::{BTreeMap, HashMap};

use serde::{
    de,
    ser::{SerializeSeq, SerializeTuple},
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{RqliteError, Value};

/// SQL parameter container.
#[derive(Clone, Debug, PartialEq)]
pub enum Params {
    /// Positional values mapped to `?` placeholders.
    Positional(Vec<Value>),
    /// Named values mapped to `:name` style placeholders.
    Named(BTreeMap<String, Value>),
}

impl Params {
    /// Builds positional parameters.
    pub fn positional(values: impl Into<Vec<Value>>) -> Self {
        Self::Positional(values.into())
    }

    /// Builds named parameters.
    pub fn named<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self::Positional(values)
    }
}

impl<const N: usize> From<[Value; N]> for Params {
    fn from(values: [Value; N]) -> Self {
        Self::Positional(values.into())
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(values: Vec<(String, Value)>) -> Self {
        Self::Named(values.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self::Named(values)
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(values: HashMap<String, Value>) -> Self {
        Self::Named(values.into_iter().collect())
    }
}

/// One SQL statement with its parameters.
///
/// On the wire a statement is either a bare string (no parameters),
/// `[sql, p1, p2, ...]` (positional) or `[sql, {"name": value}]` (named).
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Statement parameters. Empty parameters of either kind go on the wire
    /// as a bare string and come back as `Params::default()`.
    pub params: Params,
}

impl Statement {
    /// Creates a statement from SQL text and positional or named parameters.
    ///
    /// Empty parameters are stored as `Params::default()` whatever their kind.
    pub fn new<P: Into<Params>>(sql: impl Into<String>, params: P) -> Self {
        let params = params.into();
        Self {
            sql: sql.into(),
            params: if params.is_empty() {
                Params::default()
            } else {
                params
            },
        }
    }

    /// Builds a batch of parameterless statements.
    pub fn from_sql<I, S>(sql: I) -> Vec<Statement>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        sql.into_iter().map(|sql| Statement::new(sql, ())).collect()
    }

    fn from_wire(raw: serde_json::Value) -> Result<Self, RqliteError> {
        let elements = match raw {
            serde_json::Value::String(sql) => return Ok(Statement::new(sql, ())),
            serde_json::Value::Array(elements) => elements,
            other => {
                return Err(RqliteError::Decode(format!(
                    "statement must be a string or an array, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut elements = elements.into_iter();
        let sql = match elements.next() {
            Some(serde_json::Value::String(sql)) => sql,
            Some(other) => {
                return Err(RqliteError::Decode(format!(
                    "first statement element must be a string, got {}",
                    json_kind(&other)
                )))
            }
            None => {
                return Err(RqliteError::Decode(
                    "statement array must not be empty".to_owned(),
                ))
            }
        };

        // Only the first map is meaningful for named parameters.
        let params = match elements.next() {
            None => Params::default(),
            Some(serde_json::Value::Object(entries)) => Params::Named(
                entries
                    .into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            ),
            Some(first) => Params::Positional(
                std::iter::once(first)
                    .chain(elements)
                    .map(Value::from)
                    .collect(),
            ),
        };

        Ok(Statement { sql, params })
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl Serialize for Statement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.params {
            Params::Named(values) if !values.is_empty() => {
                let mut tuple = serializer.serialize_tuple(2)?;
                tuple.serialize_element(&self.sql)?;
                tuple.serialize_element(values)?;
                tuple.end()
            }
            Params::Positional(values) if !values.is_empty() => {
                let mut seq = serializer.serialize_seq(Some(values.len() + 1))?;
                seq.serialize_element(&self.sql)?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            _ => serializer.serialize_str(&self.sql),
        }
    }
}

impl<'de> Deserialize<'de> for Statement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Statement::from_wire(raw).map_err(de::Error::custom)
    }
}

/// Encodes a batch into the request body expected by `/db/*` endpoints.
pub(crate) fn encode_statements(statements: &[Statement]) -> Result<Vec<u8>, RqliteError> {
    serde_json::to_vec(statements).map_err(|err| RqliteError::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use serde_json::json;

    use crate::{Params, Statement, Value};

    fn encode(statement: &Statement) -> serde_json::Value {
        serde_json::to_value(statement).expect("must encode")
    }

    fn decode(value: serde_json::Value) -> Statement {
        serde_json::from_value(value).expect("must decode")
    }

    #[test]
    fn parameterless_statement_is_bare_string() {
        let statement = Statement::new("CREATE TABLE foo (id INTEGER)", ());
        assert_eq!(encode(&statement), json!("CREATE TABLE foo (id INTEGER)"));
    }

    #[test]
    fn positional_statement_is_flat_array() {
        let statement = Statement::new(
            "INSERT INTO foo(name, age) VALUES(?, ?)",
            [Value::text("fiona"), Value::integer(20)],
        );
        assert_eq!(
            encode(&statement),
            json!(["INSERT INTO foo(name, age) VALUES(?, ?)", "fiona", 20])
        );
    }

    #[test]
    fn named_statement_is_sql_and_map() {
        let statement = Statement::new(
            "INSERT INTO foo(name) VALUES(:name)",
            Params::named([("name", Value::text("fiona"))]),
        );
        assert_eq!(
            encode(&statement),
            json!(["INSERT INTO foo(name) VALUES(:name)", {"name": "fiona"}])
        );
    }

    #[test]
    fn empty_named_map_encodes_as_bare_string() {
        let statement = Statement::new("SELECT 1", Params::Named(BTreeMap::new()));
        assert_eq!(encode(&statement), json!("SELECT 1"));
    }

    #[test]
    fn empty_named_params_round_trip_as_no_params() {
        let statement = Statement::new("SELECT 1", Params::Named(BTreeMap::new()));
        assert_eq!(statement.params, Params::default());
        assert_eq!(decode(encode(&statement)), statement);

        let statement = Statement::new("SELECT 1", HashMap::<String, Value>::new());
        assert_eq!(decode(encode(&statement)), statement);
    }

    #[test]
    fn round_trips_positional_and_named() {
        let statements = vec![
            Statement::new("SELECT 1", ()),
            Statement::new("SELECT 2", Params::Named(BTreeMap::new())),
            Statement::new(
                "SELECT * FROM foo WHERE id = ? AND name = ?",
                [Value::integer(42), Value::text("hello")],
            ),
            Statement::new(
                "SELECT * FROM foo WHERE id = :id AND name = :name",
                Params::named([("id", Value::integer(42)), ("name", Value::text("hello"))]),
            ),
            Statement::new("SELECT ?", [Value::Number("18446744073709551615".to_owned())]),
        ];

        let body = serde_json::to_string(&statements).expect("must encode");
        let decoded: Vec<Statement> = serde_json::from_str(&body).expect("must decode");
        assert_eq!(decoded, statements);
    }

    #[test]
    fn decode_single_element_array_has_no_params() {
        assert_eq!(decode(json!(["SELECT 1"])), Statement::new("SELECT 1", ()));
    }

    #[test]
    fn decode_uses_only_first_map() {
        let statement = decode(json!(["SELECT :a", {"a": 1}, {"b": 2}]));
        assert_eq!(
            statement.params,
            Params::named([("a", Value::integer(1))])
        );
    }

    #[test]
    fn decode_rejects_non_string_sql() {
        let err = serde_json::from_value::<Statement>(json!([1, 2])).expect_err("must fail");
        assert!(err.to_string().contains("first statement element must be a string"));
    }

    #[test]
    fn decode_rejects_empty_array_and_scalars() {
        assert!(serde_json::from_value::<Statement>(json!([])).is_err());
        assert!(serde_json::from_value::<Statement>(json!(5)).is_err());
    }

    #[test]
    fn encode_failures_are_encode_errors() {
        let err = crate::RqliteError::Encode("key must be a string".to_owned());
        assert_eq!(err.to_string(), "encode error: key must be a string");

        let body = super::encode_statements(&[Statement::new("SELECT 1", ())])
            .expect("must encode");
        assert_eq!(body, br#"["SELECT 1"]"#.to_vec());
    }

    #[test]
    fn from_sql_builds_ordered_batch() {
        let statements = Statement::from_sql(["CREATE TABLE a (x)", "SELECT * FROM a"]);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].sql, "SELECT * FROM a");
        assert!(statements[0].params.is_empty());
    }
}
