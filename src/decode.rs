//! Response decoding for `/db/execute`, `/db/query` and `/db/request`.
//!
//! Query and request responses carry a `results` array whose element shape
//! depends on whether associative output was requested. The array is first
//! decoded as columnar; if that fails, as associative; if both fail the
//! response is rejected.

use serde::{de, de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::{
    wire::{AssocRecord, ColumnarRecord, Envelope, ExecuteRecord},
    ExecuteResponse, ExecuteResult, QueryResponse, QueryResult, QueryResultAssoc,
    QueryResults, RequestResponse, RequestResult, RequestResultAssoc, RequestResults,
    RqliteError,
};

fn non_empty(error: Option<String>) -> Option<String> {
    error.filter(|message| !message.is_empty())
}

/// The two shapes a `results` array can take.
enum Shape {
    Columnar(Vec<ColumnarRecord>),
    Associative(Vec<AssocRecord>),
}

fn decode_records<T: DeserializeOwned>(raw: &RawValue) -> Option<Vec<T>> {
    serde_json::from_str(raw.get()).ok()
}

fn sniff_shape(raw: Option<&RawValue>) -> Result<Shape, String> {
    let Some(raw) = raw else {
        return Ok(Shape::Columnar(Vec::new()));
    };

    if let Some(records) = decode_records::<ColumnarRecord>(raw) {
        if records.iter().all(|record| record.rows.is_none()) {
            return Ok(Shape::Columnar(records));
        }
    }
    if let Some(records) = decode_records::<AssocRecord>(raw) {
        if records
            .iter()
            .all(|record| record.columns.is_none() && record.values.is_none())
        {
            return Ok(Shape::Associative(records));
        }
    }

    Err("results match neither the columnar nor the associative shape".to_owned())
}

fn execute_result(
    last_insert_id: Option<i64>,
    rows_affected: Option<i64>,
    time: f64,
    error: Option<String>,
) -> ExecuteResult {
    ExecuteResult {
        last_insert_id: last_insert_id.unwrap_or_default(),
        rows_affected: rows_affected.unwrap_or_default(),
        time,
        error: non_empty(error),
    }
}

fn query_result(record: ColumnarRecord) -> QueryResult {
    QueryResult {
        columns: record.columns.unwrap_or_default(),
        types: record.types.unwrap_or_default(),
        values: record.values.unwrap_or_default(),
        last_insert_id: record.last_insert_id.unwrap_or_default(),
        rows_affected: record.rows_affected.unwrap_or_default(),
        time: record.time,
        error: non_empty(record.error),
    }
}

fn query_result_assoc(record: AssocRecord) -> QueryResultAssoc {
    QueryResultAssoc {
        types: record.types.unwrap_or_default(),
        rows: record.rows.unwrap_or_default(),
        last_insert_id: record.last_insert_id.unwrap_or_default(),
        rows_affected: record.rows_affected.unwrap_or_default(),
        time: record.time,
        error: non_empty(record.error),
    }
}

fn request_result(record: ColumnarRecord) -> RequestResult {
    let is_query =
        record.columns.is_some() || record.types.is_some() || record.values.is_some();
    if is_query {
        RequestResult::Query(query_result(record))
    } else {
        RequestResult::Execute(execute_result(
            record.last_insert_id,
            record.rows_affected,
            record.time,
            record.error,
        ))
    }
}

fn request_result_assoc(record: AssocRecord) -> RequestResultAssoc {
    let is_query = record.types.is_some() || record.rows.is_some();
    if is_query {
        RequestResultAssoc::Query(query_result_assoc(record))
    } else {
        RequestResultAssoc::Execute(execute_result(
            record.last_insert_id,
            record.rows_affected,
            record.time,
            record.error,
        ))
    }
}

#[derive(Deserialize)]
struct ExecuteEnvelope {
    #[serde(default)]
    results: Option<Vec<ExecuteRecord>>,
    #[serde(default)]
    time: f64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    sequence_number: i64,
    #[serde(default)]
    raft_index: u64,
}

impl<'de> Deserialize<'de> for ExecuteResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = ExecuteEnvelope::deserialize(deserializer)?;
        Ok(ExecuteResponse {
            results: envelope
                .results
                .unwrap_or_default()
                .into_iter()
                .map(|record| {
                    execute_result(
                        record.last_insert_id,
                        record.rows_affected,
                        record.time,
                        record.error,
                    )
                })
                .collect(),
            time: envelope.time,
            error: non_empty(envelope.error),
            sequence_number: envelope.sequence_number,
            raft_index: envelope.raft_index,
        })
    }
}

impl<'de> Deserialize<'de> for QueryResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::deserialize(deserializer)?;
        let results = match sniff_shape(envelope.results.as_deref()).map_err(de::Error::custom)? {
            Shape::Columnar(records) => {
                QueryResults::Columnar(records.into_iter().map(query_result).collect())
            }
            Shape::Associative(records) => {
                QueryResults::Associative(records.into_iter().map(query_result_assoc).collect())
            }
        };
        Ok(QueryResponse {
            results,
            time: envelope.time,
            error: non_empty(envelope.error),
            raft_index: envelope.raft_index,
        })
    }
}

impl<'de> Deserialize<'de> for RequestResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let envelope = Envelope::deserialize(deserializer)?;
        let results = match sniff_shape(envelope.results.as_deref()).map_err(de::Error::custom)? {
            Shape::Columnar(records) => {
                RequestResults::Columnar(records.into_iter().map(request_result).collect())
            }
            Shape::Associative(records) => RequestResults::Associative(
                records.into_iter().map(request_result_assoc).collect(),
            ),
        };
        Ok(RequestResponse {
            results,
            time: envelope.time,
            error: non_empty(envelope.error),
            raft_index: envelope.raft_index,
        })
    }
}

/// Decodes a full response body, mapping failures to [`RqliteError::Decode`].
pub(crate) fn decode_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, RqliteError> {
    serde_json::from_slice(body).map_err(|err| {
        RqliteError::Decode(format!(
            "invalid response JSON: {err}; body: {}",
            String::from_utf8_lossy(body)
        ))
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        decode::decode_response, ExecuteResponse, QueryResponse, QueryResults,
        RequestResponse, RequestResult, RequestResultAssoc, RequestResults, RqliteError,
        Value,
    };

    #[test]
    fn columnar_query_shape() {
        let response: QueryResponse = decode_response(
            br#"{"results":[{"columns":["id"],"values":[[1]]}],"time":0.1}"#,
        )
        .expect("must decode");

        let results = response.results.columnar().expect("must be columnar");
        assert_eq!(results[0].columns, vec!["id".to_owned()]);
        assert_eq!(results[0].values, vec![vec![Value::Integer(1)]]);
        assert_eq!(response.time, 0.1);
    }

    #[test]
    fn associative_query_shape() {
        let response: QueryResponse = decode_response(
            br#"{"results":[{"types":{"id":"integer"},"rows":[{"id":1}]}],"time":0.1}"#,
        )
        .expect("must decode");

        let results = response.results.associative().expect("must be associative");
        assert_eq!(results[0].types["id"], "integer");
        assert_eq!(results[0].rows[0]["id"], Value::Integer(1));
    }

    #[test]
    fn rows_without_types_is_still_associative() {
        let response: QueryResponse =
            decode_response(br#"{"results":[{"rows":[{"id":1}]}]}"#).expect("must decode");
        assert!(matches!(response.results, QueryResults::Associative(_)));
    }

    #[test]
    fn unknown_shape_is_decode_error() {
        let err = decode_response::<QueryResponse>(br#"{"results":[{"columns":5}]}"#)
            .expect_err("must fail");
        assert!(matches!(err, RqliteError::Decode(_)));

        let err = decode_response::<QueryResponse>(br#"{"results":"nope"}"#)
            .expect_err("must fail");
        assert!(matches!(err, RqliteError::Decode(_)));
    }

    #[test]
    fn missing_results_is_empty_columnar() {
        let response: QueryResponse =
            decode_response(br#"{"error":"leader not found"}"#).expect("must decode");
        assert!(response.results.is_empty());
        assert_eq!(response.has_error().map(|e| e.index), Some(None));
    }

    #[test]
    fn cell_values_keep_full_precision() {
        let response: QueryResponse = decode_response(
            br#"{"results":[{"columns":["a","b","c"],"types":["integer","integer","real"],"values":[[9223372036854775807,18446744073709551615,2.5]]}]}"#,
        )
        .expect("must decode");

        let row = &response.results.columnar().expect("columnar")[0].values[0];
        assert_eq!(row[0], Value::Integer(i64::MAX));
        assert_eq!(row[1], Value::Number("18446744073709551615".to_owned()));
        assert_eq!(row[2], Value::Float(2.5));
    }

    #[test]
    fn execute_response_fields() {
        let response: ExecuteResponse = decode_response(
            br#"{"results":[{"last_insert_id":1,"rows_affected":1,"time":0.001},{"error":"UNIQUE constraint failed"}],"time":0.002,"raft_index":12}"#,
        )
        .expect("must decode");

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].last_insert_id, 1);
        assert_eq!(response.results[0].rows_affected, 1);
        assert_eq!(response.raft_index, 12);
        let err = response.has_error().expect("must report error");
        assert_eq!(err.index, Some(1));
        assert_eq!(err.message, "UNIQUE constraint failed");
    }

    #[test]
    fn empty_error_strings_are_not_errors() {
        let response: ExecuteResponse =
            decode_response(br#"{"results":[{"rows_affected":1,"error":""}],"error":""}"#)
                .expect("must decode");
        assert_eq!(response.has_error(), None);
    }

    #[test]
    fn request_mixes_execute_and_query() {
        let response: RequestResponse = decode_response(
            br#"{"results":[{"last_insert_id":1,"rows_affected":1},{"columns":["COUNT(*)"],"types":["integer"],"values":[[1]]}]}"#,
        )
        .expect("must decode");

        let results = response.results.columnar().expect("columnar");
        assert!(matches!(results[0], RequestResult::Execute(ref r) if r.last_insert_id == 1));
        assert!(matches!(results[1], RequestResult::Query(ref r) if r.values[0][0] == Value::Integer(1)));
    }

    #[test]
    fn request_query_keeps_write_counters() {
        let response: RequestResponse = decode_response(
            br#"{"results":[{"columns":["id"],"types":["integer"],"values":[[5]],"last_insert_id":5,"rows_affected":1}]}"#,
        )
        .expect("must decode");
        let RequestResult::Query(ref result) = response.results.columnar().expect("columnar")[0]
        else {
            panic!("expected query outcome");
        };
        assert_eq!(result.values[0][0], Value::Integer(5));
        assert_eq!(result.last_insert_id, 5);
        assert_eq!(result.rows_affected, 1);

        let response: RequestResponse = decode_response(
            br#"{"results":[{"types":{"id":"integer"},"rows":[{"id":6}],"last_insert_id":6,"rows_affected":1}]}"#,
        )
        .expect("must decode");
        let RequestResultAssoc::Query(ref result) =
            response.results.associative().expect("associative")[0]
        else {
            panic!("expected query outcome");
        };
        assert_eq!(result.last_insert_id, 6);
        assert_eq!(result.rows_affected, 1);
    }

    #[test]
    fn associative_request_mixes_execute_and_query() {
        let response: RequestResponse = decode_response(
            br#"{"results":[{"last_insert_id":3,"rows_affected":1},{"types":{"n":"integer"},"rows":[{"n":2}]}]}"#,
        )
        .expect("must decode");

        let RequestResults::Associative(results) = response.results else {
            panic!("expected associative results");
        };
        assert!(matches!(results[0], RequestResultAssoc::Execute(ref r) if r.last_insert_id == 3));
        assert!(matches!(results[1], RequestResultAssoc::Query(ref r) if r.rows.len() == 1));
    }
}
