use std::{fmt, time::Duration};

use crate::url_values::{Field, FieldValue, UrlValues};

/// Per-client settings for [`crate::RqliteClient`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout covering the whole exchange, body included.
    ///
    /// `None` leaves the transport's own timeout policy in charge.
    pub timeout: Option<Duration>,
}

/// Read consistency level requested from the node.
///
/// [`ConsistencyLevel::Unset`] leaves the choice to the node and is never sent.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ConsistencyLevel {
    #[default]
    Unset,
    None,
    Weak,
    Strong,
    Linearizable,
    Auto,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::None => "none",
            Self::Weak => "weak",
            Self::Strong => "strong",
            Self::Linearizable => "linearizable",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `/db/execute`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecuteOptions {
    /// Wrap all statements in a single transaction.
    pub transaction: bool,
    pub pretty: bool,
    pub timings: bool,
    /// Queue the writes and acknowledge before they are committed.
    pub queue: bool,
    /// With `queue`, respond only once the queued writes are committed.
    pub wait: bool,
    /// With `wait`, how long the node waits for the commit before erroring.
    pub timeout: Duration,
}

impl UrlValues for ExecuteOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::omit_default("transaction", FieldValue::Bool(self.transaction)),
            Field::omit_default("pretty", FieldValue::Bool(self.pretty)),
            Field::omit_default("timings", FieldValue::Bool(self.timings)),
            Field::omit_default("queue", FieldValue::Bool(self.queue)),
            Field::omit_default("wait", FieldValue::Bool(self.wait)),
            Field::omit_default("timeout", FieldValue::Duration(self.timeout)),
        ]
    }
}

/// Options for `/db/query`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryOptions {
    /// Query timeout applied by the node.
    pub timeout: Duration,
    pub pretty: bool,
    pub timings: bool,
    /// Return rows as name→value maps instead of value arrays.
    pub associative: bool,
    /// Return BLOB columns as arrays of byte values.
    pub blob_as_array: bool,
    pub level: ConsistencyLevel,
    /// Only meaningful with [`ConsistencyLevel::Linearizable`].
    pub linearizable_timeout: Duration,
    /// Maximum staleness accepted with [`ConsistencyLevel::None`].
    pub freshness: Duration,
    pub freshness_strict: bool,
}

impl QueryOptions {
    fn read_fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::omit_default("timeout", FieldValue::Duration(self.timeout)),
            Field::omit_default("pretty", FieldValue::Bool(self.pretty)),
            Field::omit_default("timings", FieldValue::Bool(self.timings)),
            Field::omit_default("associative", FieldValue::Bool(self.associative)),
            Field::omit_default("blob_array", FieldValue::Bool(self.blob_as_array)),
            Field::omit_default("level", FieldValue::Level(self.level)),
            Field::omit_default(
                "linearizable_timeout",
                FieldValue::Duration(self.linearizable_timeout),
            ),
            Field::omit_default("freshness", FieldValue::Duration(self.freshness)),
            Field::omit_default("freshness_strict", FieldValue::Bool(self.freshness_strict)),
        ]
    }
}

impl UrlValues for QueryOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        self.read_fields()
    }
}

/// Options for `/db/request`: every query option plus `transaction`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestOptions {
    pub transaction: bool,
    pub query: QueryOptions,
}

impl UrlValues for RequestOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        let mut fields = vec![Field::omit_default(
            "transaction",
            FieldValue::Bool(self.transaction),
        )];
        fields.extend(self.query.read_fields());
        fields
    }
}

/// Options for `/db/backup`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BackupOptions {
    /// `"sql"` for a text dump; empty for the binary database file.
    pub format: String,
    pub vacuum: bool,
    /// Ask for a gzip-compressed backup.
    pub compress: bool,
    /// Have a follower serve its local copy instead of forwarding to the leader.
    pub no_leader: bool,
    /// Have a follower answer with a redirect instead of forwarding.
    pub redirect: bool,
}

impl UrlValues for BackupOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::omit_default("fmt", FieldValue::Str(&self.format)),
            Field::omit_default("vacuum", FieldValue::Bool(self.vacuum)),
            Field::omit_default("compress", FieldValue::Bool(self.compress)),
            Field::omit_default("noleader", FieldValue::Bool(self.no_leader)),
            Field::omit_default("redirect", FieldValue::Bool(self.redirect)),
        ]
    }
}

/// Options for `/db/load`. The content type is detected from the data itself.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadOptions {
    pub redirect: bool,
}

impl UrlValues for LoadOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![Field::omit_default("redirect", FieldValue::Bool(self.redirect))]
    }
}

/// Options for `/nodes`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeOptions {
    /// Include non-voting nodes.
    pub non_voters: bool,
    /// Response format version, e.g. `"2"`.
    pub version: String,
    pub pretty: bool,
    /// How long to wait for each node to report.
    pub timeout: Duration,
}

impl UrlValues for NodeOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::omit_default("nonvoters", FieldValue::Bool(self.non_voters)),
            Field::omit_default("ver", FieldValue::Str(&self.version)),
            Field::omit_default("pretty", FieldValue::Bool(self.pretty)),
            Field::omit_default("timeout", FieldValue::Duration(self.timeout)),
        ]
    }
}

/// Options for `/readyz`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReadyOptions {
    /// Wait until the node has applied all committed log entries.
    pub sync: bool,
    pub timeout: Duration,
}

impl UrlValues for ReadyOptions {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::omit_default("sync", FieldValue::Bool(self.sync)),
            Field::omit_default("timeout", FieldValue::Duration(self.timeout)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        url_values::make_url_values, BackupOptions, ConsistencyLevel, ExecuteOptions,
        NodeOptions, QueryOptions, ReadyOptions, RequestOptions,
    };

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn default_options_encode_nothing() {
        assert!(make_url_values(Some(&ExecuteOptions::default())).is_empty());
        assert!(make_url_values(Some(&QueryOptions::default())).is_empty());
        assert!(make_url_values(Some(&RequestOptions::default())).is_empty());
        assert!(make_url_values(Some(&BackupOptions::default())).is_empty());
        assert!(make_url_values(Some(&NodeOptions::default())).is_empty());
    }

    #[test]
    fn execute_options_encode_queue_and_wait() {
        let options = ExecuteOptions {
            transaction: true,
            queue: true,
            wait: true,
            timeout: Duration::from_secs(5),
            ..ExecuteOptions::default()
        };
        assert_eq!(
            make_url_values(Some(&options)),
            pairs(&[
                ("transaction", "true"),
                ("queue", "true"),
                ("wait", "true"),
                ("timeout", "5s"),
            ])
        );
    }

    #[test]
    fn query_options_encode_level_and_durations() {
        let options = QueryOptions {
            associative: true,
            level: ConsistencyLevel::None,
            freshness: Duration::from_secs(1),
            freshness_strict: true,
            ..QueryOptions::default()
        };
        assert_eq!(
            make_url_values(Some(&options)),
            pairs(&[
                ("associative", "true"),
                ("level", "none"),
                ("freshness", "1s"),
                ("freshness_strict", "true"),
            ])
        );
    }

    #[test]
    fn request_options_prefix_transaction() {
        let options = RequestOptions {
            transaction: true,
            query: QueryOptions {
                level: ConsistencyLevel::Linearizable,
                linearizable_timeout: Duration::from_millis(500),
                ..QueryOptions::default()
            },
        };
        assert_eq!(
            make_url_values(Some(&options)),
            pairs(&[
                ("transaction", "true"),
                ("level", "linearizable"),
                ("linearizable_timeout", "500ms"),
            ])
        );
    }

    #[test]
    fn backup_and_node_options_use_short_keys() {
        let backup = BackupOptions {
            format: "sql".to_owned(),
            no_leader: true,
            ..BackupOptions::default()
        };
        assert_eq!(
            make_url_values(Some(&backup)),
            pairs(&[("fmt", "sql"), ("noleader", "true")])
        );

        let nodes = NodeOptions {
            non_voters: true,
            version: "2".to_owned(),
            ..NodeOptions::default()
        };
        assert_eq!(
            make_url_values(Some(&nodes)),
            pairs(&[("nonvoters", "true"), ("ver", "2")])
        );

        let ready = ReadyOptions {
            sync: true,
            ..ReadyOptions::default()
        };
        assert_eq!(make_url_values(Some(&ready)), pairs(&[("sync", "true")]));
    }
}
