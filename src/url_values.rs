//! Query-string encoding for per-call options.
//!
//! Every options type lists its wire fields in [`UrlValues::fields`]. Only
//! listed fields are ever encoded, and each carries its own
//! omit-on-default flag.

use std::time::Duration;

use crate::ConsistencyLevel;

/// Typed value of one query-string field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldValue<'a> {
    Str(&'a str),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Duration(Duration),
    Level(ConsistencyLevel),
}

impl FieldValue<'_> {
    fn is_default(&self) -> bool {
        match self {
            Self::Str(value) => value.is_empty(),
            Self::Bool(value) => !value,
            Self::Int(value) => *value == 0,
            Self::Uint(value) => *value == 0,
            Self::Duration(value) => value.is_zero(),
            Self::Level(level) => *level == ConsistencyLevel::Unset,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Str(value) => (*value).to_owned(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Uint(value) => value.to_string(),
            Self::Duration(value) => format_duration(*value),
            Self::Level(level) => level.as_str().to_owned(),
        }
    }
}

/// One entry in an options type's field table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field<'a> {
    pub key: &'static str,
    pub value: FieldValue<'a>,
    pub omit_default: bool,
}

impl<'a> Field<'a> {
    /// A field that is left out of the query string when at its zero value.
    pub fn omit_default(key: &'static str, value: FieldValue<'a>) -> Self {
        Self {
            key,
            value,
            omit_default: true,
        }
    }

    /// A field that is always encoded, zero value included.
    pub fn always(key: &'static str, value: FieldValue<'a>) -> Self {
        Self {
            key,
            value,
            omit_default: false,
        }
    }
}

/// Implemented by every options type that maps onto query-string keys.
pub trait UrlValues {
    fn fields(&self) -> Vec<Field<'_>>;
}

/// Encodes `options` into ordered `key=value` pairs.
///
/// `None` yields no pairs. The unset consistency level is never encoded.
pub fn make_url_values<T: UrlValues + ?Sized>(options: Option<&T>) -> Vec<(String, String)> {
    let Some(options) = options else {
        return Vec::new();
    };
    options
        .fields()
        .into_iter()
        .filter(|field| {
            !matches!(field.value, FieldValue::Level(ConsistencyLevel::Unset))
                && !(field.omit_default && field.value.is_default())
        })
        .map(|field| (field.key.to_owned(), field.value.render()))
        .collect()
}

/// Formats a duration the way the node's duration parser expects it:
/// `0s`, `250ms`, `1.5s`, `1m30s`, `2h0m0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_owned();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 6));
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = decimal(
        u128::from(total_secs % 60) * 1_000_000_000 + u128::from(duration.subsec_nanos()),
        9,
    );

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Renders `value / 10^scale` with trailing fractional zeros trimmed.
fn decimal(value: u128, scale: u32) -> String {
    let unit = 10u128.pow(scale);
    let whole = value / unit;
    let fraction = value % unit;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = scale as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
