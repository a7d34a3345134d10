// Predicate expression tree over recordings
//
// Filters are assembled at runtime from caller input, the visibility rules
// and the tag-presence condition. They are kept as a tree until the query
// is built, then compiled into a `QueryBuilder` with every value bound as a
// parameter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::recording::types::Recording;

/// Filterable columns of the `recordings` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Column {
    Id,
    GroupId,
    DeviceId,
    Public,
    RecordingType,
    ProcessingState,
    RecordingDateTime,
    Duration,
    Version,
    Comment,
    PassedFilter,
    FileMimeType,
    BatteryLevel,
    AirplaneModeOn,
    JobKey,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Column::Id => "recordings.id",
            Column::GroupId => "recordings.group_id",
            Column::DeviceId => "recordings.device_id",
            Column::Public => "recordings.public",
            Column::RecordingType => "recordings.recording_type",
            Column::ProcessingState => "recordings.processing_state",
            Column::RecordingDateTime => "recordings.recording_date_time",
            Column::Duration => "recordings.duration",
            Column::Version => "recordings.version",
            Column::Comment => "recordings.comment",
            Column::PassedFilter => "recordings.passed_filter",
            Column::FileMimeType => "recordings.file_mime_type",
            Column::BatteryLevel => "recordings.battery_level",
            Column::AirplaneModeOn => "recordings.airplane_mode_on",
            Column::JobKey => "recordings.job_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => " = ",
            CompareOp::Ne => " <> ",
            CompareOp::Lt => " < ",
            CompareOp::Lte => " <= ",
            CompareOp::Gt => " > ",
            CompareOp::Gte => " >= ",
            CompareOp::Like => " LIKE ",
        }
    }
}

/// Bindable literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

/// Fixed SQL fragments that cannot be expressed as column comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fragment {
    /// At least one tag references the recording
    TagExists,
    /// No tag references the recording
    NoTagExists,
}

impl Fragment {
    fn as_sql(self) -> &'static str {
        match self {
            Fragment::TagExists => {
                "EXISTS (SELECT 1 FROM tags WHERE tags.recording_id = recordings.id)"
            }
            Fragment::NoTagExists => {
                "NOT EXISTS (SELECT 1 FROM tags WHERE tags.recording_id = recordings.id)"
            }
        }
    }
}

/// Boolean condition over a recording row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every row
    #[default]
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        column: Column,
        op: CompareOp,
        value: Value,
    },
    In {
        column: Column,
        values: Vec<Value>,
    },
    IsNull(Column),
    Fragment(Fragment),
}

impl Predicate {
    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Predicate::compare(column, CompareOp::Eq, value)
    }

    pub fn compare(column: Column, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn is_in<V, I>(column: Column, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::True => other,
            Predicate::And(mut terms) => {
                terms.push(other);
                Predicate::And(terms)
            }
            current => Predicate::And(vec![current, other]),
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Append this predicate to `builder`, binding every value.
    pub fn push_to(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Predicate::True => {
                builder.push("1");
            }
            Predicate::And(terms) => push_joined(builder, terms, " AND ", "1"),
            Predicate::Or(terms) => push_joined(builder, terms, " OR ", "0"),
            Predicate::Not(inner) => {
                builder.push("NOT (");
                inner.push_to(builder);
                builder.push(")");
            }
            Predicate::Compare { column, op, value } => {
                builder.push(column.as_sql());
                builder.push(op.as_sql());
                push_value(builder, value);
            }
            Predicate::In { column, values } => {
                // An empty IN list never matches.
                if values.is_empty() {
                    builder.push("0");
                    return;
                }
                builder.push(column.as_sql());
                builder.push(" IN (");
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value);
                }
                builder.push(")");
            }
            Predicate::IsNull(column) => {
                builder.push(column.as_sql());
                builder.push(" IS NULL");
            }
            Predicate::Fragment(fragment) => {
                builder.push(fragment.as_sql());
            }
        }
    }

    /// Evaluate against an in-memory recording with SQL's three-valued
    /// logic: a comparison against a NULL column is unknown, and only a
    /// definite `true` matches. `tagged` answers the tag fragments.
    pub fn matches(&self, recording: &Recording, tagged: bool) -> bool {
        self.evaluate(recording, tagged) == Some(true)
    }

    fn evaluate(&self, recording: &Recording, tagged: bool) -> Option<bool> {
        match self {
            Predicate::True => Some(true),
            Predicate::And(terms) => {
                let mut unknown = false;
                for term in terms {
                    match term.evaluate(recording, tagged) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(true)
                }
            }
            Predicate::Or(terms) => {
                let mut unknown = false;
                for term in terms {
                    match term.evaluate(recording, tagged) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown {
                    None
                } else {
                    Some(false)
                }
            }
            Predicate::Not(inner) => inner.evaluate(recording, tagged).map(|value| !value),
            Predicate::Compare { column, op, value } => {
                let actual = column_value(recording, *column)?;
                compare_values(&actual, *op, value)
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    return Some(false);
                }
                let actual = column_value(recording, *column)?;
                Some(
                    values
                        .iter()
                        .any(|value| compare_values(&actual, CompareOp::Eq, value) == Some(true)),
                )
            }
            Predicate::IsNull(column) => Some(column_value(recording, *column).is_none()),
            Predicate::Fragment(Fragment::TagExists) => Some(tagged),
            Predicate::Fragment(Fragment::NoTagExists) => Some(!tagged),
        }
    }
}

fn push_joined(
    builder: &mut QueryBuilder<'_, Sqlite>,
    terms: &[Predicate],
    separator: &str,
    empty: &str,
) {
    if terms.is_empty() {
        builder.push(empty);
        return;
    }
    builder.push("(");
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            builder.push(separator);
        }
        builder.push("(");
        term.push_to(builder);
        builder.push(")");
    }
    builder.push(")");
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Int(v) => {
            builder.push_bind(*v);
        }
        Value::Real(v) => {
            builder.push_bind(*v);
        }
        Value::Text(v) => {
            builder.push_bind(v.clone());
        }
        Value::Bool(v) => {
            builder.push_bind(*v);
        }
        Value::DateTime(v) => {
            builder.push_bind(*v);
        }
    }
}

fn column_value(recording: &Recording, column: Column) -> Option<Value> {
    match column {
        Column::Id => Some(Value::Int(recording.id)),
        Column::GroupId => Some(Value::Int(recording.group_id)),
        Column::DeviceId => Some(Value::Int(recording.device_id)),
        Column::Public => Some(Value::Bool(recording.public)),
        Column::RecordingType => recording.recording_type.clone().map(Value::Text),
        Column::ProcessingState => recording.processing_state.clone().map(Value::Text),
        Column::RecordingDateTime => recording.recording_date_time.map(Value::DateTime),
        Column::Duration => recording.duration.map(Value::Int),
        Column::Version => recording.version.clone().map(Value::Text),
        Column::Comment => recording.comment.clone().map(Value::Text),
        Column::PassedFilter => recording.passed_filter.map(Value::Bool),
        Column::FileMimeType => recording.file_mime_type.clone().map(Value::Text),
        Column::BatteryLevel => recording.battery_level.map(Value::Real),
        Column::AirplaneModeOn => recording.airplane_mode_on.map(Value::Bool),
        Column::JobKey => recording.job_key.clone().map(Value::Text),
    }
}

fn compare_values(actual: &Value, op: CompareOp, expected: &Value) -> Option<bool> {
    use std::cmp::Ordering;

    let ordering = match (actual, expected) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
        (Value::Real(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Text(a), Value::Text(b)) => {
            if op == CompareOp::Like {
                return Some(like_matches(a, b));
            }
            a.partial_cmp(b)
        }
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
        _ => None,
    };
    let ordering = ordering?;
    let result = match op {
        CompareOp::Eq | CompareOp::Like => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
    };
    Some(result)
}

/// `%` wildcard matching, case-insensitive like SQLite's ASCII LIKE.
/// SQLite `LIKE`: `%` matches any run, `_` one character, ASCII case folded.
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
