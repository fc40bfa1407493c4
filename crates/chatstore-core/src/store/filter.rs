//! Record filters.
//!
//! A [`Where`] is a conjunction of field conditions. Backends may translate
//! it into their native query language, but [`Where::matches`] is the
//! reference semantics: a missing field reads as `null`, ordering operators
//! compare numbers numerically and strings lexicographically, and values of
//! different types never satisfy an ordering operator.

use std::cmp::Ordering;

use serde_json::Value;

use super::Record;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Equals(Value),
    In(Vec<Value>),
    GreaterThan(Value),
    LessThan(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Op,
}

impl Condition {
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.field).unwrap_or(&Value::Null);
        match &self.op {
            Op::Equals(expected) => value == expected,
            Op::In(candidates) => candidates.iter().any(|c| c == value),
            Op::GreaterThan(bound) => compare_values(value, bound) == Some(Ordering::Greater),
            Op::LessThan(bound) => compare_values(value, bound) == Some(Ordering::Less),
        }
    }
}

/// Conjunction of conditions. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: Vec<Condition>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(mut self, field: impl Into<String>, op: Op) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Equals(value.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(field, Op::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::GreaterThan(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::LessThan(value.into()))
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

/// Total order used by sorts and ordering operators. `None` for
/// incomparable values (different types, nulls, objects).
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Stable in-place sort of records by one field.
pub fn sort_records(records: &mut [Record], field: &str, descending: bool) {
    records.sort_by(|a, b| {
        let ord = compare_values(
            a.get(field).unwrap_or(&Value::Null),
            b.get(field).unwrap_or(&Value::Null),
        )
        .unwrap_or(Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}
