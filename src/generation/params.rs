//! Bound parameter values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sql::{Dialect, SqlDialect};

/// A value bound to a named SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Timestamp(DateTime<Utc>),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Parse a filter value: numbers stay numbers, everything else is text.
    pub fn from_filter_value(value: &str) -> Self {
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(value.to_string()),
        }
    }

    /// SQL literal for this value, used only for inlined debug output.
    pub fn to_literal(&self, dialect: Dialect) -> String {
        match self {
            ParamValue::Timestamp(ts) => dialect.format_timestamp(ts),
            ParamValue::Number(n) => {
                let mut buffer = ryu::Buffer::new();
                let s = buffer.format(*n);
                s.strip_suffix(".0").unwrap_or(s).to_string()
            }
            ParamValue::Text(s) => dialect.quote_string(s),
        }
    }
}
