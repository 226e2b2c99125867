//! Output of SQL generation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use super::params::ParamValue;
use super::GenerationError;
use crate::model::ExplicitRange;
use crate::sql::Dialect;

/// Named parameter references: `@p1`, `:start`, `$user_id`.
static PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w@:$])([@:$][A-Za-z_]\w*)").unwrap());

/// The same query over a shifted period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonQuery {
    pub sql: String,
    pub parameters: BTreeMap<String, ParamValue>,
    pub time_range: ExplicitRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SqlTranslationResult {
    pub sql: String,
    pub parameters: BTreeMap<String, ParamValue>,
    pub tables_used: Vec<String>,
    pub explanation: String,
    /// Keyed by comparison label (`previous_period`, `year_over_year`, ...).
    pub comparison_queries: BTreeMap<String, ComparisonQuery>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl SqlTranslationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Parameter names referenced in the SQL text, in first-use order.
    pub fn referenced_parameters(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        PARAM_RE
            .captures_iter(&self.sql)
            .map(|c| c[2].to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Every referenced parameter is bound and every bound one is used.
    pub fn validate_parameters(&self) -> Result<(), GenerationError> {
        let referenced: BTreeSet<String> = self.referenced_parameters().into_iter().collect();
        let bound: BTreeSet<String> = self.parameters.keys().cloned().collect();

        let unbound: Vec<String> = referenced.difference(&bound).cloned().collect();
        let unused: Vec<String> = bound.difference(&referenced).cloned().collect();
        if unbound.is_empty() && unused.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::ParameterMismatch { unbound, unused })
        }
    }

    /// SQL with parameter values inlined as literals. For logs and
    /// debugging only; execute `sql` with `parameters` instead.
    pub fn inline_sql(&self, dialect: Dialect) -> String {
        PARAM_RE
            .replace_all(&self.sql, |caps: &Captures| {
                let literal = self
                    .parameters
                    .get(&caps[2])
                    .map(|v| v.to_literal(dialect))
                    .unwrap_or_else(|| caps[2].to_string());
                format!("{}{}", &caps[1], literal)
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sql: &str, params: &[(&str, ParamValue)]) -> SqlTranslationResult {
        SqlTranslationResult {
            sql: sql.into(),
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            success: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_p1_is_not_a_prefix_of_p10() {
        let r = result(
            "SELECT 1 WHERE a = @p1 AND b = @p10",
            &[
                ("@p1", ParamValue::Text("x".into())),
                ("@p10", ParamValue::Number(2.0)),
            ],
        );
        assert_eq!(r.referenced_parameters(), vec!["@p1", "@p10"]);
        r.validate_parameters().unwrap();
        assert_eq!(r.inline_sql(Dialect::TSql), "SELECT 1 WHERE a = 'x' AND b = 2");
    }

    #[test]
    fn test_mismatch_reports_both_sides() {
        let r = result("SELECT 1 WHERE a = @p1", &[("@p2", ParamValue::Number(1.0))]);
        let Err(GenerationError::ParameterMismatch { unbound, unused }) = r.validate_parameters()
        else {
            panic!("expected mismatch");
        };
        assert_eq!(unbound, vec!["@p1"]);
        assert_eq!(unused, vec!["@p2"]);
    }

    #[test]
    fn test_quoted_identifiers_are_not_parameters() {
        let r = result("SELECT [a@b] FROM t", &[]);
        // `@b` follows a word character, so it is part of the identifier
        assert!(r.referenced_parameters().is_empty());
    }
}
