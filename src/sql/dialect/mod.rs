//! SQL dialect definitions and formatting rules.
//!
//! Each dialect implements [`SqlDialect`] for the differences that matter
//! to generated report queries:
//!
//! - Identifier quoting: `"` (Postgres/DuckDB) vs `[]` (T-SQL)
//! - Row limits: `LIMIT n` vs `OFFSET 0 ROWS FETCH NEXT n ROWS ONLY`
//! - Date truncation spelling
//! - Timestamp literals for inlined debug SQL

mod duckdb;
pub mod helpers;
mod postgres;
mod tsql;

pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use tsql::TSql;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::expr::DateUnit;
use super::token::TokenStream;

/// How SQL constructs are rendered for one database.
///
/// Defaults follow ANSI SQL where possible.
pub trait SqlDialect: fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String;

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Emit the row-limit clause.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_standard(limit)
    }

    /// Whether a row limit needs an ORDER BY to be valid.
    fn requires_order_by_for_limit(&self) -> bool {
        false
    }

    fn date_trunc(&self, unit: DateUnit, inner: &TokenStream) -> TokenStream {
        helpers::date_trunc_quoted_unit(unit, inner)
    }

    /// Timestamp literal, used when inlining parameters for display.
    fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        helpers::format_timestamp_typed(ts)
    }
}

/// Supported SQL dialects.
///
/// T-SQL is the default: the reporting warehouse runs on SQL Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    TSql,
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::TSql => &TSql,
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn requires_order_by_for_limit(&self) -> bool {
        self.dialect().requires_order_by_for_limit()
    }

    fn date_trunc(&self, unit: DateUnit, inner: &TokenStream) -> TokenStream {
        self.dialect().date_trunc(unit, inner)
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        self.dialect().format_timestamp(ts)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "duckdb" => Ok(Dialect::DuckDb),
            other => Err(format!("unknown SQL dialect '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("TSQL".parse::<Dialect>(), Ok(Dialect::TSql));
        assert_eq!("sqlserver".parse::<Dialect>(), Ok(Dialect::TSql));
        assert_eq!("postgresql".parse::<Dialect>(), Ok(Dialect::Postgres));
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_limit_clause_per_dialect() {
        assert_eq!(
            Dialect::TSql.emit_limit(50).serialize(Dialect::TSql),
            "OFFSET 0 ROWS FETCH NEXT 50 ROWS ONLY"
        );
        assert_eq!(
            Dialect::DuckDb.emit_limit(50).serialize(Dialect::DuckDb),
            "LIMIT 50"
        );
        assert!(Dialect::TSql.requires_order_by_for_limit());
        assert!(!Dialect::Postgres.requires_order_by_for_limit());
    }

    #[test]
    fn test_default_is_tsql() {
        assert_eq!(Dialect::default(), Dialect::TSql);
        assert_eq!(Dialect::default().to_string(), "tsql");
    }
}
