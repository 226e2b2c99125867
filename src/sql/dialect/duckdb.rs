//! DuckDB dialect. PostgreSQL-compatible for everything the translator emits.

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }
}
