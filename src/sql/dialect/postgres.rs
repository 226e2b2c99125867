//! PostgreSQL dialect.

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    // Uses default emit_limit (LIMIT n) and DATE_TRUNC
}
