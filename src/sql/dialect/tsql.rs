//! T-SQL (SQL Server / Azure SQL) dialect.
//!
//! - Square bracket identifier quoting (`[name]`)
//! - OFFSET FETCH for row limits (requires ORDER BY)
//! - `N'...'` prefix for Unicode strings
//! - `DATETRUNC(unit, x)` without a quoted unit

use chrono::{DateTime, Utc};

use super::helpers;
use super::SqlDialect;
use crate::sql::expr::DateUnit;
use crate::sql::token::TokenStream;

#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        helpers::emit_limit_tsql(limit)
    }

    fn requires_order_by_for_limit(&self) -> bool {
        true
    }

    fn date_trunc(&self, unit: DateUnit, inner: &TokenStream) -> TokenStream {
        helpers::date_trunc_tsql(unit, inner)
    }

    fn format_timestamp(&self, ts: &DateTime<Utc>) -> String {
        helpers::format_timestamp_iso(ts)
    }
}
