//! Shared building blocks for [`SqlDialect`](super::SqlDialect) implementations.

use chrono::{DateTime, Utc};

use super::super::expr::DateUnit;
use super::super::token::{Token, TokenStream};

// =============================================================================
// Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `N'...'` literal for non-ASCII text on SQL Server.
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Row limits
// =============================================================================

/// `LIMIT n`.
/// Used by: Postgres, DuckDB
pub fn emit_limit_standard(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Limit)
        .space()
        .push(Token::LitInt(limit as i64));
    ts
}

/// `OFFSET 0 ROWS FETCH NEXT n ROWS ONLY`. Requires ORDER BY.
/// Used by: T-SQL
pub fn emit_limit_tsql(limit: u64) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Offset)
        .space()
        .push(Token::LitInt(0))
        .space()
        .push(Token::Rows)
        .space()
        .push(Token::Fetch)
        .space()
        .push(Token::Next)
        .space()
        .push(Token::LitInt(limit as i64))
        .space()
        .push(Token::Rows)
        .space()
        .push(Token::Only);
    ts
}

// =============================================================================
// Dates
// =============================================================================

/// `DATE_TRUNC('unit', expr)`.
/// Used by: Postgres, DuckDB
pub fn date_trunc_quoted_unit(unit: DateUnit, inner: &TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("DATE_TRUNC".into()))
        .lparen()
        .push(Token::LitString(unit.as_str().into()))
        .comma()
        .space()
        .append(inner)
        .rparen();
    ts
}

/// `DATETRUNC(unit, expr)` (SQL Server 2022+).
pub fn date_trunc_tsql(unit: DateUnit, inner: &TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::FunctionName("DATETRUNC".into()))
        .lparen()
        .push(Token::Raw(unit.as_str().into()))
        .comma()
        .space()
        .append(inner)
        .rparen();
    ts
}

pub fn format_timestamp_iso(ts: &DateTime<Utc>) -> String {
    format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S"))
}

pub fn format_timestamp_typed(ts: &DateTime<Utc>) -> String {
    format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S"))
}
