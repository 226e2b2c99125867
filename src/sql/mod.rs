//! SQL generation primitives.
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    avg, col, count, count_distinct, date_trunc, func, lit_float, lit_int, lit_str, max, min,
    nullif_zero, param, raw_sql, sum, table_col, BinaryOperator, DateUnit, Expr, ExprExt, Literal,
};
pub use query::{Join, JoinType, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
