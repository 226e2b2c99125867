//! Row-level security injection point.
//!
//! The generator never decides who may see what. When the context carries
//! a user id it asks a [`RowLevelSecurity`] provider for a predicate over
//! the anchor table's partition column and ANDs it into the WHERE clause.
//! A user id with no provider, or with no partition column to scope, fails
//! the translation instead of emitting unscoped SQL.

use std::fmt::Debug;

use crate::sql::{raw_sql, table_col, Dialect, Expr, ExprExt, SqlDialect};

/// What a provider gets to build its predicate from.
#[derive(Debug, Clone, Copy)]
pub struct SecurityScope<'a> {
    /// Alias of the table being scoped.
    pub alias: &'a str,
    pub partition_column: &'a str,
    /// Bound parameter holding the user id, marker included.
    pub user_param: &'a str,
    pub dialect: Dialect,
}

pub trait RowLevelSecurity: Send + Sync + Debug {
    fn predicate_for(&self, scope: &SecurityScope<'_>) -> Expr;
}

/// Scopes rows to the partitions listed for the user in an access table:
/// `alias.partition IN (SELECT partition FROM access WHERE user = @user_id)`.
#[derive(Debug, Clone)]
pub struct PartitionAccess {
    pub access_table: String,
    pub partition_column: String,
    pub user_column: String,
}

impl Default for PartitionAccess {
    fn default() -> Self {
        Self {
            access_table: "tbl_User_partitions".into(),
            partition_column: "PartitionID".into(),
            user_column: "UserID".into(),
        }
    }
}

impl RowLevelSecurity for PartitionAccess {
    fn predicate_for(&self, scope: &SecurityScope<'_>) -> Expr {
        let d = scope.dialect;
        let subquery = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            d.quote_identifier(&self.partition_column),
            d.quote_identifier(&self.access_table),
            d.quote_identifier(&self.user_column),
            scope.user_param,
        );
        table_col(scope.alias, scope.partition_column).in_list(vec![raw_sql(&subquery)], false)
    }
}
