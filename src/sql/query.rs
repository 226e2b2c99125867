//! SELECT query builder with a fluent API.
//!
//! Only the shape the translator emits is modelled: a single aggregate
//! SELECT over one anchor table plus inner joins, with WHERE, GROUP BY,
//! ORDER BY and a row limit.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression
// =============================================================================

/// A SELECT list item.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// A physical table with an optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.table.clone()));
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(match self.join_type {
            JoinType::Inner => Token::Inner,
            JoinType::Left => Token::Left,
        });
        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens_for_dialect(dialect));
        ts
    }
}

// =============================================================================
// Order By
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: SortDir,
}

impl OrderByExpr {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: SortDir::Desc,
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        ts.space().push(match self.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });
        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT statement.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    pub fn inner_join(mut self, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Inner,
            table,
            on,
        });
        self
    }

    /// Add a WHERE condition, ANDed with existing conditions.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Select);
        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens());
        }

        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        // OFFSET/FETCH dialects reject a row limit without ORDER BY;
        // `ORDER BY (SELECT NULL)` keeps the statement valid with no ordering.
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        } else if self.limit.is_some() && dialect.requires_order_by_for_limit() {
            ts.newline()
                .push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        if let Some(limit) = self.limit {
            ts.newline();
            ts.append(&dialect.emit_limit(limit));
        }

        ts
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{param, sum, table_col};
    use insta::assert_snapshot;

    fn deposits_by_country() -> Query {
        Query::new()
            .select(vec![
                table_col("p", "Country").alias("country"),
                sum(table_col("d", "Amount")).alias("deposits"),
            ])
            .from(TableRef::new("tbl_Deposits").with_alias("d"))
            .inner_join(
                TableRef::new("tbl_Players").with_alias("p"),
                table_col("d", "PlayerID").eq(table_col("p", "PlayerID")),
            )
            .filter(table_col("d", "DepositDate").between(
                param("@start"),
                param("@end"),
                false,
            ))
            .group_by(vec![table_col("p", "Country")])
            .limit(1000)
    }

    #[test]
    fn test_tsql_rendering() {
        assert_snapshot!(deposits_by_country().to_sql(Dialect::TSql), @r"
        SELECT
          [p].[Country] AS [country],
          SUM([d].[Amount]) AS [deposits]
        FROM [tbl_Deposits] AS [d]
        INNER JOIN [tbl_Players] AS [p] ON [d].[PlayerID] = [p].[PlayerID]
        WHERE [d].[DepositDate] BETWEEN @start AND @end
        GROUP BY [p].[Country]
        ORDER BY (SELECT NULL)
        OFFSET 0 ROWS FETCH NEXT 1000 ROWS ONLY
        ");
    }

    #[test]
    fn test_postgres_rendering_uses_limit() {
        let sql = deposits_by_country().to_sql(Dialect::Postgres);
        assert!(sql.contains("FROM \"tbl_Deposits\" AS \"d\""));
        assert!(sql.ends_with("LIMIT 1000"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_explicit_order_replaces_placeholder() {
        let sql = deposits_by_country()
            .order_by(vec![OrderByExpr::desc(crate::sql::expr::col("deposits"))])
            .to_sql(Dialect::TSql);
        assert!(sql.contains("ORDER BY [deposits] DESC"));
        assert!(!sql.contains("(SELECT NULL)"));
    }

    #[test]
    fn test_filters_are_anded() {
        let query = Query::new()
            .select(vec![sum(table_col("d", "Amount"))])
            .from(TableRef::new("tbl_Deposits").with_alias("d"))
            .filter(table_col("d", "Method").eq(param("@p1")))
            .filter(table_col("d", "Amount").gt(param("@p2")));
        let sql = query.to_sql(Dialect::TSql);
        assert!(sql.contains("WHERE [d].[Method] = @p1 AND [d].[Amount] > @p2"));
        assert!(!sql.contains("GROUP BY"));
    }
}
