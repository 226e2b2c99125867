//! Test helpers that parse generated SQL with sqlparser-rs.

use sqlparser::dialect::{DuckDbDialect, MsSqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Check that `sql` parses under the sqlparser dialect matching `dialect`.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{sum, table_col, ExprExt};
    use crate::sql::query::{Query, TableRef};

    #[test]
    fn test_builder_output_parses() {
        let query = Query::new()
            .select(vec![sum(table_col("d", "Amount")).alias("deposits")])
            .from(TableRef::new("tbl_Deposits").with_alias("d"))
            .limit(10);

        validate_sql(&query.to_sql(Dialect::TSql), Dialect::TSql).unwrap();
        validate_sql(&query.to_sql(Dialect::Postgres), Dialect::Postgres).unwrap();
        validate_sql(&query.to_sql(Dialect::DuckDb), Dialect::DuckDb).unwrap();
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(validate_sql("SELEC * FORM t", Dialect::TSql).is_err());
    }
}
