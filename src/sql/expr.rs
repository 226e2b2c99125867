//! Expression AST for generated queries.
//!
//! Literal user values never appear here as literals in generated SQL:
//! the generator binds them as [`Expr::Param`] and keeps the values aside.
//! [`Expr::Literal`] is used for constants the generator itself owns
//! (the `1.0` in a ratio, the `0` in `NULLIF`).

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: `qualifier.column` or bare `column`.
    Column {
        table: Option<String>,
        column: String,
    },

    Literal(Literal),

    /// Named bind parameter (`@p1`).
    Param(String),

    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    Not(Box<Expr>),

    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// Truncate a timestamp to the start of its week or month.
    ///
    /// Spelled per dialect (`DATETRUNC` on SQL Server, `DATE_TRUNC` elsewhere).
    DateTrunc { unit: DateUnit, expr: Box<Expr> },

    Paren(Box<Expr>),

    /// Trusted SQL passed through unescaped. Never built from user input.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
}

/// Truncation units for [`Expr::DateTrunc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Day,
    Week,
    Month,
}

impl DateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateUnit::Day => "day",
            DateUnit::Week => "week",
            DateUnit::Month => "month",
        }
    }
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Render this expression for a dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                ts.push(Token::QualifiedIdent {
                    qualifier: table.clone(),
                    name: column.clone(),
                });
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                });
            }

            Expr::Param(name) => {
                ts.push(Token::Param(name.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::Not(inner) => {
                ts.push(Token::Not).space();
                ts.append(&inner.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Raw("DISTINCT".into())).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // `x IN ()` is not valid SQL; an empty list matches nothing
                if values.is_empty() {
                    ts.push(Token::LitInt(1)).space();
                    ts.push(if *negated { Token::Eq } else { Token::Ne });
                    ts.space().push(Token::LitInt(1));
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Like).space();
                ts.append(&pattern.to_tokens_for_dialect(dialect));
            }

            Expr::DateTrunc { unit, expr } => {
                let inner = expr.to_tokens_for_dialect(dialect);
                ts.append(&dialect.date_trunc(*unit, &inner));
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Render to a SQL string.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Qualified column reference (`alias.column`).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn param(name: &str) -> Expr {
    Expr::Param(name.into())
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

pub fn sum(expr: Expr) -> Expr {
    func("SUM", vec![expr])
}

pub fn avg(expr: Expr) -> Expr {
    func("AVG", vec![expr])
}

pub fn count(expr: Expr) -> Expr {
    func("COUNT", vec![expr])
}

pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
    }
}

pub fn min(expr: Expr) -> Expr {
    func("MIN", vec![expr])
}

pub fn max(expr: Expr) -> Expr {
    func("MAX", vec![expr])
}

/// `NULLIF(expr, 0)`, used to guard ratio denominators.
pub fn nullif_zero(expr: Expr) -> Expr {
    func("NULLIF", vec![expr, lit_int(0)])
}

pub fn date_trunc(unit: DateUnit, expr: Expr) -> Expr {
    Expr::DateTrunc {
        unit,
        expr: Box::new(expr),
    }
}

pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

// =============================================================================
// Fluent builder
// =============================================================================

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// Fluent operators on anything convertible to an [`Expr`].
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gt, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gte, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lte, other.into())
    }

    fn and(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::And, other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Or, other.into())
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Mul, other.into())
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Div, other.into())
    }

    fn add(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Plus, other.into())
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Minus, other.into())
    }

    fn not(self) -> Expr {
        Expr::Not(Box::new(self.into_expr()))
    }

    fn paren(self) -> Expr {
        Expr::Paren(Box::new(self.into_expr()))
    }

    fn like(self, pattern: impl Into<Expr>, negated: bool) -> Expr {
        Expr::Like {
            expr: Box::new(self.into_expr()),
            pattern: Box::new(pattern.into()),
            negated,
        }
    }

    fn in_list(self, values: Vec<Expr>, negated: bool) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated,
        }
    }

    fn between(self, low: impl Into<Expr>, high: impl Into<Expr>, negated: bool) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated,
        }
    }

    fn alias(self, name: &str) -> super::query::SelectExpr {
        super::query::SelectExpr {
            expr: self.into_expr(),
            alias: Some(name.into()),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}
