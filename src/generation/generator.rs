//! Rendering mapped entities into one parameterized SELECT.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::context::TranslationContext;
use super::params::ParamValue;
use super::result::SqlTranslationResult;
use super::security::{RowLevelSecurity, SecurityScope};
use super::GenerationError;
use crate::knowledge::{Aggregation, ColumnRef, FormulaOp, KnowledgeBase, KnowledgeError};
use crate::mapping::{
    DimensionMapping, FilterMapping, MappedQueryEntities, MetricBinding, MetricMapping, SortKey,
    SortMapping,
};
use crate::model::{FilterOperator, Granularity, SortDirection};
use crate::sql::{
    avg, col, count, count_distinct, date_trunc, lit_float, max, min, nullif_zero, param, sum,
    table_col, DateUnit, Dialect, Expr, ExprExt, OrderByExpr, Query, SelectExpr, TableRef,
};

pub struct SqlGenerator {
    knowledge: Arc<KnowledgeBase>,
    dialect: Dialect,
    security: Option<Arc<dyn RowLevelSecurity>>,
}

impl SqlGenerator {
    pub fn new(knowledge: Arc<KnowledgeBase>, dialect: Dialect) -> Self {
        Self {
            knowledge,
            dialect,
            security: None,
        }
    }

    pub fn with_security(mut self, provider: Arc<dyn RowLevelSecurity>) -> Self {
        self.security = Some(provider);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render `mapped` to SQL.
    ///
    /// Structural failures come back as `success: false` with a message;
    /// this never returns an error.
    pub fn generate(
        &self,
        mapped: &MappedQueryEntities,
        ctx: &mut TranslationContext,
    ) -> SqlTranslationResult {
        match self.try_generate(mapped, ctx) {
            Ok(result) => {
                info!(
                    tables = result.tables_used.len(),
                    parameters = result.parameters.len(),
                    "sql generated"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, query = %mapped.query, "sql generation failed");
                SqlTranslationResult::failure(e.to_string())
            }
        }
    }

    fn try_generate(
        &self,
        mapped: &MappedQueryEntities,
        ctx: &mut TranslationContext,
    ) -> Result<SqlTranslationResult, GenerationError> {
        let anchor = mapped.anchor_table.as_str();
        let targets: Vec<&str> = mapped.tables.iter().map(String::as_str).collect();
        let steps = self
            .knowledge
            .join_graph()
            .find_join_tree(anchor, &targets)
            .map_err(|e| match e {
                KnowledgeError::NoPath { to, .. } | KnowledgeError::UnknownTable(to) => {
                    GenerationError::UnreachableTable {
                        table: to,
                        anchor: anchor.to_string(),
                    }
                }
                other => GenerationError::Knowledge(other),
            })?;

        let anchor_alias = ctx.alias(anchor);
        let mut query = Query::new().from(TableRef::new(anchor).with_alias(&anchor_alias));
        let mut tables_used = vec![anchor.to_string()];
        for step in &steps {
            let from_alias = ctx.alias(&step.from_table);
            let to_alias = ctx.alias(&step.to_table);
            query = query.inner_join(
                TableRef::new(&step.to_table).with_alias(&to_alias),
                table_col(&from_alias, &step.from_column)
                    .eq(table_col(&to_alias, &step.to_column)),
            );
            tables_used.push(step.to_table.clone());
        }
        debug!(anchor, joins = steps.len(), "join tree resolved");

        let dimension_exprs: Vec<Expr> = mapped
            .dimensions
            .iter()
            .map(|d| dimension_expr(d, ctx))
            .collect();

        let mut select: Vec<SelectExpr> = mapped
            .dimensions
            .iter()
            .zip(&dimension_exprs)
            .map(|(d, e)| e.clone().alias(d.kind.id()))
            .collect();
        select.extend(
            mapped
                .metrics
                .iter()
                .map(|m| metric_expr(m, ctx).alias(m.kind.id())),
        );
        query = query.select(select);

        for filter in &mapped.filters {
            query = query.filter(filter_expr(filter, ctx)?);
        }

        if let Some(time) = &mapped.time {
            let start = ctx.bind_named("start", ParamValue::Timestamp(time.range.start));
            let end = ctx.bind_named("end", ParamValue::Timestamp(time.range.end));
            let column = column_expr(&time.column, ctx);
            query = query.filter(column.between(param(&start), param(&end), false));
        }

        if let Some(user_id) = ctx.user_id.clone() {
            query = query.filter(self.security_predicate(&tables_used, &user_id, ctx)?);
        }

        if !dimension_exprs.is_empty() {
            query = query.group_by(dimension_exprs);
        }
        if let Some(sort) = &mapped.sort {
            query = query.order_by(vec![order_expr(sort)]);
        }
        query = query.limit(mapped.limit);

        let result = SqlTranslationResult {
            sql: query.to_sql(self.dialect),
            parameters: ctx.parameters().clone(),
            tables_used,
            explanation: explain(mapped),
            success: true,
            ..Default::default()
        };
        result.validate_parameters()?;
        Ok(result)
    }

    /// Scope the first table in join order that carries a partition column.
    fn security_predicate(
        &self,
        tables: &[String],
        user_id: &str,
        ctx: &mut TranslationContext,
    ) -> Result<Expr, GenerationError> {
        let provider = self
            .security
            .as_ref()
            .ok_or_else(|| GenerationError::SecurityUnavailable("no provider configured".into()))?;

        let catalog = self.knowledge.catalog();
        let (table, partition_column) = tables
            .iter()
            .find_map(|t| {
                let column = catalog.table(t)?.partition_column.as_deref()?;
                Some((t.as_str(), column))
            })
            .ok_or_else(|| {
                GenerationError::SecurityUnavailable(format!(
                    "no partition column on {}",
                    tables.join(", ")
                ))
            })?;

        let alias = ctx.alias(table);
        let user_param = ctx.bind_named("user_id", ParamValue::Text(user_id.to_string()));
        Ok(provider.predicate_for(&SecurityScope {
            alias: &alias,
            partition_column,
            user_param: &user_param,
            dialect: self.dialect,
        }))
    }
}

fn column_expr(column: &ColumnRef, ctx: &mut TranslationContext) -> Expr {
    let alias = ctx.alias(&column.table);
    table_col(&alias, &column.column)
}

fn aggregate(aggregation: Aggregation, expr: Expr) -> Expr {
    match aggregation {
        Aggregation::Sum => sum(expr),
        Aggregation::Avg => avg(expr),
        Aggregation::Count => count(expr),
        Aggregation::CountDistinct => count_distinct(expr),
        Aggregation::Min => min(expr),
        Aggregation::Max => max(expr),
    }
}

fn metric_expr(metric: &MetricMapping, ctx: &mut TranslationContext) -> Expr {
    match &metric.binding {
        MetricBinding::Aggregate {
            aggregation,
            column,
        } => aggregate(*aggregation, column_expr(column, ctx)),
        MetricBinding::Derived { op, left, right } => {
            let l = aggregate(left.0, column_expr(&left.1, ctx));
            let r = aggregate(right.0, column_expr(&right.1, ctx));
            match op {
                FormulaOp::Add => l.add(r),
                FormulaOp::Subtract => l.sub(r),
                FormulaOp::Multiply => l.mul(r),
                // force decimal division and keep a zero denominator from failing the query
                FormulaOp::Divide => l.mul(lit_float(1.0)).div(nullif_zero(r)),
            }
        }
    }
}

fn dimension_expr(dimension: &DimensionMapping, ctx: &mut TranslationContext) -> Expr {
    let column = column_expr(&dimension.column, ctx);
    match dimension.granularity {
        None => column,
        Some(Granularity::Day) => date_trunc(DateUnit::Day, column),
        Some(Granularity::Week) => date_trunc(DateUnit::Week, column),
        Some(Granularity::Month) => date_trunc(DateUnit::Month, column),
    }
}

fn filter_expr(
    filter: &FilterMapping,
    ctx: &mut TranslationContext,
) -> Result<Expr, GenerationError> {
    let invalid = |reason: &str| GenerationError::InvalidFilter {
        dimension: filter.dimension.id().to_string(),
        reason: reason.to_string(),
    };
    let column = column_expr(&filter.column, ctx);
    let mut bound = filter
        .values
        .iter()
        .map(|v| param(&ctx.bind(ParamValue::from_filter_value(v))));

    let expr = match filter.operator {
        FilterOperator::Eq if filter.values.len() > 1 => {
            return Ok(column.in_list(bound.collect(), filter.negated));
        }
        FilterOperator::Eq => {
            let value = bound.next().ok_or_else(|| invalid("no value"))?;
            if filter.negated {
                return Ok(column.ne(value));
            }
            column.eq(value)
        }
        FilterOperator::Gt => column.gt(bound.next().ok_or_else(|| invalid("no value"))?),
        FilterOperator::Lt => column.lt(bound.next().ok_or_else(|| invalid("no value"))?),
        FilterOperator::Like => {
            let pattern = bound.next().ok_or_else(|| invalid("no pattern"))?;
            return Ok(column.like(pattern, filter.negated));
        }
        FilterOperator::Between => {
            if filter.values.len() != 2 {
                return Err(invalid("BETWEEN needs exactly two values"));
            }
            let (Some(low), Some(high)) = (bound.next(), bound.next()) else {
                return Err(invalid("BETWEEN needs exactly two values"));
            };
            return Ok(column.between(low, high, filter.negated));
        }
    };

    Ok(if filter.negated {
        expr.paren().not()
    } else {
        expr
    })
}

fn order_expr(sort: &SortMapping) -> OrderByExpr {
    let alias = match sort.key {
        SortKey::Metric(kind) => kind.id(),
        SortKey::Dimension(kind) => kind.id(),
    };
    match sort.direction {
        SortDirection::Asc => OrderByExpr::asc(col(alias)),
        SortDirection::Desc => OrderByExpr::desc(col(alias)),
    }
}

/// One-sentence description of what the query computes.
fn explain(mapped: &MappedQueryEntities) -> String {
    let metrics: Vec<String> = mapped
        .metrics
        .iter()
        .map(|m| match &m.binding {
            MetricBinding::Aggregate { aggregation, .. } => {
                format!("{} ({})", m.name, aggregation)
            }
            MetricBinding::Derived { .. } => m.name.clone(),
        })
        .collect();
    let mut text = format!("Shows {}", metrics.join(", "));

    if !mapped.dimensions.is_empty() {
        let names: Vec<&str> = mapped.dimensions.iter().map(|d| d.name.as_str()).collect();
        text.push_str(&format!(" by {}", names.join(", ")));
    }
    for filter in &mapped.filters {
        text.push_str(&format!(
            " where {} {}{} {}",
            filter.dimension,
            if filter.negated { "NOT " } else { "" },
            filter.operator,
            filter.values.join(" or ")
        ));
    }
    if let Some(time) = &mapped.time {
        text.push_str(&format!(" from {}", time.range));
    }
    if let Some(sort) = &mapped.sort {
        let dir = match sort.direction {
            SortDirection::Asc => "lowest",
            SortDirection::Desc => "highest",
        };
        text.push_str(&format!(", {} first", dir));
    }
    text.push_str(&format!(", up to {} rows.", mapped.limit));
    text
}
