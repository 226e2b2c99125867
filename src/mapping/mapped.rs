//! Schema-bound query entities.

use serde::Serialize;

use crate::knowledge::{Aggregation, ColumnRef, FormulaOp, JoinKey};
use crate::model::{
    Comparison, DimensionKind, ExplicitRange, FilterOperator, Granularity, MetricKind,
    SortDirection,
};

/// How a metric is computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricBinding {
    Aggregate {
        aggregation: Aggregation,
        column: ColumnRef,
    },
    /// `left op right`, each side aggregated on its own.
    Derived {
        op: FormulaOp,
        left: (Aggregation, ColumnRef),
        right: (Aggregation, ColumnRef),
    },
}

impl MetricBinding {
    pub fn table(&self) -> &str {
        match self {
            MetricBinding::Aggregate { column, .. } => &column.table,
            MetricBinding::Derived { left, .. } => &left.1.table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMapping {
    pub kind: MetricKind,
    pub name: String,
    pub binding: MetricBinding,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionMapping {
    pub kind: DimensionKind,
    pub name: String,
    pub column: ColumnRef,
    /// Set for date dimensions; week and month truncate the column.
    pub granularity: Option<Granularity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterMapping {
    pub dimension: DimensionKind,
    pub column: ColumnRef,
    pub operator: FilterOperator,
    pub values: Vec<String>,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Metric(MetricKind),
    Dimension(DimensionKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortMapping {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// A resolved time range bound to the column it filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBinding {
    pub column: ColumnRef,
    pub range: ExplicitRange,
}

/// Output of query mapping, read-only from here on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedQueryEntities {
    pub query: String,
    pub metrics: Vec<MetricMapping>,
    pub dimensions: Vec<DimensionMapping>,
    pub filters: Vec<FilterMapping>,
    pub sort: Option<SortMapping>,
    pub time: Option<TimeBinding>,
    /// Table of the first metric; the FROM table.
    pub anchor_table: String,
    /// Every table a selected column lives in, anchor first.
    pub tables: Vec<String>,
    /// Foreign keys between tables in `tables`.
    pub join_keys: Vec<JoinKey>,
    pub limit: u64,
    pub comparisons: Vec<Comparison>,
}

impl MappedQueryEntities {
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricMapping> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    pub fn dimension(&self, kind: DimensionKind) -> Option<&DimensionMapping> {
        self.dimensions.iter().find(|d| d.kind == kind)
    }
}
