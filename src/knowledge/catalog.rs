//! Catalog: the registration table behind the knowledge base.
//!
//! A catalog lists physical tables, the metrics and dimensions bound to
//! them, and the foreign-key pairs that connect tables. It is read from
//! TOML and validated once; after that it never changes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::KnowledgeError;
use crate::model::{DimensionKind, Granularity, MetricKind};

/// The built-in gaming reporting schema.
const GAMING_CATALOG: &str = include_str!("gaming.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Count => "COUNT",
            Aggregation::CountDistinct => "COUNT DISTINCT",
            Aggregation::Min => "MIN",
            Aggregation::Max => "MAX",
        })
    }
}

/// A physical column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// Column that time ranges filter on.
    #[serde(default)]
    pub date_column: Option<String>,
    /// Column used to scope rows for row-level security.
    #[serde(default)]
    pub partition_column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
}

/// One aggregated column inside a derived metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaOperand {
    pub aggregation: Aggregation,
    pub column: String,
}

/// `left op right` over columns of the metric's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub op: FormulaOp,
    pub left: FormulaOperand,
    pub right: FormulaOperand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub kind: MetricKind,
    /// Display name.
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub formula: Option<Formula>,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Historical count of users confirming this mapping.
    #[serde(default)]
    pub positive_feedback: u32,
}

/// A known value of a categorical dimension, with the words that name it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionValue {
    pub value: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionDefinition {
    pub kind: DimensionKind,
    pub name: String,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub is_date: bool,
    #[serde(default)]
    pub granularity: Option<Granularity>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub values: Vec<DimensionValue>,
    #[serde(default)]
    pub positive_feedback: u32,
}

/// Foreign-key pair `left.left_column = right.right_column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinKey {
    pub left: String,
    pub left_column: String,
    pub right: String,
    pub right_column: String,
}

impl JoinKey {
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.left == a && self.right == b) || (self.left == b && self.right == a)
    }
}

/// Validated registration table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tables: Vec<TableDefinition>,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,
    #[serde(default)]
    pub joins: Vec<JoinKey>,
}

impl Catalog {
    /// Load the built-in gaming schema.
    pub fn gaming() -> Result<Self, KnowledgeError> {
        Self::from_toml_str(GAMING_CATALOG)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, KnowledgeError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(KnowledgeError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, KnowledgeError> {
        let catalog: Catalog = toml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn metric(&self, kind: MetricKind) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.kind == kind)
    }

    pub fn dimension(&self, kind: DimensionKind) -> Option<&DimensionDefinition> {
        self.dimensions.iter().find(|d| d.kind == kind)
    }

    /// Reject catalogs that would fail at request time.
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        let mut tables = HashSet::new();
        for table in &self.tables {
            if !tables.insert(table.name.as_str()) {
                return Err(invalid(format!("table '{}' registered twice", table.name)));
            }
        }

        let mut metric_kinds = HashSet::new();
        for metric in &self.metrics {
            if !metric_kinds.insert(metric.kind) {
                return Err(invalid(format!("metric '{}' registered twice", metric.kind)));
            }
            if !tables.contains(metric.table.as_str()) {
                return Err(KnowledgeError::UnknownTable(metric.table.clone()));
            }
            match (&metric.aggregation, &metric.column, &metric.formula) {
                (Some(_), Some(_), None) | (None, None, Some(_)) => {}
                _ => {
                    return Err(invalid(format!(
                        "metric '{}' needs either aggregation and column or a formula",
                        metric.kind
                    )))
                }
            }
        }

        let mut dimension_kinds = HashSet::new();
        for dimension in &self.dimensions {
            if !dimension_kinds.insert(dimension.kind) {
                return Err(invalid(format!(
                    "dimension '{}' registered twice",
                    dimension.kind
                )));
            }
            if !tables.contains(dimension.table.as_str()) {
                return Err(KnowledgeError::UnknownTable(dimension.table.clone()));
            }
            if dimension.granularity.is_some() && !dimension.is_date {
                return Err(invalid(format!(
                    "dimension '{}' has a granularity but is not a date",
                    dimension.kind
                )));
            }
        }

        for join in &self.joins {
            for table in [&join.left, &join.right] {
                if !tables.contains(table.as_str()) {
                    return Err(KnowledgeError::UnknownTable(table.clone()));
                }
            }
        }

        let mut alias_owner: HashMap<String, &str> = HashMap::new();
        for metric in &self.metrics {
            for alias in &metric.aliases {
                alias_owner.insert(alias.to_lowercase(), "metric");
            }
        }
        for dimension in &self.dimensions {
            for alias in &dimension.aliases {
                if alias_owner.get(&alias.to_lowercase()) == Some(&"metric") {
                    return Err(invalid(format!(
                        "alias '{}' names both a metric and a dimension",
                        alias
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: String) -> KnowledgeError {
    KnowledgeError::InvalidCatalog(message)
}
