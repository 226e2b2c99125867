//! Binding conflict-free entities to physical tables and columns.

use std::sync::Arc;

use tracing::debug;

use super::mapped::{
    DimensionMapping, FilterMapping, MappedQueryEntities, MetricBinding, MetricMapping, SortKey,
    SortMapping, TimeBinding,
};
use super::MappingError;
use crate::knowledge::{ColumnRef, DimensionDefinition, KnowledgeBase, MetricDefinition};
use crate::model::{DimensionKind, MetricKind, QueryEntities, SortTarget};

pub struct QueryMapper {
    knowledge: Arc<KnowledgeBase>,
    default_row_limit: u64,
}

impl QueryMapper {
    pub fn new(knowledge: Arc<KnowledgeBase>, default_row_limit: u64) -> Self {
        Self {
            knowledge,
            default_row_limit,
        }
    }

    /// Map entities onto the schema.
    ///
    /// Fails with [`MappingError::UnresolvedAmbiguity`] if any slot is still
    /// open; callers must run conflict detection and clarification first.
    pub fn map(&self, entities: &QueryEntities) -> Result<MappedQueryEntities, MappingError> {
        if entities.has_unresolved_markers() {
            let open: Vec<&str> = entities
                .metrics
                .iter()
                .filter(|s| s.is_ambiguous())
                .map(|s| s.term())
                .chain(
                    entities
                        .dimensions
                        .iter()
                        .filter(|s| s.is_ambiguous())
                        .map(|s| s.term()),
                )
                .chain(entities.time_mentions.iter().map(|m| m.text.as_str()))
                .collect();
            return Err(MappingError::UnresolvedAmbiguity(open.join(", ")));
        }

        let mut metric_kinds: Vec<MetricKind> = Vec::new();
        for kind in entities.resolved_metrics() {
            if !metric_kinds.contains(&kind) {
                metric_kinds.push(kind);
            }
        }
        let Some(&primary) = metric_kinds.first() else {
            return Err(MappingError::InsufficientEntities);
        };

        let catalog = self.knowledge.catalog();
        let metric_defs = metric_kinds
            .iter()
            .map(|kind| {
                catalog
                    .metric(*kind)
                    .ok_or_else(|| MappingError::Unregistered(kind.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let anchor_table = metric_defs
            .first()
            .map(|m| m.table.clone())
            .ok_or(MappingError::InsufficientEntities)?;
        let date_column = self.date_column(&anchor_table);

        let metrics = metric_defs
            .iter()
            .copied()
            .map(bind_metric)
            .collect::<Result<Vec<_>, _>>()?;

        let mut dimension_kinds: Vec<DimensionKind> = Vec::new();
        for kind in entities.resolved_dimensions() {
            if !dimension_kinds.contains(&kind) {
                dimension_kinds.push(kind);
            }
        }
        let dimensions = dimension_kinds
            .iter()
            .map(|kind| {
                let def = self.dimension_def(*kind)?;
                Ok(bind_dimension(def, date_column.as_ref()))
            })
            .collect::<Result<Vec<_>, MappingError>>()?;

        let filters = entities
            .filters
            .iter()
            .map(|f| {
                let def = self.dimension_def(f.dimension)?;
                Ok(FilterMapping {
                    dimension: f.dimension,
                    column: bind_dimension(def, date_column.as_ref()).column,
                    operator: f.operator,
                    values: f.values.clone(),
                    negated: f.negated,
                })
            })
            .collect::<Result<Vec<_>, MappingError>>()?;

        let sort = entities.sort.and_then(|s| {
            let key = match s.target {
                SortTarget::PrimaryMetric => SortKey::Metric(primary),
                SortTarget::Metric(k) if metric_kinds.contains(&k) => SortKey::Metric(k),
                SortTarget::Dimension(k) if dimension_kinds.contains(&k) => SortKey::Dimension(k),
                other => {
                    debug!(target = ?other, "sort target is not selected, dropping sort");
                    return None;
                }
            };
            Some(SortMapping {
                key,
                direction: s.direction,
            })
        });

        let time = match &entities.time_range {
            None => None,
            Some(range) => {
                let column = date_column
                    .clone()
                    .or_else(|| self.any_date_column(&metrics, &dimensions))
                    .ok_or_else(|| MappingError::NoDateColumn(anchor_table.clone()))?;
                let range = self.knowledge.resolve_time_range(range)?;
                Some(TimeBinding { column, range })
            }
        };

        let mut tables = vec![anchor_table.clone()];
        let used = metrics
            .iter()
            .map(|m| m.binding.table().to_string())
            .chain(dimensions.iter().map(|d| d.column.table.clone()))
            .chain(filters.iter().map(|f| f.column.table.clone()))
            .chain(time.iter().map(|t| t.column.table.clone()));
        for table in used {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }

        let join_keys = catalog
            .joins
            .iter()
            .filter(|k| tables.contains(&k.left) && tables.contains(&k.right))
            .cloned()
            .collect();

        let mapped = MappedQueryEntities {
            query: entities.query.clone(),
            metrics,
            dimensions,
            filters,
            sort,
            time,
            anchor_table,
            tables,
            join_keys,
            limit: entities.limit.unwrap_or(self.default_row_limit),
            comparisons: entities.comparisons.clone(),
        };
        debug!(
            anchor = %mapped.anchor_table,
            tables = mapped.tables.len(),
            "entities mapped"
        );
        Ok(mapped)
    }

    fn dimension_def(&self, kind: DimensionKind) -> Result<&DimensionDefinition, MappingError> {
        self.knowledge
            .catalog()
            .dimension(kind)
            .ok_or_else(|| MappingError::Unregistered(kind.to_string()))
    }

    fn date_column(&self, table: &str) -> Option<ColumnRef> {
        let def = self.knowledge.catalog().table(table)?;
        def.date_column
            .as_deref()
            .map(|column| ColumnRef::new(table, column))
    }

    /// First date column among the other tables the query touches.
    fn any_date_column(
        &self,
        metrics: &[MetricMapping],
        dimensions: &[DimensionMapping],
    ) -> Option<ColumnRef> {
        metrics
            .iter()
            .map(|m| m.binding.table())
            .chain(dimensions.iter().map(|d| d.column.table.as_str()))
            .find_map(|table| self.date_column(table))
    }
}

fn bind_metric(def: &MetricDefinition) -> Result<MetricMapping, MappingError> {
    let binding = match (&def.aggregation, &def.column, &def.formula) {
        (Some(aggregation), Some(column), _) => MetricBinding::Aggregate {
            aggregation: *aggregation,
            column: ColumnRef::new(&def.table, column),
        },
        (_, _, Some(formula)) => MetricBinding::Derived {
            op: formula.op,
            left: (
                formula.left.aggregation,
                ColumnRef::new(&def.table, &formula.left.column),
            ),
            right: (
                formula.right.aggregation,
                ColumnRef::new(&def.table, &formula.right.column),
            ),
        },
        _ => return Err(MappingError::Unregistered(def.kind.to_string())),
    };
    Ok(MetricMapping {
        kind: def.kind,
        name: def.name.clone(),
        binding,
    })
}

/// Date dimensions follow the anchor table's date column when it has one.
fn bind_dimension(def: &DimensionDefinition, anchor_date: Option<&ColumnRef>) -> DimensionMapping {
    let column = match anchor_date {
        Some(date) if def.is_date => date.clone(),
        _ => ColumnRef::new(&def.table, &def.column),
    };
    DimensionMapping {
        kind: def.kind,
        name: def.name.clone(),
        column,
        granularity: def.is_date.then(|| def.granularity.unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{Aggregation, Catalog, FixedClock};
    use crate::model::{
        Candidate, EntitySlot, Filter, Granularity, RelativePeriod, Sort, SortDirection,
        TimeRange,
    };
    use chrono::{TimeZone, Utc};

    fn mapper() -> QueryMapper {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
        let kb = KnowledgeBase::new(Catalog::gaming().unwrap()).with_clock(Arc::new(FixedClock(now)));
        QueryMapper::new(Arc::new(kb), 1000)
    }

    #[test]
    fn test_metric_and_dimension_on_different_tables() {
        let mut entities = QueryEntities::new("total deposits by country last week");
        entities.push_metric("deposits", MetricKind::Deposits, 1.0);
        entities.push_dimension("country", DimensionKind::Country, 1.0);
        entities.time_range = Some(TimeRange::Relative(RelativePeriod::LastWeek));

        let mapped = mapper().map(&entities).unwrap();
        assert_eq!(mapped.anchor_table, "tbl_Deposits");
        assert_eq!(mapped.tables, vec!["tbl_Deposits", "tbl_Players"]);
        assert_eq!(mapped.join_keys.len(), 1);
        assert_eq!(
            mapped.metrics[0].binding,
            MetricBinding::Aggregate {
                aggregation: Aggregation::Sum,
                column: ColumnRef::new("tbl_Deposits", "Amount"),
            }
        );
        let time = mapped.time.unwrap();
        assert_eq!(time.column, ColumnRef::new("tbl_Deposits", "DepositDate"));
        assert_eq!(time.range.start, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(mapped.limit, 1000);
    }

    #[test]
    fn test_open_slot_is_a_contract_violation() {
        let mut entities = QueryEntities::new("show revenue");
        entities.metrics.push(EntitySlot::Ambiguous {
            term: "revenue".into(),
            candidates: vec![
                Candidate {
                    kind: MetricKind::Ggr,
                    confidence: 1.0,
                },
                Candidate {
                    kind: MetricKind::NetRevenue,
                    confidence: 1.0,
                },
            ],
        });
        let err = mapper().map(&entities).unwrap_err();
        assert!(matches!(err, MappingError::UnresolvedAmbiguity(ref t) if t == "revenue"));
    }

    #[test]
    fn test_no_metric_is_insufficient() {
        let mut entities = QueryEntities::new("by country");
        entities.push_dimension("country", DimensionKind::Country, 1.0);
        assert!(matches!(
            mapper().map(&entities),
            Err(MappingError::InsufficientEntities)
        ));
    }

    #[test]
    fn test_date_dimension_follows_anchor() {
        let mut entities = QueryEntities::new("deposits by month");
        entities.push_metric("deposits", MetricKind::Deposits, 1.0);
        entities.push_dimension("month", DimensionKind::Month, 1.0);

        let mapped = mapper().map(&entities).unwrap();
        let month = mapped.dimension(DimensionKind::Month).unwrap();
        assert_eq!(month.column, ColumnRef::new("tbl_Deposits", "DepositDate"));
        assert_eq!(month.granularity, Some(Granularity::Month));
        assert_eq!(mapped.tables, vec!["tbl_Deposits"]);
        assert!(mapped.time.is_none());
    }

    #[test]
    fn test_filters_sort_and_limit() {
        let mut entities = QueryEntities::new("top 5 games by ggr on mobile");
        entities.push_metric("ggr", MetricKind::Ggr, 1.0);
        entities.push_dimension("games", DimensionKind::Game, 1.0);
        entities.filters.push(Filter::equals(DimensionKind::Device, "Mobile"));
        entities.limit = Some(5);
        entities.sort = Some(Sort {
            target: SortTarget::PrimaryMetric,
            direction: SortDirection::Desc,
        });

        let mapped = mapper().map(&entities).unwrap();
        assert_eq!(
            mapped.sort,
            Some(SortMapping {
                key: SortKey::Metric(MetricKind::Ggr),
                direction: SortDirection::Desc,
            })
        );
        assert_eq!(mapped.limit, 5);
        assert_eq!(
            mapped.filters[0].column,
            ColumnRef::new("tbl_Daily_actions_games", "Platform")
        );
        assert_eq!(mapped.tables, vec!["tbl_Daily_actions_games", "tbl_Games"]);
    }

    #[test]
    fn test_derived_metric_binding() {
        let mut entities = QueryEntities::new("rtp");
        entities.push_metric("rtp", MetricKind::Rtp, 1.0);
        let mapped = mapper().map(&entities).unwrap();
        let MetricBinding::Derived { left, right, .. } = &mapped.metrics[0].binding else {
            panic!("expected derived binding");
        };
        assert_eq!(left.1.column, "WinAmount");
        assert_eq!(right.1.column, "BetAmount");
    }
}
