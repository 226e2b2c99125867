use std::sync::Arc;

use chrono::{TimeZone, Utc};
use insta::assert_snapshot;
use nlq::generation::{
    GenerationError, ParamValue, PartitionAccess, SqlGenerator, SqlTranslationResult,
    TranslationContext,
};
use nlq::knowledge::{Catalog, FixedClock, KnowledgeBase};
use nlq::mapping::QueryMapper;
use nlq::model::{
    DimensionKind, Filter, FilterOperator, MetricKind, QueryEntities, RelativePeriod, Sort,
    SortDirection, SortTarget, TimeRange,
};
use nlq::sql::Dialect;
use sqlparser::dialect::{DuckDbDialect, MsSqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn knowledge() -> Arc<KnowledgeBase> {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
    Arc::new(KnowledgeBase::new(Catalog::gaming().unwrap()).with_clock(Arc::new(FixedClock(now))))
}

fn generate(
    entities: &QueryEntities,
    dialect: Dialect,
    ctx: &mut TranslationContext,
) -> SqlTranslationResult {
    let kb = knowledge();
    let mapped = QueryMapper::new(kb.clone(), 1000).map(entities).unwrap();
    SqlGenerator::new(kb, dialect)
        .with_security(Arc::new(PartitionAccess::default()))
        .generate(&mapped, ctx)
}

fn parses(sql: &str, dialect: Dialect) -> bool {
    let result = match dialect {
        Dialect::TSql => Parser::parse_sql(&MsSqlDialect {}, sql),
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        Dialect::DuckDb => Parser::parse_sql(&DuckDbDialect {}, sql),
    };
    result.is_ok()
}

fn top_games() -> QueryEntities {
    let mut entities = QueryEntities::new("top 5 games by ggr this month");
    entities.push_metric("ggr", MetricKind::Ggr, 1.0);
    entities.push_dimension("games", DimensionKind::Game, 1.0);
    entities.time_range = Some(TimeRange::Relative(RelativePeriod::ThisMonth));
    entities.sort = Some(Sort {
        target: SortTarget::PrimaryMetric,
        direction: SortDirection::Desc,
    });
    entities.limit = Some(5);
    entities
}

#[test]
fn test_top_games_tsql() {
    let mut ctx = TranslationContext::new("@", "p");
    let result = generate(&top_games(), Dialect::TSql, &mut ctx);

    assert!(result.success, "{:?}", result.error_message);
    assert!(result.sql.contains("ORDER BY [ggr] DESC"));
    assert!(result.sql.contains("FETCH NEXT 5 ROWS ONLY"));
    assert_eq!(result.referenced_parameters(), vec!["@start", "@end"]);
    result.validate_parameters().unwrap();
    assert!(parses(&result.sql, Dialect::TSql), "{}", result.sql);
}

#[test]
fn test_same_question_in_every_dialect() {
    let mut entities = top_games();
    entities.time_range = None;

    for dialect in [Dialect::TSql, Dialect::Postgres, Dialect::DuckDb] {
        let mut ctx = TranslationContext::new("@", "p");
        let result = generate(&entities, dialect, &mut ctx);
        assert!(result.success, "{dialect}: {:?}", result.error_message);
        assert!(result.parameters.is_empty());
        assert!(parses(&result.sql, dialect), "{dialect}: {}", result.sql);
    }

    let mut ctx = TranslationContext::new("@", "p");
    let postgres = generate(&entities, Dialect::Postgres, &mut ctx);
    assert!(postgres.sql.contains("SUM(\"dag\".\"GGR\") AS \"ggr\""));
    assert!(postgres.sql.contains("LIMIT 5"));
}

#[test]
fn test_filter_values_never_reach_the_sql_text() {
    let mut entities = QueryEntities::new("deposits paid with pay'n play");
    entities.push_metric("deposits", MetricKind::Deposits, 1.0);
    entities.filters.push(Filter {
        dimension: DimensionKind::PaymentMethod,
        operator: FilterOperator::Eq,
        values: vec!["Pay'n Play".into()],
        negated: false,
    });

    let mut ctx = TranslationContext::new("@", "p");
    let result = generate(&entities, Dialect::TSql, &mut ctx);
    assert!(result.success, "{:?}", result.error_message);
    assert!(!result.sql.contains("Pay'n"));
    assert_eq!(result.parameters["@p1"], ParamValue::Text("Pay'n Play".into()));
    assert!(result.inline_sql(Dialect::TSql).contains("[d].[PaymentMethod] = 'Pay''n Play'"));
    result.validate_parameters().unwrap();
}

#[test]
fn test_user_scope_and_time_share_one_parameter_map() {
    let mut entities = QueryEntities::new("deposits by brand last month");
    entities.push_metric("deposits", MetricKind::Deposits, 1.0);
    entities.push_dimension("brand", DimensionKind::WhiteLabel, 1.0);
    entities.time_range = Some(TimeRange::Relative(RelativePeriod::LastMonth));

    let mut ctx = TranslationContext::new("@", "p").with_user("analyst-7");
    let result = generate(&entities, Dialect::TSql, &mut ctx);
    assert!(result.success, "{:?}", result.error_message);

    let names: Vec<&str> = result.parameters.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["@end", "@start", "@user_id"]);
    assert_eq!(
        result.parameters["@end"],
        ParamValue::Timestamp(Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap())
    );
    result.validate_parameters().unwrap();
    assert!(parses(&result.sql, Dialect::TSql), "{}", result.sql);
}

#[test]
fn test_parameter_mismatch_is_reported_both_ways() {
    let result = SqlTranslationResult {
        sql: "SELECT 1 FROM [t] WHERE [a] = @p1".into(),
        parameters: [("@p2".to_string(), ParamValue::Number(1.0))]
            .into_iter()
            .collect(),
        success: true,
        ..Default::default()
    };

    let err = result.validate_parameters().unwrap_err();
    assert!(matches!(
        &err,
        GenerationError::ParameterMismatch { unbound, unused }
            if unbound == &["@p1"] && unused == &["@p2"]
    ));
}

#[test]
fn test_explanation_reads_as_a_sentence() {
    let mut ctx = TranslationContext::new("@", "p");
    let result = generate(&top_games(), Dialect::TSql, &mut ctx);
    assert_snapshot!(
        result.explanation,
        @"Shows GGR (SUM) by Game from 2024-03-01 to 2024-03-15, highest first, up to 5 rows."
    );
}
