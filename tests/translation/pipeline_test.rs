use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nlq::clarification::ClarificationState;
use nlq::config::{Settings, TranslationSettings};
use nlq::extraction::{
    ExtractionError, KeywordRecognizer, RawEntity, RawEntityKind, RawEntityRecognizer,
};
use nlq::knowledge::{Catalog, FixedClock, KnowledgeBase};
use nlq::model::{DimensionKind, MetricKind, QueryEntities};
use nlq::sql::Dialect;
use nlq::NlqService;
use sqlparser::dialect::{MsSqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn knowledge() -> Arc<KnowledgeBase> {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap();
    Arc::new(KnowledgeBase::new(Catalog::gaming().unwrap()).with_clock(Arc::new(FixedClock(now))))
}

fn service_with(settings: TranslationSettings) -> NlqService {
    let kb = knowledge();
    let recognizer = Arc::new(KeywordRecognizer::from_catalog(kb.catalog()));
    NlqService::new(kb, recognizer, settings)
}

fn service() -> NlqService {
    service_with(TranslationSettings::default())
}

/// Returns the same spans whatever the question.
struct Scripted(Vec<RawEntity>);

#[async_trait]
impl RawEntityRecognizer for Scripted {
    async fn recognize(&self, _text: &str) -> Result<Vec<RawEntity>, ExtractionError> {
        Ok(self.0.clone())
    }
}

struct Slow;

#[async_trait]
impl RawEntityRecognizer for Slow {
    async fn recognize(&self, _text: &str) -> Result<Vec<RawEntity>, ExtractionError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_deposits_by_country_last_week() {
    let result = service()
        .process_query("total deposits by country last week", None)
        .await
        .unwrap();

    assert_eq!(result.state, ClarificationState::Resolved);
    assert!(result.conflicts.is_empty());
    let translation = result.result.as_ref().unwrap();
    assert_eq!(translation.tables_used, vec!["tbl_Deposits", "tbl_Players"]);
    assert!(translation.sql.contains("[p].[Country] AS [country]"));
    assert!(translation.sql.contains("[d].[DepositDate] BETWEEN @start AND @end"));
    translation.validate_parameters().unwrap();
    assert!(Parser::parse_sql(&MsSqlDialect {}, &translation.sql).is_ok());
}

#[tokio::test]
async fn test_metric_only_question_has_no_time_filter() {
    let result = service().process_query("GGR", None).await.unwrap();

    let sql = result.sql().unwrap();
    assert!(sql.contains("SUM([dag].[GGR]) AS [ggr]"));
    assert!(!sql.contains("BETWEEN"));
    assert!(!sql.contains("GROUP BY"));
    assert!(result.result.unwrap().parameters.is_empty());
}

#[tokio::test]
async fn test_clarification_round_trip_through_json() {
    let svc = service();
    let first = svc.process_query("show revenue by brand", None).await.unwrap();
    assert!(first.needs_clarification);
    assert_eq!(first.prompts.len(), 1);
    let values: Vec<&str> = first.prompts[0]
        .options
        .iter()
        .map(|o| o.value.as_str())
        .collect();
    assert_eq!(values, vec!["ggr", "net_revenue"]);

    // the caller keeps only the serialized entities between requests
    let held = serde_json::to_string(&first.entities).unwrap();
    let entities: QueryEntities = serde_json::from_str(&held).unwrap();
    let answers = HashMap::from([(first.prompts[0].key.clone(), "ggr".to_string())]);

    let second = svc
        .resume_with_clarification(&entities, &answers, None)
        .await
        .unwrap();
    assert_eq!(second.state, ClarificationState::Resolved);
    assert_ne!(second.query_id, first.query_id);
    let sql = second.sql().unwrap();
    assert!(sql.contains("SUM([dag].[GGR]) AS [ggr]"));
    assert!(sql.contains("GROUP BY [wl].[LabelName]"));

    let feedback = svc.knowledge().feedback().snapshot();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].term, "revenue");
    assert!(feedback[0].is_correct);
}

#[tokio::test]
async fn test_user_scope_is_applied_end_to_end() {
    let result = service()
        .process_query("total deposits by country last week", Some("analyst-7"))
        .await
        .unwrap();

    let translation = result.result.unwrap();
    assert!(translation.success, "{:?}", translation.error_message);
    assert!(translation.sql.contains(
        "[d].[WhiteLabelID] IN (SELECT [PartitionID] FROM [tbl_User_partitions] WHERE [UserID] = @user_id)"
    ));
    assert!(translation.parameters.contains_key("@user_id"));
    translation.validate_parameters().unwrap();
}

#[tokio::test]
async fn test_scripted_recognizer_spans_are_bound_to_the_catalog() {
    let question = "turnover per brand last week";
    let spans = vec![
        RawEntity::new(RawEntityKind::Metric, "turnover", 0, 8, 0.93),
        RawEntity::new(RawEntityKind::Dimension, "brand", 13, 18, 0.88),
        RawEntity::new(RawEntityKind::TimeExpression, "last week", 19, 28, 0.99),
    ];
    let svc = NlqService::new(
        knowledge(),
        Arc::new(Scripted(spans)),
        TranslationSettings::default(),
    );

    let result = svc.process_query(question, None).await.unwrap();
    assert_eq!(
        result.entities.resolved_metrics().collect::<Vec<_>>(),
        vec![MetricKind::Wagering]
    );
    assert_eq!(
        result.entities.resolved_dimensions().collect::<Vec<_>>(),
        vec![DimensionKind::WhiteLabel]
    );
    assert!(result.sql().is_some(), "{:?}", result.error);
}

#[tokio::test]
async fn test_slow_recognizer_times_out() {
    let settings = TranslationSettings {
        extraction_timeout_ms: 20,
        ..TranslationSettings::default()
    };
    let svc = NlqService::new(knowledge(), Arc::new(Slow), settings);

    let result = svc.process_query("ggr", None).await.unwrap();
    assert_eq!(result.state, ClarificationState::Failed);
    assert!(result.sql().is_none());
    assert!(result.error.unwrap().contains("timed out after 20ms"));
}

#[tokio::test]
async fn test_postgres_from_settings() {
    let settings = Settings::from_toml_str(
        r#"
        [translation]
        dialect = "postgres"
        default_row_limit = 50
        "#,
    )
    .unwrap();
    assert_eq!(settings.translation.dialect, Dialect::Postgres);

    let svc = NlqService::from_settings(&settings).unwrap();
    let result = svc.process_query("ggr by game", None).await.unwrap();
    let sql = result.sql().unwrap();
    assert!(sql.contains("\"g\".\"GameName\" AS \"game\""));
    assert!(sql.contains("LIMIT 50"));
    assert!(Parser::parse_sql(&PostgreSqlDialect {}, sql).is_ok());
}

#[tokio::test]
async fn test_colon_parameters_from_settings() {
    let settings = Settings::from_toml_str(
        r#"
        [translation]
        dialect = "postgres"
        parameter_marker = ":"
        parameter_prefix = "arg"
        "#,
    )
    .unwrap();
    let svc = NlqService::from_settings(&settings).unwrap();

    let result = svc
        .process_query("total deposits by country last week", None)
        .await
        .unwrap();
    let translation = result.result.unwrap();
    assert!(translation.sql.contains("BETWEEN :start AND :end"));
    assert_eq!(translation.referenced_parameters(), vec![":start", ":end"]);
    translation.validate_parameters().unwrap();
}

#[test]
fn test_unsupported_parameter_marker_is_rejected() {
    let err = Settings::from_toml_str("[translation]\nparameter_marker = \"?\"").unwrap_err();
    assert!(err.to_string().contains("parameter_marker must be one of @ : $"));
}
