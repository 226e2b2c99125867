use nlq::clarification::{
    generate_clarification_prompts, ClarificationEvent, ClarificationService, ClarificationState,
};
use nlq::knowledge::{Catalog, KnowledgeBase};
use nlq::model::{
    Candidate, ConflictKind, EntityConflict, EntitySlot, MetricKind, QueryEntities,
    RelativePeriod, RequiredEntity, TimeMention, TimeRange,
};
use std::collections::HashMap;
use std::sync::Arc;

fn service() -> ClarificationService {
    ClarificationService::new(Arc::new(KnowledgeBase::new(Catalog::gaming().unwrap())), 1)
}

fn revenue_slot() -> EntitySlot<MetricKind> {
    EntitySlot::Ambiguous {
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
    }
}

/// "revenue last week this month": an open metric and two time ranges.
fn two_conflicts() -> QueryEntities {
    let mut entities = QueryEntities::new("revenue last week this month");
    entities.metrics.push(revenue_slot());
    entities.time_mentions = vec![
        TimeMention {
            text: "last week".into(),
            range: TimeRange::Relative(RelativePeriod::LastWeek),
        },
        TimeMention {
            text: "this month".into(),
            range: TimeRange::Relative(RelativePeriod::ThisMonth),
        },
    ];
    entities
}

fn answer(key: &str, value: &str) -> HashMap<String, String> {
    HashMap::from([(key.to_string(), value.to_string())])
}

#[test]
fn test_one_prompt_per_conflict() {
    let catalog = Catalog::gaming().unwrap();
    let conflicts = vec![
        EntityConflict::AmbiguousMetric {
            term: "revenue".into(),
            candidates: vec![
                Candidate {
                    kind: MetricKind::Ggr,
                    confidence: 1.0,
                },
                Candidate {
                    kind: MetricKind::NetRevenue,
                    confidence: 0.98,
                },
            ],
        },
        EntityConflict::MissingRequiredEntity {
            entity: RequiredEntity::Metric,
            unrecognized: vec!["hold".into()],
        },
    ];

    let prompts = generate_clarification_prompts(&conflicts, &catalog);
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].kind, ConflictKind::AmbiguousMetric);
    assert_eq!(prompts[0].key, conflicts[0].key());
    let values: Vec<&str> = prompts[0].options.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, vec!["ggr", "net_revenue"]);
    assert_eq!(prompts[1].options.len(), catalog.metrics.len());

    // pure: same input, same prompts
    assert_eq!(prompts, generate_clarification_prompts(&conflicts, &catalog));
}

#[test]
fn test_responses_apply_in_any_order() {
    let svc = service();
    let original = two_conflicts();
    let metric = ("AmbiguousMetric|revenue", "ggr");
    let time = ("ContradictoryTimeRange|time", "last week");

    let metric_first = svc
        .apply_clarification_responses(&original, &answer(metric.0, metric.1))
        .and_then(|e| svc.apply_clarification_responses(&e, &answer(time.0, time.1)))
        .unwrap();
    let time_first = svc
        .apply_clarification_responses(&original, &answer(time.0, time.1))
        .and_then(|e| svc.apply_clarification_responses(&e, &answer(metric.0, metric.1)))
        .unwrap();
    let together = svc
        .apply_clarification_responses(
            &original,
            &HashMap::from([
                (metric.0.to_string(), metric.1.to_string()),
                (time.0.to_string(), time.1.to_string()),
            ]),
        )
        .unwrap();

    assert_eq!(metric_first, time_first);
    assert_eq!(metric_first, together);
    assert!(!together.has_unresolved_markers());
    assert_eq!(
        together.time_range,
        Some(TimeRange::Relative(RelativePeriod::LastWeek))
    );
}

#[test]
fn test_partial_answers_keep_the_rest_open() {
    let svc = service();
    let original = two_conflicts();

    let partial = svc
        .apply_clarification_responses(&original, &answer("AmbiguousMetric|revenue", "ggr"))
        .unwrap();
    assert_eq!(partial.time_mentions.len(), 2);
    assert!(partial.has_unresolved_markers());
    assert_eq!(original, two_conflicts());

    let request = svc.request_clarification(
        &partial,
        vec![EntityConflict::ContradictoryTimeRange {
            mentions: partial.time_mentions.clone(),
        }],
    );
    assert_eq!(request.prompts.len(), 1);
    assert_eq!(request.prompts[0].options.len(), 2);
}

#[test]
fn test_state_machine_round_budget() {
    let state = ClarificationState::default()
        .transition(ClarificationEvent::Checked { conflicts: 2 })
        .and_then(|s| s.transition(ClarificationEvent::PromptsIssued))
        .unwrap();
    assert_eq!(state, ClarificationState::AwaitingClarification);

    let again = state
        .transition(ClarificationEvent::Answered {
            remaining_conflicts: 1,
            rounds: 1,
            max_rounds: 2,
        })
        .unwrap();
    assert_eq!(again, ClarificationState::AwaitingClarification);

    let failed = again
        .transition(ClarificationEvent::Answered {
            remaining_conflicts: 1,
            rounds: 2,
            max_rounds: 2,
        })
        .unwrap();
    assert_eq!(failed, ClarificationState::Failed);
    assert!(failed.is_terminal());

    assert!(failed.transition(ClarificationEvent::PromptsIssued).is_err());
}
