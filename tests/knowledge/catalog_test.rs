use nlq::knowledge::{Aggregation, Catalog, KnowledgeBase, KnowledgeError};
use nlq::model::{DimensionKind, MetricKind};
use std::io::Write;
use std::sync::Arc;

#[test]
fn test_lookups_tolerate_case_and_synonyms() {
    let kb = KnowledgeBase::new(Catalog::gaming().unwrap());

    let turnover = kb.map_metric_to_database_field("Turnover").unwrap();
    assert_eq!(turnover.kind, MetricKind::Wagering);
    assert_eq!(turnover.aggregation, Some(Aggregation::Sum));

    let brand = kb.map_dimension_to_database_field("BRAND").unwrap();
    assert_eq!(brand.kind, DimensionKind::WhiteLabel);

    assert!(kb.map_metric_to_database_field("hold percentage").is_none());
    assert!(kb.map_dimension_to_database_field("").is_none());
}

#[test]
fn test_shared_alias_yields_two_top_candidates() {
    let kb = KnowledgeBase::new(Catalog::gaming().unwrap());
    let candidates = kb.metric_candidates("revenue", 0.7);

    let exact: Vec<MetricKind> = candidates
        .iter()
        .filter(|c| c.confidence == 1.0)
        .map(|c| c.kind)
        .collect();
    assert_eq!(exact, vec![MetricKind::Ggr, MetricKind::NetRevenue]);
}

#[test]
fn test_catalog_from_file() {
    let dir = std::env::temp_dir().join(format!("nlq-catalog-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("catalog.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(
        file,
        r#"
        [[tables]]
        name = "fact_bets"
        date_column = "BetDate"

        [[metrics]]
        kind = "wagering"
        name = "Stakes"
        table = "fact_bets"
        aggregation = "sum"
        column = "Stake"
        aliases = ["stakes"]
        "#
    )
    .unwrap();

    let catalog = Catalog::from_file(&path).unwrap();
    let kb = KnowledgeBase::new(catalog);
    let stakes = kb.map_metric_to_database_field("stakes").unwrap();
    assert_eq!(stakes.table, "fact_bets");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_join_key_on_unknown_table_is_rejected() {
    let err = Catalog::from_toml_str(
        r#"
        [[tables]]
        name = "tbl_Deposits"

        [[joins]]
        left = "tbl_Deposits"
        left_column = "PlayerID"
        right = "tbl_Players"
        right_column = "PlayerID"
        "#,
    )
    .unwrap_err();
    assert!(matches!(err, KnowledgeError::UnknownTable(t) if t == "tbl_Players"));
}

#[test]
fn test_multi_hop_join_path() {
    let kb = KnowledgeBase::new(Catalog::gaming().unwrap());
    let path = kb
        .join_graph()
        .find_path("tbl_Deposits", "tbl_Partners")
        .unwrap();
    let hops: Vec<&str> = path.iter().map(|s| s.to_table.as_str()).collect();
    assert_eq!(hops, vec!["tbl_Players", "tbl_White_labels", "tbl_Partners"]);
}

#[test]
fn test_concurrent_feedback_is_append_only() {
    let kb = Arc::new(KnowledgeBase::new(Catalog::gaming().unwrap()));
    let before = kb.map_metric_to_database_field("revenue").unwrap().kind;

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let kb = kb.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    kb.record_mapping_feedback("revenue", "net_revenue", i % 2 == 0, None);
                    // readers run alongside writers
                    assert!(kb.map_metric_to_database_field("ggr").is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = kb.feedback().snapshot();
    assert_eq!(records.len(), 200);
    let mut seqs: Vec<u64> = records.iter().map(|r| r.seq).collect();
    seqs.dedup();
    assert_eq!(seqs.len(), 200);
    assert_eq!(
        kb.map_metric_to_database_field("revenue").unwrap().kind,
        before
    );
}
