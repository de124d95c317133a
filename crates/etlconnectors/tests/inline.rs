use etlconnectors::{ConsoleDestination, InlineSource};
use etlcore::{
    ConnectorContext, EventBus, LoadConnector, NodeConfig, Scalar, SourceConnector, TabularResult,
};

fn ctx(config: NodeConfig) -> ConnectorContext {
    let bus = EventBus::new(8);
    let emitter = bus.emitter(uuid::Uuid::new_v4(), "n".to_string());
    ConnectorContext::new("n".to_string(), config, emitter)
}

fn config(value: serde_json::Value) -> NodeConfig {
    value.as_object().unwrap().clone()
}

#[tokio::test]
async fn inline_source_extracts_embedded_table() {
    let config = config(serde_json::json!({
        "columns": ["name", "count", "active"],
        "rows": [["widgets", 3, true], ["gadgets", 5, false]]
    }));

    let table = InlineSource.extract(&ctx(config)).await.unwrap();

    assert_eq!(table.columns(), ["name", "count", "active"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.rows()[0][0].as_str(), Some("widgets"));
    assert_eq!(table.rows()[0][1].as_f64(), Some(3.0));
    assert_eq!(table.rows()[1][2].as_bool(), Some(false));
}

#[test]
fn inline_validate_rejects_empty_columns() {
    assert!(InlineSource
        .validate_config(&config(serde_json::json!({"columns": []})))
        .is_err());
}

#[test]
fn inline_validate_rejects_ragged_rows() {
    let config = config(serde_json::json!({
        "columns": ["a", "b"],
        "rows": [["only-one"]]
    }));
    assert!(InlineSource.validate_config(&config).is_err());
}

#[tokio::test]
async fn console_destination_counts_rows() {
    let table = TabularResult::new(
        vec!["v".to_string()],
        vec![vec![Scalar::from("x")], vec![Scalar::from("y")]],
    )
    .unwrap();

    let summary = ConsoleDestination
        .load(&ctx(NodeConfig::new()), table)
        .await
        .unwrap();
    assert_eq!(summary.rows_written, 2);
}
