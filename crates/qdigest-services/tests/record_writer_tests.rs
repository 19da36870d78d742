//! Integration tests for RecordWriter

mod common;

use pretty_assertions::assert_eq;
use qdigest_core::{PlanRecord, SampleRecord, WriteError};
use qdigest_services::RecordWriter;
use serde_json::json;

use common::MemoryStore;

fn primary_key_plan() -> PlanRecord {
    PlanRecord::new(1, 1)
        .with_select_type("SIMPLE")
        .with_table("employees")
        .with_access_type("const")
        .with_key("PRIMARY")
        .with_key_len("4")
        .with_filtered(100.0)
}

#[tokio::test]
async fn written_sample_reads_back_field_for_field() {
    let store = MemoryStore::new();
    let writer = RecordWriter::new("QueryDigest", "Queries");
    let record = SampleRecord::new("SELECT 1", 1_700_000_000, vec![primary_key_plan()]);

    writer.write(&store, &record).await.expect("insert succeeds");

    let stored = writer.read_back(&store).await.expect("read back succeeds");
    assert_eq!(stored, vec![record]);
}

#[tokio::test]
async fn document_uses_store_field_names_and_omits_absent_columns() {
    let store = MemoryStore::new();
    let writer = RecordWriter::new("QueryDigest", "Queries");
    let record = SampleRecord::new("SELECT 1", 1_700_000_000, vec![primary_key_plan()])
        .with_digest("SELECT ?");

    writer.write(&store, &record).await.unwrap();

    let docs = store.documents("QueryDigest", "Queries");
    assert_eq!(docs.len(), 1);
    assert_eq!(
        serde_json::Value::Object(docs[0].clone()),
        json!({
            "Search": "SELECT 1",
            "Timestamp": 1_700_000_000,
            "Digest": "SELECT ?",
            "Plan": [{
                "ID": 1,
                "SelectType": "SIMPLE",
                "Table": "employees",
                "Type": "const",
                "Key": "PRIMARY",
                "KeyLen": "4",
                "Rows": 1,
                "Filtered": 100.0,
            }],
        })
    );
}

#[tokio::test]
async fn failed_insert_is_reported_and_not_retried() {
    let store = MemoryStore::new().with_failing_inserts(1);
    let writer = RecordWriter::new("QueryDigest", "Queries");
    let record = SampleRecord::new("SELECT 1", 1_700_000_000, vec![PlanRecord::new(1, 0)]);

    let err = writer.write(&store, &record).await.unwrap_err();
    assert!(matches!(err, WriteError::Insert(ref reason) if reason.contains("write concern")));
    assert!(store.documents("QueryDigest", "Queries").is_empty());

    writer.write(&store, &record).await.unwrap();
    assert_eq!(writer.read_back(&store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn samples_stay_in_their_own_collection() {
    let store = MemoryStore::new();
    let queries = RecordWriter::new("QueryDigest", "Queries");
    let archive = RecordWriter::new("QueryDigest", "Archive");

    queries
        .write(&store, &SampleRecord::new("SELECT 1", 1, vec![PlanRecord::new(1, 1)]))
        .await
        .unwrap();

    assert_eq!(queries.read_back(&store).await.unwrap().len(), 1);
    assert!(archive.read_back(&store).await.unwrap().is_empty());
    assert_eq!(archive.collection(), "Archive");
}
