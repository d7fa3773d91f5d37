//! S1 (happy path): trace + span + generation, ended without an explicit
//! `Submit()`, land in exactly one batch of four events.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::Client;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn happy_path_single_batch_four_events() {
    let transport = Arc::new(RecordingTransport::new());
    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .flush_at(3)
        .flush_interval(Duration::from_secs(3600))
        .build()
        .expect("client with RecordingTransport should build");

    let mut trace = client.trace("T");
    trace.submit().await.expect("trace-create should be accepted");

    let mut span = trace.span("S1");
    span.input(serde_json::json!({"q": "hi"}));

    let mut generation = trace.generation("G1");
    generation.model("m").usage(Some(5), Some(7), None);

    span.end().await.expect("span end should be accepted");
    generation.end().await.expect("generation end should be accepted");
    trace.end().await.expect("trace end should be accepted");

    client
        .flush(Duration::from_secs(1))
        .await
        .expect("flush should hand off the buffered events");

    assert_eq!(transport.call_count(), 1, "all four events should land in one batch");
    let batches = transport.received_batches();
    assert_eq!(batches.len(), 1);
    let wire_types: Vec<&str> = batches[0].batch.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(wire_types, vec!["trace-create", "span-update", "generation-update", "trace-update"]);
}
