//! S6 (shutdown drain): 50 events with `flushAt=10` drain as five batches
//! before `Shutdown` returns; a subsequent enqueue is rejected.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::{Client, LangfuseError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn shutdown_drains_fifty_events_in_five_batches() {
    let transport = Arc::new(RecordingTransport::new());
    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .max_queue_size(64)
        .flush_at(10)
        .flush_interval(Duration::from_secs(3600))
        .build()
        .unwrap();

    for i in 0..50 {
        let mut trace = client.trace(format!("t{i}"));
        trace.submit().await.expect("buffer has room for 50 events");
    }

    client.shutdown(Duration::from_secs(5)).await.expect("shutdown should drain cleanly");

    assert_eq!(transport.call_count(), 5);
    assert_eq!(transport.total_events_received(), 50);

    let stats = client.stats();
    assert_eq!(stats.events_enqueued, stats.events_submitted + stats.events_failed);

    let mut late = client.trace("too-late");
    let err = late.submit().await.unwrap_err();
    assert!(matches!(err, LangfuseError::QueueFull));
}
