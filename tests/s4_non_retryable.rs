//! S4 (non-retryable): a 400 response is not retried; the batch is marked
//! failed after exactly one transport call.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::Client;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn non_retryable_failure_gives_up_immediately() {
    let transport = Arc::new(RecordingTransport::new());
    transport.fail_next_n_with_status(1, 400);

    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .flush_at(1)
        .flush_interval(Duration::from_secs(3600))
        .retry_count(3)
        .build()
        .unwrap();

    let mut trace = client.trace("T");
    trace.submit().await.unwrap();

    client.shutdown(Duration::from_secs(5)).await.unwrap();

    assert_eq!(transport.call_count(), 1);
    let stats = client.stats();
    assert_eq!(stats.events_failed, 1);
}
