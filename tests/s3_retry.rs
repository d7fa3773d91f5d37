//! S3 (retry): a transport that fails with 503 twice then succeeds is
//! retried transparently; the batch is still delivered exactly once.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::Client;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn retries_twice_then_delivers() {
    let transport = Arc::new(RecordingTransport::new());
    transport.fail_next_n_with_status(2, 503);

    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .flush_at(1)
        .flush_interval(Duration::from_secs(3600))
        .retry_count(3)
        .retry_backoff(Duration::from_millis(10), Duration::from_millis(50))
        .build()
        .unwrap();

    let mut trace = client.trace("T");
    trace.submit().await.unwrap();

    // shutdown drains the queue and joins the dispatcher, so by the time it
    // returns every retry attempt has run to completion.
    client.shutdown(Duration::from_secs(5)).await.unwrap();

    assert_eq!(transport.call_count(), 3);
    let stats = client.stats();
    assert_eq!(stats.events_submitted, 1);
    assert_eq!(stats.events_failed, 0);
}
