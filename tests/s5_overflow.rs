//! S5 (overflow): with `maxQueueSize=4` and drop-newest (the default), a
//! fifth enqueue fails with `QueueFull` and the dropped counter is
//! incremented. `flushAt`/`flushInterval` are set so nothing drains the
//! buffer mid-test, isolating the queue's own back-pressure behavior.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::{Client, LangfuseError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn fifth_enqueue_overflows_with_drop_newest() {
    let transport = Arc::new(RecordingTransport::new());
    transport.block_forever();

    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .max_queue_size(4)
        .flush_at(1000)
        .flush_interval(Duration::from_secs(3600))
        .build()
        .unwrap();

    for i in 0..4 {
        let mut trace = client.trace(format!("t{i}"));
        trace.submit().await.expect("queue has room for the first four");
    }

    let mut fifth = client.trace("t4");
    let err = fifth.submit().await.unwrap_err();
    assert!(matches!(err, LangfuseError::QueueFull));

    let stats = client.stats();
    assert_eq!(stats.events_enqueued, 4);
    assert_eq!(stats.events_dropped, 1);
}
