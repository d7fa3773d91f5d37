//! S2 (time flush): a single event with a huge size trigger still reaches
//! the transport via the periodic ticker within `flushInterval + ε`.

use langfuse_sdk::testing::RecordingTransport;
use langfuse_sdk::Client;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn time_trigger_flushes_single_event() {
    let transport = Arc::new(RecordingTransport::new());
    let client = Client::builder()
        .credentials("pk", "sk")
        .transport(Arc::clone(&transport) as Arc<dyn langfuse_sdk::RestTransport>)
        .flush_at(1000)
        .flush_interval(Duration::from_millis(100))
        .build()
        .unwrap();

    let mut trace = client.trace("T");
    trace.submit().await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.total_events_received(), 1);
}
