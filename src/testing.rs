//! In-process test double for [`RestTransport`], in the style of
//! `opentelemetry_sdk::testing::trace::new_tokio_test_exporter` — a
//! channel-backed fake that records what it was sent rather than spinning up
//! a real HTTP server in every test.

use crate::model::ScoreCreate;
use crate::wire::{IngestionBatchRequest, IngestionEventError, IngestionResponse};
use crate::LangfuseError;
use crate::RestTransport;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct ScriptedFailure {
    remaining: usize,
    status: u16,
}

/// A [`RestTransport`] that records every batch it receives and can be
/// scripted to fail the next N calls with a given HTTP status before
/// succeeding, for exercising the dispatcher's retry policy.
#[derive(Debug)]
pub struct RecordingTransport {
    received: Mutex<Vec<IngestionBatchRequest>>,
    scores: Mutex<Vec<ScoreCreate>>,
    failures: Mutex<VecDeque<ScriptedFailure>>,
    call_count: AtomicUsize,
    block_forever: std::sync::atomic::AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        RecordingTransport {
            received: Mutex::new(Vec::new()),
            scores: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            call_count: AtomicUsize::new(0),
            block_forever: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` `ingest` calls fail with `status` before the
    /// dispatcher sees a success.
    pub fn fail_next_n_with_status(&self, n: usize, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .push_back(ScriptedFailure { remaining: n, status });
    }

    /// Makes every subsequent `ingest` call hang forever (used to exercise
    /// back-pressure / queue overflow scenarios).
    pub fn block_forever(&self) {
        self.block_forever.store(true, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn received_batches(&self) -> Vec<IngestionBatchRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn total_events_received(&self) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.batch.len())
            .sum()
    }
}

#[async_trait]
impl RestTransport for RecordingTransport {
    async fn ingest(&self, request: &IngestionBatchRequest) -> Result<IngestionResponse, LangfuseError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if self.block_forever.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
            unreachable!();
        }

        let scripted_status = {
            let mut failures = self.failures.lock().unwrap();
            if let Some(front) = failures.front_mut() {
                if front.remaining > 0 {
                    front.remaining -= 1;
                    let status = front.status;
                    if front.remaining == 0 {
                        failures.pop_front();
                    }
                    Some(status)
                } else {
                    None
                }
            } else {
                None
            }
        };

        if let Some(status) = scripted_status {
            return Err(LangfuseError::from_status(status, "scripted failure".into()));
        }

        self.received.lock().unwrap().push(request.clone());
        Ok(IngestionResponse {
            success: true,
            timestamp: Some(Utc::now()),
            errors: Vec::<IngestionEventError>::new(),
        })
    }

    async fn score(&self, score: &ScoreCreate) -> Result<(), LangfuseError> {
        self.scores.lock().unwrap().push(score.clone());
        Ok(())
    }

    async fn health(&self) -> Result<(), LangfuseError> {
        Ok(())
    }
}
