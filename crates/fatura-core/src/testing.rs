//! Scripted completion backends for pipeline and batch tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use fatura_vision::{CompletionBackend, CompletionRequest, VisionError};

/// Backend that replays a fixed sequence of responses.
pub(crate) struct ScriptedBackend {
    responses: Mutex<VecDeque<fatura_vision::Result<String>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<fatura_vision::Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _request: &CompletionRequest) -> fatura_vision::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Err(VisionError::InvalidResponse("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Backend that answers every call with the same payload after a per-call
/// artificial latency, for ordering and concurrency tests.
pub(crate) struct LatencyBackend {
    payload: String,
    delays_ms: Vec<u64>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl LatencyBackend {
    pub fn new(payload: impl Into<String>, delays_ms: Vec<u64>) -> Self {
        Self {
            payload: payload.into(),
            delays_ms,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for LatencyBackend {
    async fn complete(&self, _request: &CompletionRequest) -> fatura_vision::Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays_ms[call % self.delays_ms.len()];
        tokio::time::sleep(Duration::from_millis(delay)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }

    fn name(&self) -> &str {
        "latency"
    }
}

/// Backend that always fails with a retryable error.
pub(crate) struct FailingBackend {
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FailingBackend {
    async fn complete(&self, _request: &CompletionRequest) -> fatura_vision::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(VisionError::Status {
            status: 500,
            body: "internal error".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}
