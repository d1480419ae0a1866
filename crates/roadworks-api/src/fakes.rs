//! Scripted HTTP backend (testing only)
//!
//! `ScriptedBackend` answers requests from a queue of prepared replies and
//! records every request together with the (tokio) instant it arrived, so
//! retry schedules can be asserted on a paused clock.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::backend::{BackendError, HttpBackend};
use crate::request::{HttpRequest, HttpResponse};

/// Prepared outcome for one request.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Respond(HttpResponse),
    /// Transport failure without a response
    Fail(String),
    /// Never completes; only the client's timeout ends the attempt
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub at: Instant,
}

/// In-memory [`HttpBackend`] driven by a reply queue.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: ScriptedReply) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(ScriptedReply::Respond(HttpResponse::json(status, &body)))
    }

    pub fn push_status(&self, status: u16, status_text: &str, body: &str) -> &Self {
        self.push(ScriptedReply::Respond(HttpResponse::new(
            status,
            status_text,
            body,
        )))
    }

    pub fn push_failure(&self, message: &str) -> &Self {
        self.push(ScriptedReply::Fail(message.to_string()))
    }

    pub fn push_hang(&self) -> &Self {
        self.push(ScriptedReply::Hang)
    }

    /// Reply used once the queue is empty.
    pub fn always(&self, reply: ScriptedReply) -> &Self {
        *self.fallback.lock().unwrap() = Some(reply);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.request.clone())
    }

    /// Time elapsed between consecutive requests.
    pub fn gaps(&self) -> Vec<Duration> {
        let requests = self.requests.lock().unwrap();
        requests
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        let queued = self.replies.lock().unwrap().pop_front();
        queued.or_else(|| self.fallback.lock().unwrap().clone())
    }
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            request,
            at: Instant::now(),
        });

        match self.next_reply() {
            Some(ScriptedReply::Respond(response)) => Ok(response),
            Some(ScriptedReply::Fail(message)) => Err(BackendError(message)),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(BackendError("no scripted reply".to_string())),
        }
    }
}
