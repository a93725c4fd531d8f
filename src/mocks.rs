//! Mock implementations for testing.
//!
//! [`MockVerifyApi`] is a scriptable stand-in for the authoritative server.
//! Responses are queued ahead of time; when the queue is empty, `verify_scan`
//! answers with a network error (which drives the coordinator into its
//! offline path) and `submit_boarding` succeeds.

#![allow(clippy::unwrap_used)] // Test doubles

use crate::error::{Result, VerifyError};
use crate::server::{VerifyApi, VerifyRequest, VerifyResponse};
use crate::types::OfflineVerificationEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scriptable mock of the server verification API.
#[derive(Debug, Clone, Default)]
pub struct MockVerifyApi {
    verify_responses: Arc<Mutex<VecDeque<Result<VerifyResponse>>>>,
    sync_results: Arc<Mutex<VecDeque<Result<()>>>>,
    verify_calls: Arc<Mutex<Vec<VerifyRequest>>>,
    sync_calls: Arc<Mutex<Vec<OfflineVerificationEvent>>>,
}

impl MockVerifyApi {
    /// Create a mock with empty scripts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `verify_scan` outcome.
    pub fn push_verify_response(&self, response: Result<VerifyResponse>) {
        self.verify_responses.lock().unwrap().push_back(response);
    }

    /// Queue the next `submit_boarding` outcome.
    pub fn push_sync_result(&self, result: Result<()>) {
        self.sync_results.lock().unwrap().push_back(result);
    }

    /// Requests seen by `verify_scan`, in order.
    #[must_use]
    pub fn verify_calls(&self) -> Vec<VerifyRequest> {
        self.verify_calls.lock().unwrap().clone()
    }

    /// Events seen by `submit_boarding`, in order.
    #[must_use]
    pub fn sync_calls(&self) -> Vec<OfflineVerificationEvent> {
        self.sync_calls.lock().unwrap().clone()
    }
}

impl VerifyApi for MockVerifyApi {
    async fn verify_scan(&self, request: &VerifyRequest) -> Result<VerifyResponse> {
        self.verify_calls.lock().unwrap().push(request.clone());
        self.verify_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(VerifyError::Network("no scripted response".to_string())))
    }

    async fn submit_boarding(&self, event: &OfflineVerificationEvent) -> Result<()> {
        self.sync_calls.lock().unwrap().push(event.clone());
        self.sync_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
