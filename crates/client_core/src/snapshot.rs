use std::sync::Arc;

use reqwest::Client;
use shared::{domain::Candidate, protocol::CandidateSummary};
use tokio::sync::Mutex;
use tracing::info;

use crate::{error::ClientError, store::CandidateStore, ServiceConfig};

/// Fetches the full candidate roster once and hands it to the store.
///
/// No retry lives here: a failed fetch leaves the store empty and the error
/// with the caller, which decides whether to tear the session down or build
/// a new one.
pub struct SnapshotLoader {
    http: Client,
    config: ServiceConfig,
    store: Arc<Mutex<CandidateStore>>,
}

impl SnapshotLoader {
    pub fn new(http: Client, config: ServiceConfig, store: Arc<Mutex<CandidateStore>>) -> Self {
        Self {
            http,
            config,
            store,
        }
    }

    /// One query, applied wholesale. Returns the roster size. Runs exactly
    /// once per session; a second call trips the store's initialization
    /// guard.
    pub async fn load(&self) -> Result<usize, ClientError> {
        let summaries = self.fetch_all().await?;
        let candidates: Vec<Candidate> = summaries.into_iter().map(Candidate::from).collect();
        let count = candidates.len();
        let mut store = self.store.lock().await;
        store.apply_snapshot(candidates)?;
        info!(candidates = count, "candidate snapshot applied");
        Ok(count)
    }

    /// The raw listing, in whatever order the service provides.
    pub async fn fetch_all(&self) -> Result<Vec<CandidateSummary>, ClientError> {
        let response = self
            .http
            .get(self.config.candidates_url())
            .send()
            .await
            .map_err(ClientError::ServiceUnavailable)?
            .error_for_status()
            .map_err(ClientError::ServiceUnavailable)?;
        response
            .json()
            .await
            .map_err(ClientError::ServiceUnavailable)
    }
}
