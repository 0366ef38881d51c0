use reqwest::Client;
use shared::{
    domain::CandidateId,
    error::{ApiError, ErrorCode},
    protocol::CastVoteRequest,
};
use tracing::debug;

use crate::{error::ClientError, ServiceConfig};

/// Issues cast-vote commands. Fire-and-forget with respect to local state:
/// an acknowledgement never touches the store; the visible tally moves only
/// when the matching delta arrives on the subscription.
pub struct VoteCommandSender {
    http: Client,
    config: ServiceConfig,
}

impl VoteCommandSender {
    pub fn new(http: Client, config: ServiceConfig) -> Self {
        Self { http, config }
    }

    /// One command per call: casting twice votes twice. Deduplication, if
    /// any, belongs to the service.
    pub async fn cast_vote(&self, id: &CandidateId) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.config.votes_url())
            .json(&CastVoteRequest { id: id.clone() })
            .send()
            .await
            .map_err(ClientError::ServiceUnavailable)?;

        let status = response.status();
        if status.is_success() {
            debug!(%id, "vote command acknowledged");
            return Ok(());
        }
        match response.json::<ApiError>().await {
            Ok(rejection) => Err(ClientError::rejected(rejection)),
            Err(_) => Err(ClientError::Rejected {
                code: ErrorCode::Internal,
                message: format!("vote rejected with status {status}"),
            }),
        }
    }
}
