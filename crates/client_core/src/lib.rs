use std::sync::Arc;

use shared::domain::{Candidate, CandidateId};
use tokio::sync::{broadcast, Mutex};

pub mod error;
pub mod snapshot;
pub mod store;
pub mod subscriber;
pub mod vote;

pub use error::{ClientError, CloseReason, StoreError, SubscribeError};
pub use snapshot::SnapshotLoader;
pub use store::CandidateStore;
pub use subscriber::{LiveUpdateSubscriber, SubscriberState};
pub use vote::VoteCommandSender;

/// Connection settings for one session. Constructed by the embedder and
/// injected into every component; nothing in this crate reads process-wide
/// configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    base_url: String,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn candidates_url(&self) -> String {
        format!("{}/candidates", self.base_url)
    }

    pub fn votes_url(&self) -> String {
        format!("{}/votes", self.base_url)
    }

    /// Websocket endpoint derived from the HTTP base url.
    pub fn stream_url(&self) -> Result<String, SubscribeError> {
        let ws_base = if self.base_url.starts_with("https://") {
            self.base_url.replacen("https://", "wss://", 1)
        } else if self.base_url.starts_with("http://") {
            self.base_url.replacen("http://", "ws://", 1)
        } else {
            return Err(SubscribeError::InvalidUrl(self.base_url.clone()));
        };
        Ok(format!("{ws_base}/ws"))
    }
}

/// What a display needs to hear about: re-render cues, never state it must
/// mutate itself. The store stays the single source of truth.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    SnapshotApplied { candidates: usize },
    TallyUpdated { id: CandidateId, votes: u64 },
    StreamEnded(CloseReason),
}

/// One display session against the vote service: an exclusively owned store,
/// the loader/subscriber/sender wired to it, and an event fan-out for
/// whatever renders the tallies.
pub struct VoteSession {
    store: Arc<Mutex<CandidateStore>>,
    loader: SnapshotLoader,
    subscriber: Mutex<LiveUpdateSubscriber>,
    votes: VoteCommandSender,
    events: broadcast::Sender<SessionEvent>,
}

impl VoteSession {
    pub fn new(config: ServiceConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let store = Arc::new(Mutex::new(CandidateStore::new()));
        let http = reqwest::Client::new();
        Arc::new(Self {
            loader: SnapshotLoader::new(http.clone(), config.clone(), Arc::clone(&store)),
            subscriber: Mutex::new(LiveUpdateSubscriber::new(
                config.clone(),
                Arc::clone(&store),
                events.clone(),
            )),
            votes: VoteCommandSender::new(http, config),
            store,
            events,
        })
    }

    /// Loads the snapshot and opens the live stream concurrently. A failed
    /// snapshot is surfaced first and leaves the roster empty while the
    /// stream, if it came up, keeps dropping unknown-id deltas.
    pub async fn start(&self) -> Result<(), ClientError> {
        let mut subscriber = self.subscriber.lock().await;
        let (snapshot, stream) = tokio::join!(self.loader.load(), subscriber.open());
        let count = snapshot?;
        stream?;
        let _ = self.events.send(SessionEvent::SnapshotApplied { candidates: count });
        Ok(())
    }

    /// Current tallies in snapshot order. Each call is one locked read, so a
    /// display never observes a candidate mid-update.
    pub async fn tallies(&self) -> Vec<Candidate> {
        let store = self.store.lock().await;
        store.candidates().to_vec()
    }

    /// Fire-and-forget: the local view changes only when the corresponding
    /// delta comes back through the subscription.
    pub async fn cast_vote(&self, id: &CandidateId) -> Result<(), ClientError> {
        self.votes.cast_vote(id).await
    }

    pub async fn subscriber_state(&self) -> SubscriberState {
        self.subscriber.lock().await.state()
    }

    /// Tears the stream down; the last applied view stays readable.
    pub async fn close(&self) {
        let mut subscriber = self.subscriber.lock().await;
        subscriber.close().await;
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
