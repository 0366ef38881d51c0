use std::sync::Arc;

use futures::StreamExt;
use shared::protocol::ServerEvent;
use tokio::{
    net::TcpStream,
    sync::{broadcast, oneshot, watch, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::{
    error::{CloseReason, SubscribeError},
    store::CandidateStore,
    ServiceConfig, SessionEvent,
};

/// Where the subscription currently is. `Closed` is terminal: a subscriber
/// never reconnects, and resubscribing means constructing a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connecting,
    Streaming,
    Closed,
}

/// Consumes the vote-change stream and applies each delta to the store.
///
/// A single owning task is the store's only writer once the stream is up;
/// readers only ever observe completed states through the session's locked
/// view. Deltas for ids missing from the roster (an event racing the
/// snapshot, or a malformed payload) are dropped, not raised.
pub struct LiveUpdateSubscriber {
    config: ServiceConfig,
    store: Arc<Mutex<CandidateStore>>,
    events: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SubscriberState>,
    state_rx: watch::Receiver<SubscriberState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl LiveUpdateSubscriber {
    pub fn new(
        config: ServiceConfig,
        store: Arc<Mutex<CandidateStore>>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SubscriberState::Disconnected);
        Self {
            config,
            store,
            events,
            state_tx,
            state_rx,
            shutdown: None,
            task: None,
        }
    }

    pub fn state(&self) -> SubscriberState {
        *self.state_rx.borrow()
    }

    /// Opens the stream and starts the applying task. Valid exactly once,
    /// from `Disconnected`; a connect failure lands in `Closed`.
    pub async fn open(&mut self) -> Result<(), SubscribeError> {
        if self.state() != SubscriberState::Disconnected {
            return Err(SubscribeError::AlreadyOpened);
        }
        let stream_url = self.config.stream_url()?;
        let _ = self.state_tx.send(SubscriberState::Connecting);

        let (ws_stream, _) = match connect_async(&stream_url).await {
            Ok(connected) => connected,
            Err(err) => {
                let _ = self.state_tx.send(SubscriberState::Closed);
                return Err(SubscribeError::Connect(err));
            }
        };
        info!(%stream_url, "vote stream connected");
        let _ = self.state_tx.send(SubscriberState::Streaming);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);

        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let state_tx = self.state_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let reason = stream_deltas(ws_stream, &store, &events, shutdown_rx).await;
            match &reason {
                CloseReason::Requested => info!("vote stream closed"),
                CloseReason::ConnectionLost(detail) => warn!(%detail, "vote stream lost"),
            }
            let _ = state_tx.send(SubscriberState::Closed);
            let _ = events.send(SessionEvent::StreamEnded(reason));
        }));
        Ok(())
    }

    /// Cooperative shutdown. When this returns the applying task has exited
    /// and the stream handle is torn down, so a late event on the old
    /// connection can no longer touch the store.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "vote stream task failed during close");
            }
        }
        let _ = self.state_tx.send(SubscriberState::Closed);
    }
}

async fn stream_deltas(
    mut ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    store: &Mutex<CandidateStore>,
    events: &broadcast::Sender<SessionEvent>,
    mut shutdown: oneshot::Receiver<()>,
) -> CloseReason {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                let _ = ws_stream.close(None).await;
                return CloseReason::Requested;
            }
            message = ws_stream.next() => match message {
                Some(Ok(Message::Text(text))) => apply_event(store, events, &text).await,
                Some(Ok(Message::Close(_))) | None => {
                    return CloseReason::ConnectionLost("vote stream closed by service".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    return CloseReason::ConnectionLost(format!("vote stream receive failed: {err}"));
                }
            },
        }
    }
}

async fn apply_event(
    store: &Mutex<CandidateStore>,
    events: &broadcast::Sender<SessionEvent>,
    text: &str,
) {
    let event = match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            warn!(%err, "dropping malformed vote stream event");
            return;
        }
    };
    let ServerEvent::VoteChanged(delta) = event;
    let applied = {
        let mut store = store.lock().await;
        store.apply_delta(&delta.id, delta.votes)
    };
    if applied {
        let _ = events.send(SessionEvent::TallyUpdated {
            id: delta.id,
            votes: delta.votes,
        });
    } else {
        debug!(id = %delta.id, votes = delta.votes, "dropping delta for unknown candidate");
    }
}
