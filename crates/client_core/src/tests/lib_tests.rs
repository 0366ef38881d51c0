use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::{Candidate, CandidateId},
    error::{ApiError, ErrorCode},
    protocol::{CandidateSummary, CastVoteRequest, ServerEvent, VoteDelta},
};
use tokio::{
    net::TcpListener,
    sync::{broadcast, Mutex},
    time::{sleep, timeout, Duration},
};

use super::*;

#[derive(Clone)]
struct MockService {
    roster: Arc<Mutex<Vec<CandidateSummary>>>,
    recorded_votes: Arc<Mutex<Vec<CandidateId>>>,
    pushes: broadcast::Sender<Push>,
}

#[derive(Debug, Clone)]
enum Push {
    Event(ServerEvent),
    Close,
}

fn seeded_roster() -> Vec<CandidateSummary> {
    vec![
        CandidateSummary {
            id: CandidateId::from("a"),
            name: "X".to_string(),
            votes: 0,
        },
        CandidateSummary {
            id: CandidateId::from("b"),
            name: "Y".to_string(),
            votes: 0,
        },
    ]
}

async fn spawn_service(roster: Vec<CandidateSummary>) -> (ServiceConfig, MockService) {
    let (pushes, _) = broadcast::channel(64);
    let service = MockService {
        roster: Arc::new(Mutex::new(roster)),
        recorded_votes: Arc::new(Mutex::new(Vec::new())),
        pushes,
    };
    let app = Router::new()
        .route("/candidates", get(list_candidates))
        .route("/votes", post(http_cast_vote))
        .route("/ws", get(ws_handler))
        .with_state(service.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (ServiceConfig::new(format!("http://{addr}")), service)
}

async fn list_candidates(State(service): State<MockService>) -> Json<Vec<CandidateSummary>> {
    Json(service.roster.lock().await.clone())
}

async fn http_cast_vote(
    State(service): State<MockService>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<CandidateSummary>, (StatusCode, Json<ApiError>)> {
    service.recorded_votes.lock().await.push(request.id.clone());
    let mut roster = service.roster.lock().await;
    let Some(row) = roster.iter_mut().find(|row| row.id == request.id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(ErrorCode::NotFound, "unknown candidate")),
        ));
    };
    row.votes += 1;
    Ok(Json(row.clone()))
}

async fn ws_handler(ws: WebSocketUpgrade, State(service): State<MockService>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_push(service, socket))
}

async fn ws_push(service: MockService, mut socket: WebSocket) {
    let mut pushes = service.pushes.subscribe();
    while let Ok(push) = pushes.recv().await {
        match push {
            Push::Event(event) => {
                let text = serde_json::to_string(&event).expect("serialize event");
                if socket.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
            Push::Close => {
                let _ = socket.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }
}

async fn wait_for_stream(service: &MockService) {
    timeout(Duration::from_secs(5), async {
        while service.pushes.receiver_count() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("ws subscriber never attached");
}

async fn push_event(service: &MockService, event: ServerEvent) {
    wait_for_stream(service).await;
    service.pushes.send(Push::Event(event)).expect("push event");
}

async fn wait_for_tally(events: &mut broadcast::Receiver<SessionEvent>, id: &str) -> u64 {
    timeout(Duration::from_secs(5), async {
        loop {
            if let SessionEvent::TallyUpdated { id: updated, votes } =
                events.recv().await.expect("event channel alive")
            {
                if updated.as_str() == id {
                    return votes;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for tally update")
}

async fn wait_for_stream_end(events: &mut broadcast::Receiver<SessionEvent>) -> CloseReason {
    timeout(Duration::from_secs(5), async {
        loop {
            if let SessionEvent::StreamEnded(reason) =
                events.recv().await.expect("event channel alive")
            {
                return reason;
            }
        }
    })
    .await
    .expect("timed out waiting for stream end")
}

#[tokio::test]
async fn snapshot_populates_store_in_service_order() {
    let (config, _service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    session.start().await.expect("start");

    let tallies = session.tallies().await;
    assert_eq!(
        tallies,
        vec![Candidate::new("a", "X", 0), Candidate::new("b", "Y", 0)]
    );
    assert_eq!(session.subscriber_state().await, SubscriberState::Streaming);

    session.close().await;
}

#[tokio::test]
async fn snapshot_failure_surfaces_service_unavailable_and_leaves_store_empty() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let session = VoteSession::new(ServiceConfig::new(format!("http://{addr}")));
    let err = session.start().await.expect_err("service is down");
    assert!(matches!(err, ClientError::ServiceUnavailable(_)));
    assert!(session.tallies().await.is_empty());
}

#[tokio::test]
async fn deltas_move_tallies_and_preserve_order() {
    let (config, service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    let mut events = session.subscribe_events();
    session.start().await.expect("start");

    push_event(
        &service,
        ServerEvent::VoteChanged(VoteDelta {
            id: "b".into(),
            votes: 5,
        }),
    )
    .await;
    assert_eq!(wait_for_tally(&mut events, "b").await, 5);

    let tallies = session.tallies().await;
    assert_eq!(
        tallies,
        vec![Candidate::new("a", "X", 0), Candidate::new("b", "Y", 5)]
    );

    session.close().await;
}

#[tokio::test]
async fn unknown_candidate_deltas_are_dropped_silently() {
    let (config, service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    let mut events = session.subscribe_events();
    session.start().await.expect("start");

    // "c" is not in the roster; it is delivered first on the same
    // connection, so by the time the "b" update lands it has been processed.
    push_event(
        &service,
        ServerEvent::VoteChanged(VoteDelta {
            id: "c".into(),
            votes: 9,
        }),
    )
    .await;
    push_event(
        &service,
        ServerEvent::VoteChanged(VoteDelta {
            id: "b".into(),
            votes: 5,
        }),
    )
    .await;
    assert_eq!(wait_for_tally(&mut events, "b").await, 5);

    let tallies = session.tallies().await;
    assert_eq!(
        tallies,
        vec![Candidate::new("a", "X", 0), Candidate::new("b", "Y", 5)]
    );

    session.close().await;
}

#[tokio::test]
async fn cast_vote_never_mutates_the_store_directly() {
    let (config, service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    let mut events = session.subscribe_events();
    session.start().await.expect("start");

    session
        .cast_vote(&CandidateId::from("b"))
        .await
        .expect("cast");
    assert_eq!(
        *service.recorded_votes.lock().await,
        vec![CandidateId::from("b")]
    );

    // Acknowledged, but the local view is untouched until a delta arrives.
    assert_eq!(
        session.tallies().await,
        vec![Candidate::new("a", "X", 0), Candidate::new("b", "Y", 0)]
    );

    push_event(
        &service,
        ServerEvent::VoteChanged(VoteDelta {
            id: "b".into(),
            votes: 1,
        }),
    )
    .await;
    assert_eq!(wait_for_tally(&mut events, "b").await, 1);
    assert_eq!(session.tallies().await[1].votes, 1);

    session.close().await;
}

#[tokio::test]
async fn vote_rejection_is_reported_not_applied() {
    let (config, _service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    session.start().await.expect("start");

    let err = session
        .cast_vote(&CandidateId::from("nope"))
        .await
        .expect_err("unknown candidate");
    match err {
        ClientError::Rejected { code, .. } => assert_eq!(code, ErrorCode::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.tallies().await.len(), 2);

    session.close().await;
}

#[tokio::test]
async fn close_discards_late_events() {
    let (config, service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    session.start().await.expect("start");
    wait_for_stream(&service).await;

    session.close().await;
    assert_eq!(session.subscriber_state().await, SubscriberState::Closed);

    // A late event on the old stream handle must not reach the store.
    service
        .pushes
        .send(Push::Event(ServerEvent::VoteChanged(VoteDelta {
            id: "b".into(),
            votes: 42,
        })))
        .expect("push");
    sleep(Duration::from_millis(100)).await;

    let tallies = session.tallies().await;
    assert_eq!(tallies[1].votes, 0);
}

#[tokio::test]
async fn subscriber_is_not_reopenable_after_close() {
    let (config, _service) = spawn_service(seeded_roster()).await;
    let store = Arc::new(Mutex::new(CandidateStore::new()));
    let (events, _) = broadcast::channel(16);
    let mut subscriber = LiveUpdateSubscriber::new(config, store, events);
    assert_eq!(subscriber.state(), SubscriberState::Disconnected);

    subscriber.open().await.expect("open");
    assert_eq!(subscriber.state(), SubscriberState::Streaming);

    subscriber.close().await;
    assert_eq!(subscriber.state(), SubscriberState::Closed);

    let err = subscriber.open().await.expect_err("closed is terminal");
    assert!(matches!(err, SubscribeError::AlreadyOpened));
}

#[tokio::test]
async fn transport_loss_surfaces_connection_lost_and_keeps_state() {
    let (config, service) = spawn_service(seeded_roster()).await;
    let session = VoteSession::new(config);
    let mut events = session.subscribe_events();
    session.start().await.expect("start");

    push_event(
        &service,
        ServerEvent::VoteChanged(VoteDelta {
            id: "a".into(),
            votes: 3,
        }),
    )
    .await;
    wait_for_tally(&mut events, "a").await;

    service.pushes.send(Push::Close).expect("push close");
    let reason = wait_for_stream_end(&mut events).await;
    assert!(matches!(reason, CloseReason::ConnectionLost(_)));
    assert_eq!(session.subscriber_state().await, SubscriberState::Closed);

    // The last applied view stays readable while disconnected.
    let tallies = session.tallies().await;
    assert_eq!(tallies[0].votes, 3);
}

#[test]
fn stream_url_is_derived_from_http_base() {
    assert_eq!(
        ServiceConfig::new("http://host:1/").stream_url().expect("ws"),
        "ws://host:1/ws"
    );
    assert_eq!(
        ServiceConfig::new("https://host").stream_url().expect("wss"),
        "wss://host/ws"
    );
    assert!(matches!(
        ServiceConfig::new("ftp://host").stream_url(),
        Err(SubscribeError::InvalidUrl(_))
    ));
}
