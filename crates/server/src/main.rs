use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::Candidate,
    error::{ApiError, ErrorCode},
    protocol::{CandidateSummary, CastVoteRequest, ServerEvent, VoteDelta},
};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

mod config;

use config::load_settings;

struct AppState {
    roster: Mutex<Vec<Candidate>>,
    events: broadcast::Sender<ServerEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let roster: Vec<Candidate> = settings
        .candidates
        .iter()
        .map(|seed| Candidate::new(seed.id.clone(), seed.name.clone(), 0))
        .collect();
    info!(candidates = roster.len(), "seeded candidate roster");

    let (events, _) = broadcast::channel(256);
    let state = AppState {
        roster: Mutex::new(roster),
        events,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "vote service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/candidates", get(list_candidates))
        .route("/votes", post(cast_vote))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_candidates(State(state): State<Arc<AppState>>) -> Json<Vec<CandidateSummary>> {
    let roster = state.roster.lock().await;
    Json(roster.iter().cloned().map(CandidateSummary::from).collect())
}

async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CastVoteRequest>,
) -> Result<Json<CandidateSummary>, (StatusCode, Json<ApiError>)> {
    let mut roster = state.roster.lock().await;
    let Some(candidate) = roster
        .iter_mut()
        .find(|candidate| candidate.id == request.id)
    else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                format!("unknown candidate '{}'", request.id),
            )),
        ));
    };
    candidate.votes += 1;
    let delta = VoteDelta {
        id: candidate.id.clone(),
        votes: candidate.votes,
    };
    info!(id = %delta.id, votes = delta.votes, "vote accepted");
    let _ = state.events.send(ServerEvent::VoteChanged(delta));
    Ok(Json(candidate.clone().into()))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();

    let send_task = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}
