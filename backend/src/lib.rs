use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::SinkExt;
use futures::StreamExt;
use santa_core::{
    apply_action, share, Action, Assignment, Participant, ParticipantId, RandomSource,
    RevealState, Session, SessionError, SessionEvent,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod config;
mod draw;
pub mod error;
pub mod notify;
mod persist;
pub mod rooms;

pub use config::Config;
pub use draw::DrawSettings;
pub use error::ApiError;
pub use notify::{DeliveryError, LogNotifier, Notifier};
pub use rooms::{MemoryRoomStore, RoomError, RoomRecord, RoomStore};

use persist::{load_snapshot, write_snapshot};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>>,
    persist_path: Option<PathBuf>,
    /// Held from taking the copy until the file is replaced, so snapshots hit
    /// the disk in the order they were taken.
    persist_lock: Arc<Mutex<()>>,
    rooms: Arc<dyn RoomStore>,
    notifier: Arc<dyn Notifier>,
    draw: DrawSettings,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            persist_path: None,
            persist_lock: Arc::new(Mutex::new(())),
            rooms: Arc::new(MemoryRoomStore::new()),
            notifier: Arc::new(LogNotifier),
            draw: DrawSettings::default(),
        }
    }
}

impl AppState {
    pub async fn with_persistence(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut state = Self::default();
        state.persist_path = Some(path.clone());
        if let Some(mut saved) = load_snapshot::<HashMap<String, Session>>(&path).await {
            for (id, session) in saved.iter_mut() {
                if session.recover() {
                    warn!(session_id = %id, "pending draw abandoned on reload");
                }
            }
            info!(sessions = saved.len(), path = %path.display(), "sessions loaded");
            let mut channels = state.channels.write().await;
            for session_id in saved.keys() {
                let (tx, _) = broadcast::channel(32);
                channels.insert(session_id.clone(), tx);
            }
            drop(channels);
            *state.sessions.write().await = saved;
        }
        state
    }

    pub async fn from_config(config: &Config) -> Self {
        let state = match &config.persist_path {
            Some(path) => Self::with_persistence(path.clone()).await,
            None => Self::default(),
        };
        let state = match &config.rooms_path {
            Some(path) => state.with_rooms(MemoryRoomStore::with_persistence(path.clone()).await),
            None => state,
        };
        state.with_draw_settings(DrawSettings {
            delay: config.draw_delay,
            source: config.random_source,
            allow_seed_override: config.allow_seed_override,
        })
    }

    pub fn with_rooms(mut self, rooms: impl RoomStore + 'static) -> Self {
        self.rooms = Arc::new(rooms);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn with_draw_settings(mut self, draw: DrawSettings) -> Self {
        self.draw = draw;
        self
    }

    async fn persist(&self) {
        if let Some(path) = &self.persist_path {
            let _guard = self.persist_lock.lock().await;
            let snapshot = {
                let sessions = self.sessions.read().await;
                sessions.clone()
            };
            write_snapshot(path, &snapshot).await;
        }
    }

    async fn insert_session(&self, session: Session) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), session);
        let (tx, _) = broadcast::channel(32);
        self.channels.write().await.insert(session_id.clone(), tx);
        self.persist().await;
        session_id
    }

    async fn broadcast(&self, session_id: &str, view: SessionView, events: Vec<SessionEvent>) {
        if let Some(tx) = self.channels.read().await.get(session_id) {
            let _ = tx.send(ServerMessage::State(view));
            for evt in events {
                let _ = tx.send(ServerMessage::Event(evt));
            }
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/session", post(create_session))
        .route("/session/:id", get(get_session))
        .route(
            "/session/:id/participants",
            post(add_participant).delete(clear_roster),
        )
        .route("/session/:id/participants/:pid", delete(remove_participant))
        .route("/session/:id/draw", post(start_draw))
        .route("/session/:id/reveal", post(reveal))
        .route("/session/:id/toggle", post(toggle))
        .route("/session/:id/dismiss", post(dismiss))
        .route("/session/:id/reset", post(reset))
        .route("/session/:id/share", get(share_link))
        .route("/session/:id/room", post(store_room))
        .route("/session/:id/notify", post(notify_giver))
        .route("/share", post(open_share))
        .route("/room/:room_id/open", post(open_room))
        .route("/ws/:id", get(ws_handler))
        .with_state(state)
}

/// What a screen shows: the roster while editing, giver names once drawn, and
/// at most one revealed pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub state: RevealState,
    pub roster: Vec<Participant>,
    pub givers: Vec<Participant>,
    pub revealed: Option<Assignment>,
}

pub(crate) fn to_view(id: &str, session: &Session) -> SessionView {
    SessionView {
        id: id.to_string(),
        state: session.state(),
        roster: session.roster().participants().to_vec(),
        givers: session.listing().into_iter().cloned().collect(),
        revealed: session.revealed().cloned(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    State(SessionView),
    Event(SessionEvent),
}

#[derive(Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ClientMessage {
    Action(Action),
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: String,
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

#[derive(Deserialize)]
struct GiverRequest {
    giver_id: ParticipantId,
}

#[derive(Deserialize)]
struct DrawParams {
    seed: Option<u64>,
}

#[derive(Serialize)]
struct DrawAccepted {
    ticket: u64,
    state: RevealState,
}

#[derive(Serialize, Deserialize)]
struct ShareToken {
    token: String,
}

#[derive(Deserialize)]
struct RoomRequest {
    label: Option<String>,
}

#[derive(Serialize)]
struct RoomCreated {
    room_id: String,
}

#[derive(Deserialize)]
struct NotifyRequest {
    giver_id: ParticipantId,
    address: String,
}

#[derive(Serialize)]
struct Delivered {
    delivered: bool,
}

async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.insert_session(Session::new()).await;
    info!(%session_id, "session created");
    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&session_id).ok_or(ApiError::SessionNotFound)?;
    Ok(Json(to_view(&session_id, session)))
}

async fn add_participant(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<NameRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let (view, _) = process_action(
        &state,
        &session_id,
        Action::AddParticipant { name: payload.name },
    )
    .await?;
    Ok(Json(view))
}

async fn remove_participant(
    State(state): State<AppState>,
    Path((session_id, participant_id)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    process_action(
        &state,
        &session_id,
        Action::RemoveParticipant {
            id: ParticipantId(participant_id),
        },
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_roster(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    process_action(&state, &session_id, Action::ClearRoster).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_draw(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<DrawParams>,
) -> Result<impl IntoResponse, ApiError> {
    let source = state.draw.source_for(params.seed).map_err(|err| {
        warn!(%session_id, configured = %state.draw.source, "seed override refused");
        err
    })?;
    let (view, events) =
        process_action_with(&state, &session_id, Action::Generate, source).await?;

    let ticket = events
        .iter()
        .find_map(|evt| match evt {
            SessionEvent::DrawStarted { ticket } => Some(*ticket),
            _ => None,
        })
        .unwrap_or_default();
    Ok((
        StatusCode::ACCEPTED,
        Json(DrawAccepted {
            ticket,
            state: view.state,
        }),
    ))
}

async fn reveal(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<GiverRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let (view, _) = process_action(
        &state,
        &session_id,
        Action::Select {
            giver: payload.giver_id,
        },
    )
    .await?;
    Ok(Json(view))
}

async fn toggle(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<GiverRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let (view, _) = process_action(
        &state,
        &session_id,
        Action::Toggle {
            giver: payload.giver_id,
        },
    )
    .await?;
    Ok(Json(view))
}

async fn dismiss(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let (view, _) = process_action(&state, &session_id, Action::Dismiss).await?;
    Ok(Json(view))
}

async fn reset(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let (view, _) = process_action(&state, &session_id, Action::Reset).await?;
    Ok(Json(view))
}

async fn share_link(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ShareToken>, ApiError> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&session_id).ok_or(ApiError::SessionNotFound)?;
    let set = session.assignments().ok_or(ApiError::NotDrawn)?;
    Ok(Json(ShareToken {
        token: share::encode(set),
    }))
}

async fn open_share(
    State(state): State<AppState>,
    Json(payload): Json<ShareToken>,
) -> Result<impl IntoResponse, ApiError> {
    let set = share::decode(&payload.token).map_err(|err| {
        warn!(%err, "share link rejected");
        err
    })?;
    let session_id = state.insert_session(Session::from_assignments(set)).await;
    info!(%session_id, "session opened from share link");
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

async fn store_room(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Option<Json<RoomRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let set = {
        let sessions = state.sessions.read().await;
        let session = sessions.get(&session_id).ok_or(ApiError::SessionNotFound)?;
        session.assignments().cloned().ok_or(ApiError::NotDrawn)?
    };
    let label = payload.and_then(|Json(request)| request.label);
    let room_id = state.rooms.put(set, label).await;
    Ok((StatusCode::CREATED, Json(RoomCreated { room_id })))
}

async fn open_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let room = state.rooms.get(&room_id).await?;
    let session_id = state
        .insert_session(Session::from_assignments(room.assignments))
        .await;
    info!(%session_id, %room_id, "session opened from room");
    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

async fn notify_giver(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(payload): Json<NotifyRequest>,
) -> Result<Json<Delivered>, ApiError> {
    let (giver, receiver) = {
        let sessions = state.sessions.read().await;
        let session = sessions.get(&session_id).ok_or(ApiError::SessionNotFound)?;
        let set = session.assignments().ok_or(ApiError::NotDrawn)?;
        let pair = set
            .find(payload.giver_id)
            .ok_or(SessionError::UnknownGiver(payload.giver_id))?;
        (pair.giver.name.clone(), pair.receiver.name.clone())
    };

    state
        .notifier
        .deliver(&payload.address, &giver, &receiver)
        .await
        .map_err(|err| {
            warn!(%session_id, %err, "delivery failed");
            err
        })?;
    Ok(Json(Delivered { delivered: true }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(stream: WebSocket, state: AppState, session_id: String) {
    let (sender, mut receiver) = stream.split();
    let sender = Arc::new(Mutex::new(sender));

    let snapshot = {
        let sessions = state.sessions.read().await;
        match sessions.get(&session_id) {
            Some(session) => to_view(&session_id, session),
            None => {
                let _ = sender
                    .lock()
                    .await
                    .send(Message::Text("unknown session".into()))
                    .await;
                return;
            }
        }
    };

    let rx = {
        let mut channels = state.channels.write().await;
        channels
            .entry(session_id.clone())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(32);
                tx
            })
            .subscribe()
    };

    if let Ok(text) = serde_json::to_string(&ServerMessage::State(snapshot)) {
        let _ = sender.lock().await.send(Message::Text(text)).await;
    }

    let sender_clone = sender.clone();
    let send_task = tokio::spawn(async move {
        let mut rx = rx;
        while let Ok(msg) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&msg) else {
                continue;
            };
            if sender_clone
                .lock()
                .await
                .send(Message::Text(text))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let state_clone = state.clone();
    let sender_err = sender.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(text))) = receiver.next().await {
            if let Ok(ClientMessage::Action(action)) = serde_json::from_str(&text) {
                if let Err(e) = process_action(&state_clone, &session_id, action).await {
                    let _ = sender_err
                        .lock()
                        .await
                        .send(Message::Text(format!("error:{e}")))
                        .await;
                }
            }
        }
    });

    close_when_either_ends(send_task, recv_task).await;
}

/// Returns once either half of a socket finishes, aborting the other.
async fn close_when_either_ends(mut send_task: JoinHandle<()>, mut recv_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn process_action(
    state: &AppState,
    session_id: &str,
    action: Action,
) -> Result<(SessionView, Vec<SessionEvent>), ApiError> {
    process_action_with(state, session_id, action, state.draw.source).await
}

/// Applies one action under the write lock, then broadcasts and persists. A
/// `generate` action also hands the frozen roster to a background draw.
async fn process_action_with(
    state: &AppState,
    session_id: &str,
    action: Action,
    source: RandomSource,
) -> Result<(SessionView, Vec<SessionEvent>), ApiError> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(session_id)
        .ok_or(ApiError::SessionNotFound)?;

    let events = apply_action(session, action)?;
    let view = to_view(session_id, session);
    let ticket = events
        .iter()
        .any(|evt| matches!(evt, SessionEvent::DrawStarted { .. }))
        .then(|| session.pending_draw())
        .flatten();
    drop(sessions);

    debug!(%session_id, ?events, "action applied");
    state.broadcast(session_id, view.clone(), events.clone()).await;
    if let Some(ticket) = ticket {
        info!(
            %session_id,
            ticket = ticket.id,
            participants = ticket.participants.len(),
            "draw started"
        );
        draw::spawn_draw(state.clone(), session_id.to_string(), ticket, source);
    }
    state.persist().await;

    Ok((view, events))
}
