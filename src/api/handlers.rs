use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::control::{Capability, MemberProfile};
use crate::member::MemberEvent;
use crate::protocol::{ClientRequest, ClipboardData, ControlHost, MemberData, ServerEvent, SystemInit};

use super::error::ApiError;
use super::AppState;

/// Resolve the acting member from the `X-Member-Id` header.
///
/// Session/token issuance lives outside this server; the header is the
/// boundary where the excluded authentication layer hands us an identity.
fn acting_member(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-member-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MemberRequired)
}

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
}

pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ── Room: screenshot ───────────────────────────────────────────────

pub(super) async fn screenshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let member = acting_member(&headers)?;
    let bytes = state.room.screenshot(&member).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/jpeg")],
        bytes,
    )
        .into_response())
}

// ── Room: clipboard ────────────────────────────────────────────────

pub(super) async fn clipboard_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ClipboardData>, ApiError> {
    let member = acting_member(&headers)?;
    let text = state.room.clipboard_text(&member)?;
    Ok(Json(ClipboardData { text }))
}

pub(super) async fn clipboard_set(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ClipboardData>,
) -> Result<StatusCode, ApiError> {
    let member = acting_member(&headers)?;
    state.room.set_clipboard(&member, payload.text)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Room: control ──────────────────────────────────────────────────

pub(super) async fn control_status(State(state): State<AppState>) -> Json<ControlHost> {
    Json(ControlHost::from(state.room.host().current()))
}

pub(super) async fn control_request(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlHost>, ApiError> {
    let member = acting_member(&headers)?;
    state.room.request_control(&member)?;
    Ok(Json(ControlHost::from(state.room.host().current())))
}

pub(super) async fn control_release(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlHost>, ApiError> {
    let member = acting_member(&headers)?;
    state.room.release_control(&member)?;
    Ok(Json(ControlHost::from(state.room.host().current())))
}

// ── Members ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct MemberCreateRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    profile: MemberProfile,
}

pub(super) async fn members_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MemberData>>, ApiError> {
    let actor = acting_member(&headers)?;
    state.room.authorize(&actor, Capability::Admin, false)?;

    let mut members: Vec<MemberData> = state
        .room
        .members()
        .list()
        .into_iter()
        .map(|(id, profile)| MemberData { id, profile })
        .collect();
    members.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(Json(members))
}

pub(super) async fn members_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MemberCreateRequest>,
) -> Result<(StatusCode, Json<MemberData>), ApiError> {
    let actor = acting_member(&headers)?;
    state.room.authorize(&actor, Capability::Admin, false)?;

    let profile = payload.profile;
    let id = state.room.members().create(payload.id, profile.clone())?;
    Ok((StatusCode::CREATED, Json(MemberData { id, profile })))
}

pub(super) async fn members_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<MemberData>, ApiError> {
    let actor = acting_member(&headers)?;
    state.room.authorize(&actor, Capability::Admin, false)?;

    let profile = state
        .room
        .members()
        .get(&id)
        .ok_or_else(|| ApiError::MemberNotFound(id.clone()))?;
    Ok(Json(MemberData { id, profile }))
}

pub(super) async fn members_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(profile): Json<MemberProfile>,
) -> Result<Json<MemberData>, ApiError> {
    let actor = acting_member(&headers)?;
    state.room.authorize(&actor, Capability::Admin, false)?;

    state.room.members().update(&id, profile.clone())?;
    Ok(Json(MemberData { id, profile }))
}

pub(super) async fn members_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let actor = acting_member(&headers)?;
    state.room.authorize(&actor, Capability::Admin, false)?;

    state
        .room
        .remove_member(&id)
        .ok_or(ApiError::MemberNotFound(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Event stream ───────────────────────────────────────────────────

pub(super) async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let member = match acting_member(&headers) {
        Ok(member) => member,
        Err(e) => return e.into_response(),
    };
    // Connecting to the event stream is itself a gated action.
    if let Err(e) = state.room.authorize(&member, Capability::Connect, false) {
        return ApiError::from(e).into_response();
    }
    ws.on_upgrade(move |socket| handle_ws_events(socket, state, member))
}

async fn handle_ws_events(socket: WebSocket, state: AppState, member: String) {
    // Register this connection for graceful shutdown tracking.
    let (_guard, mut shutdown_rx) = state.shutdown.register();

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before snapshotting the init state, so a transfer that lands
    // between the snapshot and the loop below is streamed rather than lost.
    let mut host_rx = state.room.host().subscribe();
    let mut member_events = state.room.members().subscribe_events();

    let init = ServerEvent::SystemInit(SystemInit {
        member_id: member.clone(),
        control_host: ControlHost::from(host_rx.borrow_and_update().clone()),
        members: state.room.members().list().into_iter().collect(),
    });
    if send_event(&mut ws_tx, &init).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Host transfers -> control/host events
            changed = host_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let occupant = host_rx.borrow_and_update().clone();
                let event = ServerEvent::ControlHost(ControlHost::from(occupant));
                if send_event(&mut ws_tx, &event).await.is_err() {
                    break;
                }
            }

            // Member lifecycle -> member/* events
            result = member_events.recv() => {
                let event = match result {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                };
                if let Some(event) = member_event_to_wire(&state, event) {
                    if send_event(&mut ws_tx, &event).await.is_err() {
                        break;
                    }
                }
            }

            // Client requests: clipboard and control transfer
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_request(&state, &member, &text, &mut ws_tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Ping/Pong handled automatically
                    Some(Err(_)) => break,
                }
            }

            // Shutdown signal
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!("event stream received shutdown signal, closing");
                    let close_frame = CloseFrame {
                        code: axum::extract::ws::close_code::NORMAL,
                        reason: "server shutting down".into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(close_frame))).await;
                    let _ = ws_tx.flush().await;
                    break;
                }
            }
        }
    }
}

async fn send_event(
    ws_tx: &mut (impl SinkExt<Message> + Unpin),
    event: &ServerEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    ws_tx.send(Message::Text(text.into())).await.map_err(|_| ())
}

fn member_event_to_wire(state: &AppState, event: MemberEvent) -> Option<ServerEvent> {
    match event {
        MemberEvent::Created { id } => {
            let profile = state.room.members().get(&id)?;
            Some(ServerEvent::MemberCreated(MemberData { id, profile }))
        }
        MemberEvent::Updated { id } => {
            let profile = state.room.members().get(&id)?;
            Some(ServerEvent::MemberUpdated(MemberData { id, profile }))
        }
        MemberEvent::Removed { id } => Some(ServerEvent::MemberRemoved { id }),
    }
}

/// Dispatch one client request from the event stream. Failures are reported
/// as `system/error` events; the denial reason is passed through verbatim.
async fn handle_client_request(
    state: &AppState,
    member: &str,
    text: &str,
    ws_tx: &mut (impl SinkExt<Message> + Unpin),
) {
    let request = match serde_json::from_str::<ClientRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            let event = ServerEvent::SystemError {
                message: format!("invalid request: {e}"),
            };
            let _ = send_event(ws_tx, &event).await;
            return;
        }
    };

    let result = match request {
        ClientRequest::ClipboardSet(payload) => state.room.set_clipboard(member, payload.text),
        ClientRequest::ControlRequest => state.room.request_control(member),
        ClientRequest::ControlRelease => state.room.release_control(member),
    };

    if let Err(e) = result {
        let event = ServerEvent::SystemError {
            message: e.to_string(),
        };
        let _ = send_event(ws_tx, &event).await;
    }
}
