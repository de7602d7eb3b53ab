//! WebSocket surface: the room framing protocol.
//!
//! Clients upgrade at `/ws/{roomId}` and must send a `join` frame first;
//! everything after that is the room message protocol. Identity and
//! admission failures close the socket with the protocol's close codes; all
//! other failures are in-band frames.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use ulid::Ulid;

use hexhold_protocol::ClientMessage;

use crate::http::AppState;
use crate::rooms::{
    JoinOutcome, RoomCommand, RoomHandle, Session, SessionFrame, CLOSE_INVALID, OUTBOUND_BUFFER,
};

pub async fn ws_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(room) = state.registry.get_or_restore(&room_id).await else {
        return (StatusCode::NOT_FOUND, "unknown room").into_response();
    };
    let join_timeout = state.registry.config().join_timeout;
    ws.on_upgrade(move |socket| handle_socket(socket, room, join_timeout))
}

async fn handle_socket(socket: WebSocket, room: RoomHandle, join_timeout: std::time::Duration) {
    let (mut sink, mut stream) = socket.split();

    // The first frame must be a join.
    let first = tokio::time::timeout(join_timeout, stream.next()).await;
    let join = match first {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str::<ClientMessage>(&text).ok(),
        _ => None,
    };
    let Some(ClientMessage::Join { player_id, token }) = join else {
        let _ = sink
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_INVALID,
                reason: "expected join frame".into(),
            })))
            .await;
        return;
    };

    let (tx, mut rx) = mpsc::channel::<SessionFrame>(OUTBOUND_BUFFER);
    let session = Session::new(Ulid::new().to_string(), player_id, tx);
    let session_id = session.id.clone();

    let (reply_tx, reply_rx) = oneshot::channel();
    if !room
        .send(RoomCommand::Join {
            session,
            token,
            reply: reply_tx,
        })
        .await
    {
        return;
    }
    match reply_rx.await {
        Ok(JoinOutcome::Accepted) => {}
        Ok(JoinOutcome::Rejected { code, reason }) => {
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })))
                .await;
            return;
        }
        Err(_) => return,
    }

    // Writer: drains the session's outbound channel onto the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                SessionFrame::Message(msg) => {
                    let Ok(text) = serde_json::to_string(&msg) else {
                        continue;
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                SessionFrame::Close(code, reason) => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // Reader: forwards frames to the room until the client goes away.
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => {
                    let delivered = room
                        .send(RoomCommand::Inbound {
                            session_id: session_id.clone(),
                            message,
                        })
                        .await;
                    if !delivered {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(session = %session_id, error = %err, "unparseable frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    let _ = room.send(RoomCommand::Leave { session_id }).await;
    writer.abort();
}
