use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::rejection::WebSocketUpgradeRejection,
        ws::{Message, WebSocket},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use rewear_types::events::{Addressed, ServerEvent};

use crate::auth::{AppState, decode_token};
use crate::dispatcher::Dispatcher;
use crate::error::ApiError;

/// Server sends a Ping every 15 seconds; two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// `GET /gateway?token=<jwt>`. The token is checked before the upgrade so an
/// unauthenticated client never gets a socket.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<GatewayQuery>, ApiError>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or(ApiError::Unauthorized("No token provided"))?;
    let claims = decode_token(&state.jwt_secret, &token)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let dispatcher = state.dispatcher.clone();
    Ok(ws
        .on_upgrade(move |socket| handle_connection(socket, dispatcher, claims.sub, claims.name))
        .into_response())
}

pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, user_id: Uuid, name: String) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before Ready so nothing published in between is missed
    let mut events = dispatcher.subscribe();

    let ready = ServerEvent::Ready {
        user_id,
        name: name.clone(),
    };
    if !send_event(&mut sender, &ready).await {
        return;
    }
    info!("{} ({}) connected to gateway", name, user_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = next_event_for(&mut events, user_id) => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout for {} (missed {} pongs), dropping connection", user_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The stream is server-push only; clients just answer pings.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_flag_recv.store(true, Ordering::Release),
                Message::Close(_) => break,
                Message::Text(text) => {
                    trace!("{} sent {} bytes of text, ignored", user_id, text.len());
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", name, user_id);
}

/// Waits for the next event addressed to `user_id`, skipping everyone
/// else's. `None` once the dispatcher is gone.
async fn next_event_for(
    events: &mut broadcast::Receiver<Addressed>,
    user_id: Uuid,
) -> Option<ServerEvent> {
    loop {
        match events.recv().await {
            Ok(addressed) if addressed.user_id == user_id => return Some(addressed.event),
            Ok(_) => continue,
            Err(RecvError::Lagged(n)) => {
                warn!("Gateway receiver for {} lagged by {} events", user_id, n);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Returns false once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewear_types::models::SwapStatus;

    fn ready(user_id: Uuid) -> ServerEvent {
        ServerEvent::Ready {
            user_id,
            name: "someone".into(),
        }
    }

    #[tokio::test]
    async fn connections_only_see_their_own_events() {
        let dispatcher = Dispatcher::new();
        let mut events = dispatcher.subscribe();
        let ada = Uuid::new_v4();
        let grace = Uuid::new_v4();
        let swap_id = Uuid::new_v4();

        dispatcher.publish(grace, ready(grace));
        dispatcher.publish(
            ada,
            ServerEvent::SwapUpdate {
                swap_id,
                status: SwapStatus::Accepted,
            },
        );
        dispatcher.publish(grace, ready(grace));
        dispatcher.publish(ada, ready(ada));
        drop(dispatcher);

        match next_event_for(&mut events, ada).await {
            Some(ServerEvent::SwapUpdate { swap_id: id, status }) => {
                assert_eq!(id, swap_id);
                assert_eq!(status, SwapStatus::Accepted);
            }
            other => panic!("unexpected {:?}", other),
        }
        match next_event_for(&mut events, ada).await {
            Some(ServerEvent::Ready { user_id, .. }) => assert_eq!(user_id, ada),
            other => panic!("unexpected {:?}", other),
        }
        assert!(next_event_for(&mut events, ada).await.is_none());
    }

    #[tokio::test]
    async fn lagging_receivers_keep_going() {
        let (tx, mut events) = broadcast::channel(2);
        let ada = Uuid::new_v4();
        for _ in 0..5 {
            tx.send(Addressed {
                user_id: ada,
                event: ready(ada),
            })
            .unwrap();
        }
        drop(tx);

        let mut seen = 0;
        while next_event_for(&mut events, ada).await.is_some() {
            seen += 1;
        }
        assert_eq!(seen, 2);
    }
}
