use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Notification, SwapStatus};

/// Events pushed to a user over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Server confirms the connection is authenticated
    Ready { user_id: Uuid, name: String },

    /// A notification was stored for this user
    NotificationCreate { notification: Notification },

    /// A swap this user takes part in changed status
    SwapUpdate { swap_id: Uuid, status: SwapStatus },

    /// A chat message was posted on one of this user's swaps
    ChatMessage { message: ChatMessage },
}

/// A `ServerEvent` together with the only user allowed to see it.
#[derive(Debug, Clone)]
pub struct Addressed {
    pub user_id: Uuid,
    pub event: ServerEvent,
}
