use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use rewear_types::events::{Addressed, ServerEvent};
use rewear_types::models::{Notification, Swap};

/// Fans user-addressed events out to every open gateway connection; each
/// connection keeps only its own user's events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    tx: broadcast::Sender<Addressed>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Addressed> {
        self.inner.tx.subscribe()
    }

    /// Send an event to one user. Dropped silently when nobody is connected.
    pub fn publish(&self, user_id: Uuid, event: ServerEvent) {
        let _ = self.inner.tx.send(Addressed { user_id, event });
    }

    pub fn notify(&self, notification: Notification) {
        self.publish(
            notification.user_id,
            ServerEvent::NotificationCreate { notification },
        );
    }

    pub fn notify_all(&self, notifications: impl IntoIterator<Item = Notification>) {
        for notification in notifications {
            self.notify(notification);
        }
    }

    /// Tell both participants that a swap changed status.
    pub fn swap_updated(&self, swap: &Swap) {
        for user_id in [swap.initiator.id, swap.recipient.id] {
            self.publish(
                user_id,
                ServerEvent::SwapUpdate {
                    swap_id: swap.id,
                    status: swap.status,
                },
            );
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_addressed_events() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();
        let user_id = Uuid::new_v4();

        dispatcher.publish(
            user_id,
            ServerEvent::Ready {
                user_id,
                name: "Ada".into(),
            },
        );

        let received = rx.recv().await.unwrap();
        assert_eq!(received.user_id, user_id);
        assert!(matches!(received.event, ServerEvent::Ready { .. }));
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        Dispatcher::new().publish(
            Uuid::new_v4(),
            ServerEvent::Ready {
                user_id: Uuid::new_v4(),
                name: "nobody".into(),
            },
        );
    }
}
