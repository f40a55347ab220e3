use uuid::Uuid;

use crate::models::{Badge, NotificationData, NotificationKind, Priority};

/// A notification that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: NotificationData,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        data: NotificationData,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            data,
        }
    }

    pub fn priority(&self) -> Priority {
        self.kind.priority()
    }

    pub fn welcome(user_id: Uuid, starting_points: i64) -> Self {
        Self::new(
            user_id,
            NotificationKind::SystemAnnouncement,
            "Welcome to ReWear!",
            format!(
                "Thank you for joining our sustainable fashion community. You have {} points to start swapping!",
                starting_points
            ),
            NotificationData::default(),
        )
    }

    pub fn swap_request(
        recipient_id: Uuid,
        swap_id: Uuid,
        sender_id: Uuid,
        item_id: Uuid,
        item_title: &str,
    ) -> Self {
        Self::new(
            recipient_id,
            NotificationKind::SwapRequest,
            "New Swap Request",
            format!("Someone wants to swap with your \"{}\"", item_title),
            NotificationData {
                swap_id: Some(swap_id),
                sender_id: Some(sender_id),
                item_id: Some(item_id),
                url: Some(swap_url(swap_id)),
                ..Default::default()
            },
        )
    }

    pub fn swap_accepted(initiator_id: Uuid, swap_id: Uuid, item_title: &str) -> Self {
        Self::new(
            initiator_id,
            NotificationKind::SwapAccepted,
            "Swap Accepted!",
            format!("Your swap request for \"{}\" was accepted!", item_title),
            swap_data(swap_id),
        )
    }

    pub fn swap_rejected(initiator_id: Uuid, swap_id: Uuid, item_title: &str) -> Self {
        Self::new(
            initiator_id,
            NotificationKind::SwapRejected,
            "Swap Rejected",
            format!("Your swap request for \"{}\" was rejected.", item_title),
            swap_data(swap_id),
        )
    }

    /// The other side of a pending swap whose item was deleted by its owner.
    /// Carries no references since the item and swap are gone.
    pub fn swap_withdrawn(user_id: Uuid, item_title: &str) -> Self {
        Self::new(
            user_id,
            NotificationKind::SwapRejected,
            "Swap Closed",
            format!(
                "The swap involving \"{}\" was closed because the owner removed the item.",
                item_title
            ),
            NotificationData::default(),
        )
    }

    pub fn swap_completed(user_id: Uuid, swap_id: Uuid, item_title: &str) -> Self {
        Self::new(
            user_id,
            NotificationKind::SwapCompleted,
            "Swap Completed",
            format!("The swap for \"{}\" has been marked as completed.", item_title),
            swap_data(swap_id),
        )
    }

    pub fn item_approved(owner_id: Uuid, item_id: Uuid, item_title: &str) -> Self {
        Self::new(
            owner_id,
            NotificationKind::ItemApproved,
            "Item Approved!",
            format!("Your item \"{}\" has been approved and is now live.", item_title),
            item_data(item_id),
        )
    }

    pub fn item_rejected(owner_id: Uuid, item_id: Uuid, item_title: &str, reason: &str) -> Self {
        Self::new(
            owner_id,
            NotificationKind::ItemRejected,
            "Item Rejected",
            format!("Your item \"{}\" was rejected: {}", item_title, reason),
            item_data(item_id),
        )
    }

    pub fn points_earned(user_id: Uuid, points: i64, reason: &str) -> Self {
        Self::new(
            user_id,
            NotificationKind::PointsEarned,
            "Points Earned!",
            format!("You earned {} points for {}", points, reason),
            NotificationData {
                points: Some(points),
                ..Default::default()
            },
        )
    }

    pub fn badge_earned(user_id: Uuid, badge: Badge) -> Self {
        Self::new(
            user_id,
            NotificationKind::BadgeEarned,
            "New Badge Earned!",
            format!("Congratulations! You earned the \"{}\" badge.", badge),
            NotificationData {
                badge: Some(badge),
                ..Default::default()
            },
        )
    }

    pub fn new_message(recipient_id: Uuid, sender_id: Uuid, swap_id: Uuid) -> Self {
        Self::new(
            recipient_id,
            NotificationKind::NewMessage,
            "New Message",
            "You have a new message in your swap conversation.",
            NotificationData {
                swap_id: Some(swap_id),
                sender_id: Some(sender_id),
                url: Some(swap_url(swap_id)),
                ..Default::default()
            },
        )
    }
}

fn swap_url(swap_id: Uuid) -> String {
    format!("/swaps/{}", swap_id)
}

fn swap_data(swap_id: Uuid) -> NotificationData {
    NotificationData {
        swap_id: Some(swap_id),
        url: Some(swap_url(swap_id)),
        ..Default::default()
    }
}

fn item_data(item_id: Uuid) -> NotificationData {
    NotificationData {
        item_id: Some(item_id),
        url: Some(format!("/items/{}", item_id)),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_request_references_item_and_sender() {
        let (owner, swap, sender, item) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let n = NewNotification::swap_request(owner, swap, sender, item, "Denim Jacket");

        assert_eq!(n.user_id, owner);
        assert_eq!(n.kind, NotificationKind::SwapRequest);
        assert_eq!(n.priority(), Priority::High);
        assert_eq!(n.data.item_id, Some(item));
        assert_eq!(n.data.sender_id, Some(sender));
        assert!(n.message.contains("Denim Jacket"));
    }

    #[test]
    fn rejection_reason_is_in_message() {
        let n = NewNotification::item_rejected(Uuid::new_v4(), Uuid::new_v4(), "Scarf", "blurry photos");
        assert_eq!(n.message, "Your item \"Scarf\" was rejected: blurry photos");
        assert_eq!(n.priority(), Priority::Medium);
    }

    #[test]
    fn withdrawn_swaps_name_the_item() {
        let n = NewNotification::swap_withdrawn(Uuid::new_v4(), "Scarf");
        assert_eq!(n.kind, NotificationKind::SwapRejected);
        assert_eq!(n.data, NotificationData::default());
        assert!(n.message.contains("\"Scarf\""));
    }
}
