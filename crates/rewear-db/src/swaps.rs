use anyhow::{Result, anyhow};
use rewear_types::models::{
    ChatMessage, ECO_IMPACT_PER_PARTICIPANT, ECO_IMPACT_PER_SWAP, EnumText, ItemImage, ItemStatus, ItemSummary,
    Notification, Swap, SwapRating, SwapRatings, SwapStatus, SwapType, UserSummary,
};
use rewear_types::notifications::NewNotification;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use crate::models::{get_enum, get_json, get_opt_time, get_opt_uuid, get_time, get_uuid};
use crate::notifications::insert_notification;
use crate::users::award_badges;
use crate::{Database, NewSwap, Rejected, SwapOutcome, now};

const SWAP_SELECT: &str = "SELECT s.id, \
     s.initiator_id, ui.name, ui.avatar, \
     s.recipient_id, ur.name, ur.avatar, \
     s.requested_item_id, ri.title, ri.images, ri.points_required, ri.owner_id, \
     s.offered_item_id, oi.title, oi.images, oi.points_required, oi.owner_id, \
     s.points_offered, s.swap_type, s.status, s.message, s.response_message, \
     s.completed_at, s.cancelled_at, s.cancelled_by, s.cancellation_reason, s.eco_impact, \
     s.created_at, s.updated_at \
     FROM swaps s \
     JOIN users ui ON ui.id = s.initiator_id \
     JOIN users ur ON ur.id = s.recipient_id \
     JOIN items ri ON ri.id = s.requested_item_id \
     LEFT JOIN items oi ON oi.id = s.offered_item_id";

fn item_summary(row: &Row, base: usize) -> rusqlite::Result<ItemSummary> {
    let images: Vec<ItemImage> = get_json(row, base + 2)?;
    let primary_image = images
        .iter()
        .find(|img| img.is_primary)
        .or_else(|| images.first())
        .map(|img| img.url.clone());
    Ok(ItemSummary {
        id: get_uuid(row, base)?,
        title: row.get(base + 1)?,
        primary_image,
        points_required: row.get(base + 3)?,
        owner_id: get_uuid(row, base + 4)?,
    })
}

fn map_swap(row: &Row) -> rusqlite::Result<Swap> {
    let offered: Option<String> = row.get(12)?;
    Ok(Swap {
        id: get_uuid(row, 0)?,
        initiator: UserSummary {
            id: get_uuid(row, 1)?,
            name: row.get(2)?,
            avatar: row.get(3)?,
        },
        recipient: UserSummary {
            id: get_uuid(row, 4)?,
            name: row.get(5)?,
            avatar: row.get(6)?,
        },
        requested_item: item_summary(row, 7)?,
        offered_item: match offered {
            Some(_) => Some(item_summary(row, 12)?),
            None => None,
        },
        points_offered: row.get(17)?,
        swap_type: get_enum(row, 18)?,
        status: get_enum(row, 19)?,
        message: row.get(20)?,
        response_message: row.get(21)?,
        completed_at: get_opt_time(row, 22)?,
        cancelled_at: get_opt_time(row, 23)?,
        cancelled_by: get_opt_uuid(row, 24)?,
        cancellation_reason: row.get(25)?,
        eco_impact: row.get(26)?,
        ratings: SwapRatings::default(),
        chat_messages: Vec::new(),
        created_at: get_time(row, 27)?,
        updated_at: get_time(row, 28)?,
    })
}

fn map_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: get_uuid(row, 0)?,
        swap_id: get_uuid(row, 1)?,
        sender_id: get_uuid(row, 2)?,
        message: row.get(3)?,
        is_read: row.get(4)?,
        created_at: get_time(row, 5)?,
    })
}

/// The swap row alone, without chat or ratings.
fn query_swap(conn: &Connection, id: Uuid) -> Result<Option<Swap>> {
    let sql = format!("{} WHERE s.id = ?1", SWAP_SELECT);
    let swap = conn.query_row(&sql, [id.to_string()], map_swap).optional()?;
    Ok(swap)
}

/// The swap with its chat history and ratings.
fn query_swap_detail(conn: &Connection, id: Uuid) -> Result<Option<Swap>> {
    let Some(mut swap) = query_swap(conn, id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, swap_id, sender_id, message, is_read, created_at FROM swap_messages \
         WHERE swap_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    swap.chat_messages = stmt
        .query_map([id.to_string()], map_message)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT rater_id, rating, comment, created_at FROM swap_ratings WHERE swap_id = ?1",
    )?;
    let ratings = stmt
        .query_map([id.to_string()], |row| {
            Ok((
                get_uuid(row, 0)?,
                SwapRating {
                    rating: row.get(1)?,
                    comment: row.get(2)?,
                    created_at: get_time(row, 3)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (rater_id, rating) in ratings {
        if rater_id == swap.initiator.id {
            swap.ratings.initiator = Some(rating);
        } else {
            swap.ratings.recipient = Some(rating);
        }
    }

    Ok(Some(swap))
}

fn require_swap(conn: &Connection, id: Uuid) -> Result<Swap> {
    query_swap(conn, id)?.ok_or_else(|| Rejected::new("Swap not found", "The swap no longer exists").into())
}

/// Moves a swap from `from` to `to`, failing if another writer got there first.
fn guarded_transition(
    conn: &Connection,
    id: Uuid,
    from: &[SwapStatus],
    to: SwapStatus,
    extra_sets: &str,
    extra: &[Value],
) -> Result<()> {
    let allowed = from
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE swaps SET status = ?, updated_at = ?{} WHERE id = ? AND status IN ({})",
        extra_sets, allowed
    );

    let mut values = vec![Value::Text(to.as_str().into()), Value::Text(now())];
    values.extend(extra.iter().cloned());
    values.push(Value::Text(id.to_string()));

    if conn.execute(&sql, params_from_iter(values))? == 0 {
        return Err(Rejected::new(
            "Invalid swap state",
            format!("This swap can no longer be moved to {}", to),
        )
        .into());
    }
    Ok(())
}

fn opt_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

/// Flips a listing to Swapped, failing if it was taken or withdrawn meanwhile.
fn mark_swapped(conn: &Connection, item: &ItemSummary) -> Result<()> {
    let changed = conn.execute(
        "UPDATE items SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        params![
            item.id.to_string(),
            ItemStatus::Swapped.as_str(),
            now(),
            ItemStatus::Available.as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(Rejected::new(
            "Item not available",
            format!("\"{}\" is no longer available", item.title),
        )
        .into());
    }
    Ok(())
}

fn page_swaps(
    conn: &Connection,
    filter: &str,
    mut values: Vec<Value>,
    offset: u32,
    limit: u32,
) -> Result<(Vec<Swap>, i64)> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM swaps s WHERE {}", filter),
        params_from_iter(values.iter()),
        |r| r.get(0),
    )?;

    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(offset as i64));
    let sql = format!(
        "{} WHERE {} ORDER BY s.created_at DESC, s.rowid DESC LIMIT ? OFFSET ?",
        SWAP_SELECT, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let swaps = stmt
        .query_map(params_from_iter(values.iter()), map_swap)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok((swaps, total))
}

impl Database {
    /// Records a Pending request. A user holds at most one pending request
    /// per item. The recipient is notified only when `notify_recipient` is set.
    pub fn create_swap(&self, new: &NewSwap, notify_recipient: bool) -> Result<(Swap, Option<Notification>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let duplicate: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM swaps WHERE initiator_id = ?1 AND requested_item_id = ?2 \
                 AND status = 'Pending')",
                params![new.initiator_id.to_string(), new.requested_item_id.to_string()],
                |r| r.get(0),
            )?;
            if duplicate {
                return Err(Rejected::new(
                    "Duplicate request",
                    "You already have a pending swap request for this item",
                )
                .into());
            }

            let id = Uuid::new_v4();
            let ts = now();
            tx.execute(
                "INSERT INTO swaps (id, initiator_id, recipient_id, requested_item_id, offered_item_id, \
                 points_offered, swap_type, status, message, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    id.to_string(),
                    new.initiator_id.to_string(),
                    new.recipient_id.to_string(),
                    new.requested_item_id.to_string(),
                    new.offered_item_id.map(|id| id.to_string()),
                    new.points_offered,
                    new.swap_type.as_str(),
                    SwapStatus::Pending.as_str(),
                    new.message,
                    ts,
                ],
            )?;

            let swap = query_swap(&tx, id)?.ok_or_else(|| anyhow!("swap {} missing after insert", id))?;
            let notification = if notify_recipient {
                Some(insert_notification(
                    &tx,
                    &NewNotification::swap_request(
                        new.recipient_id,
                        id,
                        new.initiator_id,
                        new.requested_item_id,
                        &swap.requested_item.title,
                    ),
                )?)
            } else {
                None
            };

            tx.commit()?;
            Ok((swap, notification))
        })
    }

    pub fn get_swap(&self, id: Uuid) -> Result<Option<Swap>> {
        self.with_conn(|conn| query_swap(conn, id))
    }

    pub fn get_swap_detail(&self, id: Uuid) -> Result<Option<Swap>> {
        self.with_conn(|conn| query_swap_detail(conn, id))
    }

    /// Swaps the user started or received, newest first.
    pub fn list_user_swaps(
        &self,
        user_id: Uuid,
        status: Option<SwapStatus>,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Swap>, i64)> {
        self.with_conn(|conn| {
            let mut filter = String::from("(s.initiator_id = ? OR s.recipient_id = ?)");
            let mut values = vec![Value::Text(user_id.to_string()), Value::Text(user_id.to_string())];
            if let Some(status) = status {
                filter.push_str(" AND s.status = ?");
                values.push(Value::Text(status.as_str().into()));
            }
            page_swaps(conn, &filter, values, offset, limit)
        })
    }

    /// Incoming requests still waiting on this user.
    pub fn pending_swaps(&self, recipient_id: Uuid) -> Result<Vec<Swap>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE s.recipient_id = ?1 AND s.status = 'Pending' ORDER BY s.created_at DESC, s.rowid DESC",
                SWAP_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let swaps = stmt
                .query_map([recipient_id.to_string()], map_swap)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(swaps)
        })
    }

    pub fn list_all_swaps(&self, status: Option<SwapStatus>, offset: u32, limit: u32) -> Result<(Vec<Swap>, i64)> {
        self.with_conn(|conn| {
            let (filter, values) = match status {
                Some(status) => ("s.status = ?", vec![Value::Text(status.as_str().into())]),
                None => ("1 = 1", vec![]),
            };
            page_swaps(conn, filter, values, offset, limit)
        })
    }

    /// Accepts a pending swap in one transaction: both listings become
    /// Swapped, points move for redemptions, both members' stats and badges
    /// update, and every resulting notification is stored.
    pub fn accept_swap(&self, id: Uuid, response_message: Option<&str>) -> Result<SwapOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swap = require_swap(&tx, id)?;

            guarded_transition(
                &tx,
                id,
                &[SwapStatus::Pending],
                SwapStatus::Accepted,
                ", response_message = ?",
                &[opt_text(response_message)],
            )?;

            mark_swapped(&tx, &swap.requested_item)?;
            if let Some(offered) = &swap.offered_item {
                mark_swapped(&tx, offered)?;
            }

            let initiator = swap.initiator.id;
            let recipient = swap.recipient.id;
            let title = swap.requested_item.title.as_str();
            let mut notifications = Vec::new();

            if swap.swap_type == SwapType::PointsRedemption {
                let points = swap.points_offered.unwrap_or(0);
                let debited = tx.execute(
                    "UPDATE users SET points = points - ?2 WHERE id = ?1 AND points >= ?2",
                    params![initiator.to_string(), points],
                )?;
                if debited == 0 {
                    return Err(Rejected::new(
                        "Insufficient points",
                        "The requester no longer has enough points for this swap",
                    )
                    .into());
                }
                tx.execute(
                    "UPDATE users SET points = points + ?2 WHERE id = ?1",
                    params![recipient.to_string(), points],
                )?;
                notifications.push(insert_notification(
                    &tx,
                    &NewNotification::points_earned(recipient, points, &format!("swapping \"{}\"", title)),
                )?);
            }

            let ts = now();
            let recipient_receives = swap.offered_item.is_some();
            for (user_id, received) in [(initiator, true), (recipient, recipient_receives)] {
                tx.execute(
                    "UPDATE users SET total_swaps = total_swaps + 1, eco_impact = eco_impact + ?2, \
                     items_received = items_received + ?3, updated_at = ?4 WHERE id = ?1",
                    params![user_id.to_string(), ECO_IMPACT_PER_PARTICIPANT, received as i64, ts],
                )?;
            }

            notifications.push(insert_notification(
                &tx,
                &NewNotification::swap_accepted(initiator, id, title),
            )?);
            for user_id in [initiator, recipient] {
                notifications.extend(award_badges(&tx, user_id)?);
            }

            let swap = query_swap(&tx, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))?;
            tx.commit()?;
            Ok(SwapOutcome { swap, notifications })
        })
    }

    pub fn reject_swap(&self, id: Uuid, response_message: Option<&str>) -> Result<SwapOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swap = require_swap(&tx, id)?;

            guarded_transition(
                &tx,
                id,
                &[SwapStatus::Pending],
                SwapStatus::Rejected,
                ", response_message = ?",
                &[opt_text(response_message)],
            )?;
            let notification = insert_notification(
                &tx,
                &NewNotification::swap_rejected(swap.initiator.id, id, &swap.requested_item.title),
            )?;

            let swap = query_swap(&tx, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))?;
            tx.commit()?;
            Ok(SwapOutcome {
                swap,
                notifications: vec![notification],
            })
        })
    }

    /// Marks an accepted swap as done; the other participant is notified.
    pub fn complete_swap(&self, id: Uuid, completed_by: Uuid) -> Result<SwapOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swap = require_swap(&tx, id)?;

            guarded_transition(
                &tx,
                id,
                &[SwapStatus::Accepted],
                SwapStatus::Completed,
                ", completed_at = ?, eco_impact = ?",
                &[Value::Text(now()), Value::Real(ECO_IMPACT_PER_SWAP)],
            )?;
            let notification = insert_notification(
                &tx,
                &NewNotification::swap_completed(swap.counterpart(completed_by), id, &swap.requested_item.title),
            )?;

            let swap = query_swap(&tx, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))?;
            tx.commit()?;
            Ok(SwapOutcome {
                swap,
                notifications: vec![notification],
            })
        })
    }

    /// Cancels a pending or accepted swap. Listings and points stay as they are.
    pub fn cancel_swap(&self, id: Uuid, cancelled_by: Uuid, reason: Option<&str>) -> Result<SwapOutcome> {
        self.with_conn(|conn| {
            require_swap(conn, id)?;
            guarded_transition(
                conn,
                id,
                &[SwapStatus::Pending, SwapStatus::Accepted],
                SwapStatus::Cancelled,
                ", cancelled_at = ?, cancelled_by = ?, cancellation_reason = ?",
                &[
                    Value::Text(now()),
                    Value::Text(cancelled_by.to_string()),
                    opt_text(reason),
                ],
            )?;
            let swap = query_swap(conn, id)?.ok_or_else(|| anyhow!("swap {} vanished", id))?;
            Ok(SwapOutcome {
                swap,
                notifications: vec![],
            })
        })
    }

    /// Appends a chat message to an open swap and notifies the other participant.
    pub fn add_chat_message(&self, swap_id: Uuid, sender_id: Uuid, message: &str) -> Result<(ChatMessage, Notification)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swap = require_swap(&tx, swap_id)?;
            if swap.status.is_terminal() {
                return Err(Rejected::new(
                    "Swap closed",
                    format!("Cannot send messages on a {} swap", swap.status.as_str().to_lowercase()),
                )
                .into());
            }

            let id = Uuid::new_v4();
            let ts = now();
            tx.execute(
                "INSERT INTO swap_messages (id, swap_id, sender_id, message, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), swap_id.to_string(), sender_id.to_string(), message, ts],
            )?;
            tx.execute(
                "UPDATE swaps SET updated_at = ?2 WHERE id = ?1",
                params![swap_id.to_string(), ts],
            )?;

            let chat = tx.query_row(
                "SELECT id, swap_id, sender_id, message, is_read, created_at FROM swap_messages WHERE id = ?1",
                [id.to_string()],
                map_message,
            )?;
            let notification = insert_notification(
                &tx,
                &NewNotification::new_message(swap.counterpart(sender_id), sender_id, swap_id),
            )?;

            tx.commit()?;
            Ok((chat, notification))
        })
    }

    /// Marks the messages the other participant sent as read.
    pub fn mark_messages_read(&self, swap_id: Uuid, reader_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE swap_messages SET is_read = 1 WHERE swap_id = ?1 AND sender_id != ?2 AND is_read = 0",
                params![swap_id.to_string(), reader_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    /// Records a participant's one rating of a completed swap.
    pub fn rate_swap(&self, swap_id: Uuid, rater_id: Uuid, rating: u8, comment: Option<&str>) -> Result<Swap> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let swap = require_swap(&tx, swap_id)?;
            if swap.status != SwapStatus::Completed {
                return Err(Rejected::new("Swap not completed", "Only completed swaps can be rated").into());
            }

            let rated: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM swap_ratings WHERE swap_id = ?1 AND rater_id = ?2)",
                params![swap_id.to_string(), rater_id.to_string()],
                |r| r.get(0),
            )?;
            if rated {
                return Err(Rejected::new("Already rated", "You have already rated this swap").into());
            }

            tx.execute(
                "INSERT INTO swap_ratings (swap_id, rater_id, rating, comment, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![swap_id.to_string(), rater_id.to_string(), rating, comment, now()],
            )?;

            let swap = query_swap_detail(&tx, swap_id)?.ok_or_else(|| anyhow!("swap {} vanished", swap_id))?;
            tx.commit()?;
            Ok(swap)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use rewear_types::models::{Badge, NotificationKind, Role, User};

    struct Fixture {
        db: Database,
        ada: User,
        grace: User,
        jacket: Uuid,
        scarf: Uuid,
    }

    /// Ada owns a 5 point jacket, Grace a 5 point scarf; both are live.
    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let ada = testutil::user(&db, "Ada");
        let grace = testutil::user(&db, "Grace");
        let admin = testutil::user_with_role(&db, "Root", Role::Admin);
        let jacket = testutil::live_item(&db, ada.id, admin.id, "jacket", 5);
        let scarf = testutil::live_item(&db, grace.id, admin.id, "scarf", 5);
        Fixture {
            db,
            ada,
            grace,
            jacket,
            scarf,
        }
    }

    fn direct(f: &Fixture) -> Swap {
        // Grace asks for Ada's jacket, offering her scarf
        let (swap, notification) = f
            .db
            .create_swap(
                &NewSwap {
                    initiator_id: f.grace.id,
                    recipient_id: f.ada.id,
                    requested_item_id: f.jacket,
                    offered_item_id: Some(f.scarf),
                    points_offered: None,
                    swap_type: SwapType::DirectSwap,
                    message: Some("Trade?".into()),
                },
                true,
            )
            .unwrap();
        assert_eq!(notification.unwrap().kind, NotificationKind::SwapRequest);
        swap
    }

    fn redemption(f: &Fixture, points: i64) -> Swap {
        f.db.create_swap(
            &NewSwap {
                initiator_id: f.grace.id,
                recipient_id: f.ada.id,
                requested_item_id: f.jacket,
                offered_item_id: None,
                points_offered: Some(points),
                swap_type: SwapType::PointsRedemption,
                message: None,
            },
            false,
        )
        .unwrap()
        .0
    }

    fn item_status(f: &Fixture, id: Uuid) -> ItemStatus {
        f.db.get_item(id).unwrap().unwrap().status
    }

    #[test]
    fn request_is_pending_with_summaries() {
        let f = fixture();
        let swap = direct(&f);

        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(swap.initiator.name, "Grace");
        assert_eq!(swap.requested_item.title, "jacket");
        assert_eq!(swap.requested_item.owner_id, f.ada.id);
        assert_eq!(swap.offered_item.as_ref().unwrap().title, "scarf");
        assert!(swap.requested_item.primary_image.is_some());
    }

    #[test]
    fn deleting_an_item_closes_its_pending_swaps() {
        let f = fixture();
        let swap = direct(&f);

        // Grace pulls the scarf she offered; Ada hears about it
        let notifications = f.db.delete_item(f.scarf).unwrap().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, f.ada.id);
        assert_eq!(notifications[0].kind, NotificationKind::SwapRejected);
        assert!(notifications[0].message.contains("scarf"));

        assert!(f.db.get_swap(swap.id).unwrap().is_none());
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Available);
    }

    #[test]
    fn one_pending_request_per_item() {
        let f = fixture();
        direct(&f);
        let err = f
            .db
            .create_swap(
                &NewSwap {
                    initiator_id: f.grace.id,
                    recipient_id: f.ada.id,
                    requested_item_id: f.jacket,
                    offered_item_id: None,
                    points_offered: Some(5),
                    swap_type: SwapType::PointsRedemption,
                    message: None,
                },
                true,
            )
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Duplicate request");
    }

    #[test]
    fn accepting_a_direct_swap_moves_everything_once() {
        let f = fixture();
        let swap = direct(&f);

        let outcome = f.db.accept_swap(swap.id, Some("Deal")).unwrap();
        assert_eq!(outcome.swap.status, SwapStatus::Accepted);
        assert_eq!(outcome.swap.response_message.as_deref(), Some("Deal"));
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Swapped);
        assert_eq!(item_status(&f, f.scarf), ItemStatus::Swapped);

        let kinds: Vec<_> = outcome.notifications.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::SwapAccepted,
                NotificationKind::BadgeEarned,
                NotificationKind::BadgeEarned
            ]
        );

        for user in [&f.ada, &f.grace] {
            let user = f.db.get_user(user.id).unwrap().unwrap();
            assert_eq!(user.stats.total_swaps, 1);
            assert_eq!(user.stats.eco_impact, ECO_IMPACT_PER_PARTICIPANT);
            assert_eq!(user.stats.items_received, 1);
            assert_eq!(user.badges, vec![Badge::FirstSwap]);
            assert_eq!(user.points, 10);
        }

        let err = f.db.accept_swap(swap.id, None).unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Invalid swap state");
        assert_eq!(f.db.get_user(f.ada.id).unwrap().unwrap().stats.total_swaps, 1);
    }

    #[test]
    fn accepting_a_redemption_transfers_points() {
        let f = fixture();
        let swap = redemption(&f, 8);

        let outcome = f.db.accept_swap(swap.id, None).unwrap();
        assert_eq!(outcome.notifications[0].kind, NotificationKind::PointsEarned);
        assert_eq!(outcome.notifications[0].user_id, f.ada.id);
        assert_eq!(outcome.notifications[0].data.points, Some(8));

        let ada = f.db.get_user(f.ada.id).unwrap().unwrap();
        let grace = f.db.get_user(f.grace.id).unwrap().unwrap();
        assert_eq!(ada.points, 18);
        assert_eq!(grace.points, 2);
        assert_eq!(grace.stats.items_received, 1);
        assert_eq!(ada.stats.items_received, 0);
        assert_eq!(item_status(&f, f.scarf), ItemStatus::Available);
    }

    #[test]
    fn acceptance_rolls_back_when_points_ran_out() {
        let f = fixture();
        let swap = redemption(&f, 8);
        f.db.with_conn(|conn| {
            conn.execute("UPDATE users SET points = 3 WHERE id = ?1", [f.grace.id.to_string()])?;
            Ok(())
        })
        .unwrap();

        let err = f.db.accept_swap(swap.id, None).unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Insufficient points");

        assert_eq!(f.db.get_swap(swap.id).unwrap().unwrap().status, SwapStatus::Pending);
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Available);
        assert_eq!(f.db.get_user(f.ada.id).unwrap().unwrap().points, 10);
    }

    #[test]
    fn acceptance_fails_when_item_already_gone() {
        let f = fixture();
        let swap = direct(&f);
        f.db.with_conn(|conn| {
            conn.execute("UPDATE items SET status = 'Swapped' WHERE id = ?1", [f.scarf.to_string()])?;
            Ok(())
        })
        .unwrap();

        let err = f.db.accept_swap(swap.id, None).unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Item not available");
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Available);
    }

    #[test]
    fn rejection_is_only_for_pending() {
        let f = fixture();
        let swap = direct(&f);

        let outcome = f.db.reject_swap(swap.id, Some("No thanks")).unwrap();
        assert_eq!(outcome.swap.status, SwapStatus::Rejected);
        assert_eq!(outcome.notifications[0].user_id, f.grace.id);
        assert_eq!(outcome.notifications[0].kind, NotificationKind::SwapRejected);

        assert!(f.db.reject_swap(swap.id, None).is_err());
        assert!(f.db.accept_swap(swap.id, None).is_err());
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Available);
    }

    #[test]
    fn completion_and_rating() {
        let f = fixture();
        let swap = direct(&f);

        assert!(f.db.complete_swap(swap.id, f.grace.id).is_err());
        assert!(f.db.rate_swap(swap.id, f.grace.id, 5, None).is_err());

        f.db.accept_swap(swap.id, None).unwrap();
        let outcome = f.db.complete_swap(swap.id, f.grace.id).unwrap();
        assert_eq!(outcome.swap.status, SwapStatus::Completed);
        assert_eq!(outcome.swap.eco_impact, ECO_IMPACT_PER_SWAP);
        assert!(outcome.swap.completed_at.is_some());
        assert_eq!(outcome.notifications[0].user_id, f.ada.id);

        let rated = f.db.rate_swap(swap.id, f.grace.id, 5, Some("Lovely")).unwrap();
        assert_eq!(rated.ratings.initiator.as_ref().unwrap().rating, 5);
        assert!(rated.ratings.recipient.is_none());

        let err = f.db.rate_swap(swap.id, f.grace.id, 4, None).unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Already rated");
        assert!(f.db.cancel_swap(swap.id, f.ada.id, None).is_err());
    }

    #[test]
    fn cancellation_keeps_listings_as_they_are() {
        let f = fixture();
        let swap = direct(&f);
        f.db.accept_swap(swap.id, None).unwrap();

        let outcome = f.db.cancel_swap(swap.id, f.ada.id, Some("Changed my mind")).unwrap();
        assert_eq!(outcome.swap.status, SwapStatus::Cancelled);
        assert_eq!(outcome.swap.cancelled_by, Some(f.ada.id));
        assert_eq!(outcome.swap.cancellation_reason.as_deref(), Some("Changed my mind"));
        assert_eq!(item_status(&f, f.jacket), ItemStatus::Swapped);

        assert!(f.db.cancel_swap(swap.id, f.ada.id, None).is_err());
    }

    #[test]
    fn chat_until_closed() {
        let f = fixture();
        let swap = direct(&f);

        let (message, notification) = f.db.add_chat_message(swap.id, f.grace.id, "Hello!").unwrap();
        assert_eq!(message.sender_id, f.grace.id);
        assert!(!message.is_read);
        assert_eq!(notification.user_id, f.ada.id);
        assert_eq!(notification.kind, NotificationKind::NewMessage);

        f.db.add_chat_message(swap.id, f.ada.id, "Hi").unwrap();
        assert_eq!(f.db.mark_messages_read(swap.id, f.ada.id).unwrap(), 1);

        let detail = f.db.get_swap_detail(swap.id).unwrap().unwrap();
        assert_eq!(detail.chat_messages.len(), 2);
        assert_eq!(detail.chat_messages[0].message, "Hello!");
        assert!(detail.chat_messages[0].is_read);
        assert!(!detail.chat_messages[1].is_read);

        f.db.cancel_swap(swap.id, f.grace.id, None).unwrap();
        let err = f.db.add_chat_message(swap.id, f.grace.id, "Still there?").unwrap_err();
        assert_eq!(err.downcast_ref::<Rejected>().unwrap().error, "Swap closed");
    }

    #[test]
    fn listings_by_participant_and_status() {
        let f = fixture();
        let first = direct(&f);
        f.db.reject_swap(first.id, None).unwrap();
        redemption(&f, 5);

        let (mine, total) = f.db.list_user_swaps(f.ada.id, None, 0, 10).unwrap();
        assert_eq!(total, 2);
        assert_eq!(mine[0].swap_type, SwapType::PointsRedemption);

        let (rejected, total) = f.db.list_user_swaps(f.grace.id, Some(SwapStatus::Rejected), 0, 10).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rejected[0].id, first.id);

        assert_eq!(f.db.pending_swaps(f.ada.id).unwrap().len(), 1);
        assert!(f.db.pending_swaps(f.grace.id).unwrap().is_empty());
        assert_eq!(f.db.list_all_swaps(None, 0, 10).unwrap().1, 2);
        assert_eq!(f.db.list_all_swaps(Some(SwapStatus::Pending), 0, 10).unwrap().1, 1);
    }
}
