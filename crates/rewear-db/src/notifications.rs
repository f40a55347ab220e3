use anyhow::{Result, anyhow};
use rewear_types::models::{EnumText, Notification, NotificationData, NotificationKind};
use rewear_types::notifications::NewNotification;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::models::{get_enum, get_opt_enum, get_opt_uuid, get_time, get_uuid};
use crate::{Database, now};

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, message, swap_id, item_id, sender_id, \
     points, badge, url, is_read, priority, created_at";

fn map_notification(row: &Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        kind: get_enum(row, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        data: NotificationData {
            swap_id: get_opt_uuid(row, 5)?,
            item_id: get_opt_uuid(row, 6)?,
            sender_id: get_opt_uuid(row, 7)?,
            points: row.get(8)?,
            badge: get_opt_enum(row, 9)?,
            url: row.get(10)?,
        },
        is_read: row.get(11)?,
        priority: get_enum(row, 12)?,
        created_at: get_time(row, 13)?,
    })
}

/// Stores a notification on `conn`, which may be an open transaction.
pub(crate) fn insert_notification(conn: &Connection, new: &NewNotification) -> Result<Notification> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO notifications (id, user_id, kind, title, message, swap_id, item_id, sender_id, \
         points, badge, url, priority, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id.to_string(),
            new.user_id.to_string(),
            new.kind.as_str(),
            new.title,
            new.message,
            new.data.swap_id.map(|id| id.to_string()),
            new.data.item_id.map(|id| id.to_string()),
            new.data.sender_id.map(|id| id.to_string()),
            new.data.points,
            new.data.badge.map(|b| b.as_str()),
            new.data.url,
            new.priority().as_str(),
            now(),
        ],
    )?;
    query_notification(conn, id)?.ok_or_else(|| anyhow!("notification {} missing after insert", id))
}

fn query_notification(conn: &Connection, id: Uuid) -> Result<Option<Notification>> {
    let sql = format!("SELECT {} FROM notifications WHERE id = ?1", NOTIFICATION_COLUMNS);
    let found = conn.query_row(&sql, [id.to_string()], map_notification).optional()?;
    Ok(found)
}

impl Database {
    pub fn create_notification(&self, new: &NewNotification) -> Result<Notification> {
        self.with_conn(|conn| insert_notification(conn, new))
    }

    pub fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| query_notification(conn, id))
    }

    /// A user's notifications, newest first, with the total matching count.
    pub fn list_notifications(
        &self,
        user_id: Uuid,
        kind: Option<NotificationKind>,
        unread_only: bool,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Notification>, i64)> {
        self.with_conn(|conn| {
            let filter = "user_id = ?1 AND (?2 IS NULL OR kind = ?2) AND (?3 = 0 OR is_read = 0)";
            let kind = kind.map(|k| k.as_str());

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM notifications WHERE {}", filter),
                params![user_id.to_string(), kind, unread_only],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {} FROM notifications WHERE {} \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?4 OFFSET ?5",
                NOTIFICATION_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let notifications = stmt
                .query_map(
                    params![user_id.to_string(), kind, unread_only, limit, offset],
                    map_notification,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((notifications, total))
        })
    }

    pub fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    pub fn mark_notification_read(&self, id: Uuid) -> Result<Option<Notification>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            query_notification(conn, id)
        })
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_notification(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notifications WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    pub fn clear_notifications(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM notifications WHERE user_id = ?1",
                [user_id.to_string()],
            )?;
            Ok(changed)
        })
    }
}
