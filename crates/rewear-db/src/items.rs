use anyhow::{Result, anyhow};
use rewear_types::api::{LikeResponse, UpdateItemRequest};
use rewear_types::models::{
    EnumText, ITEM_ECO_IMPACT, Item, ItemStatus, Notification, UserSummary, normalize_primary_image,
};
use rewear_types::notifications::NewNotification;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use crate::models::{get_enum, get_json, get_opt_time, get_opt_uuid, get_time, get_uuid};
use crate::notifications::insert_notification;
use crate::users::award_badges;
use crate::{Database, ItemFilter, NewItem, Rejected, like_pattern, now};

const ITEM_SELECT: &str = "SELECT i.id, i.title, i.description, i.images, i.category, i.size, \
     i.condition, i.brand, i.color, i.material, i.tags, i.owner_id, u.name, u.avatar, \
     i.points_required, i.status, i.is_approved, i.approved_by, i.approved_at, i.views, \
     (SELECT COUNT(*) FROM item_likes l WHERE l.item_id = i.id) AS likes, \
     i.swap_preference, i.eco_impact, i.created_at, i.updated_at \
     FROM items i JOIN users u ON u.id = i.owner_id";

fn map_item(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: get_uuid(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        images: get_json(row, 3)?,
        category: get_enum(row, 4)?,
        size: get_enum(row, 5)?,
        condition: get_enum(row, 6)?,
        brand: row.get(7)?,
        color: row.get(8)?,
        material: row.get(9)?,
        tags: get_json(row, 10)?,
        owner: UserSummary {
            id: get_uuid(row, 11)?,
            name: row.get(12)?,
            avatar: row.get(13)?,
        },
        points_required: row.get(14)?,
        status: get_enum(row, 15)?,
        is_approved: row.get(16)?,
        approved_by: get_opt_uuid(row, 17)?,
        approved_at: get_opt_time(row, 18)?,
        views: row.get(19)?,
        likes: row.get(20)?,
        swap_preference: get_enum(row, 21)?,
        eco_impact: row.get(22)?,
        created_at: get_time(row, 23)?,
        updated_at: get_time(row, 24)?,
    })
}

pub(crate) fn query_item(conn: &Connection, id: Uuid) -> Result<Option<Item>> {
    let sql = format!("{} WHERE i.id = ?1", ITEM_SELECT);
    let item = conn.query_row(&sql, [id.to_string()], map_item).optional()?;
    Ok(item)
}

/// Builds the `WHERE` clause for `filter` along with its positional values.
fn filter_clause(filter: &ItemFilter) -> (String, Vec<Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(owner_id) = filter.owner_id {
        clauses.push("i.owner_id = ?".into());
        values.push(Value::Text(owner_id.to_string()));
    }
    if let Some(status) = filter.status {
        clauses.push("i.status = ?".into());
        values.push(Value::Text(status.as_str().into()));
    }
    if let Some(approved) = filter.approved {
        clauses.push("i.is_approved = ?".into());
        values.push(Value::Integer(approved as i64));
    }
    if let Some(category) = filter.category {
        clauses.push("i.category = ?".into());
        values.push(Value::Text(category.as_str().into()));
    }
    if let Some(size) = filter.size {
        clauses.push("i.size = ?".into());
        values.push(Value::Text(size.as_str().into()));
    }
    if let Some(condition) = filter.condition {
        clauses.push("i.condition = ?".into());
        values.push(Value::Text(condition.as_str().into()));
    }
    if let Some(min) = filter.min_points {
        clauses.push("i.points_required >= ?".into());
        values.push(Value::Integer(min));
    }
    if let Some(max) = filter.max_points {
        clauses.push("i.points_required <= ?".into());
        values.push(Value::Integer(max));
    }
    if let Some(search) = filter.search.as_deref() {
        clauses.push(
            "(i.title LIKE ? ESCAPE '\\' OR i.description LIKE ? ESCAPE '\\' \
             OR IFNULL(i.brand, '') LIKE ? ESCAPE '\\')"
                .into(),
        );
        let pattern = like_pattern(search);
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }
    if !filter.tags.is_empty() {
        let placeholders = vec!["?"; filter.tags.len()].join(", ");
        clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(i.tags) WHERE json_each.value IN ({}))",
            placeholders
        ));
        values.extend(filter.tags.iter().map(|t| Value::Text(t.clone())));
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

impl Database {
    /// Stores a new listing as Pending and unapproved, and credits the owner's
    /// listing count. Returns any badge notifications that earned.
    pub fn create_item(&self, new: &NewItem) -> Result<(Item, Vec<Notification>)> {
        let mut images = new.images.clone();
        normalize_primary_image(&mut images);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let id = Uuid::new_v4();
            let ts = now();

            tx.execute(
                "INSERT INTO items (id, owner_id, title, description, category, size, condition, \
                 brand, color, material, tags, images, points_required, status, is_approved, \
                 swap_preference, eco_impact, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15, ?16, ?17, ?17)",
                params![
                    id.to_string(),
                    new.owner_id.to_string(),
                    new.title,
                    new.description,
                    new.category.as_str(),
                    new.size.as_str(),
                    new.condition.as_str(),
                    new.brand,
                    new.color,
                    new.material,
                    serde_json::to_string(&new.tags)?,
                    serde_json::to_string(&images)?,
                    new.points_required,
                    ItemStatus::Pending.as_str(),
                    new.swap_preference.as_str(),
                    ITEM_ECO_IMPACT,
                    ts,
                ],
            )?;

            tx.execute(
                "UPDATE users SET items_listed = items_listed + 1, updated_at = ?2 WHERE id = ?1",
                params![new.owner_id.to_string(), ts],
            )?;
            let notifications = award_badges(&tx, new.owner_id)?;

            let item = query_item(&tx, id)?.ok_or_else(|| anyhow!("item {} missing after insert", id))?;
            tx.commit()?;
            Ok((item, notifications))
        })
    }

    pub fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        self.with_conn(|conn| query_item(conn, id))
    }

    /// Fetches an item for display, counting the view.
    pub fn view_item(&self, id: Uuid) -> Result<Option<Item>> {
        self.with_conn(|conn| {
            conn.execute("UPDATE items SET views = views + 1 WHERE id = ?1", [id.to_string()])?;
            query_item(conn, id)
        })
    }

    /// Applies a partial edit. Editing an approved item sends it back to moderation.
    pub fn update_item(&self, id: Uuid, changes: UpdateItemRequest) -> Result<Option<Item>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_item(&tx, id)? else {
                return Ok(None);
            };
            if current.status == ItemStatus::Swapped {
                return Err(Rejected::new("Item not editable", "Swapped items cannot be edited").into());
            }

            let mut images = changes.images.unwrap_or(current.images);
            normalize_primary_image(&mut images);

            let (status, approved_by, approved_at) = if current.is_approved {
                (ItemStatus::Pending, None, None)
            } else {
                (
                    current.status,
                    current.approved_by,
                    current.approved_at.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
                )
            };

            tx.execute(
                "UPDATE items SET title = ?2, description = ?3, category = ?4, size = ?5, condition = ?6, \
                 brand = ?7, color = ?8, material = ?9, tags = ?10, images = ?11, points_required = ?12, \
                 swap_preference = ?13, status = ?14, is_approved = 0, approved_by = ?15, approved_at = ?16, \
                 updated_at = ?17 WHERE id = ?1",
                params![
                    id.to_string(),
                    changes.title.unwrap_or(current.title),
                    changes.description.unwrap_or(current.description),
                    changes.category.unwrap_or(current.category).as_str(),
                    changes.size.unwrap_or(current.size).as_str(),
                    changes.condition.unwrap_or(current.condition).as_str(),
                    changes.brand.or(current.brand),
                    changes.color.or(current.color),
                    changes.material.or(current.material),
                    serde_json::to_string(&changes.tags.unwrap_or(current.tags))?,
                    serde_json::to_string(&images)?,
                    changes.points_required.unwrap_or(current.points_required),
                    changes.swap_preference.unwrap_or(current.swap_preference).as_str(),
                    status.as_str(),
                    approved_by.map(|id| id.to_string()),
                    approved_at,
                    now(),
                ],
            )?;

            let item = query_item(&tx, id)?;
            tx.commit()?;
            Ok(item)
        })
    }

    /// Deletes a listing that has not been swapped and decrements the owner's
    /// listing count. Pending swaps that requested or offered the item are
    /// removed with it; the other participant of each gets a notification,
    /// which is returned. `None` when the item does not exist.
    pub fn delete_item(&self, id: Uuid) -> Result<Option<Vec<Notification>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(item) = query_item(&tx, id)? else {
                return Ok(None);
            };
            if item.status == ItemStatus::Swapped {
                return Err(Rejected::new("Item not deletable", "Swapped items cannot be deleted").into());
            }

            let counterparts: Vec<Uuid> = {
                let mut stmt = tx.prepare(
                    "SELECT initiator_id, recipient_id FROM swaps \
                     WHERE status = 'Pending' AND (requested_item_id = ?1 OR offered_item_id = ?1)",
                )?;
                let rows = stmt
                    .query_map([id.to_string()], |row| Ok((get_uuid(row, 0)?, get_uuid(row, 1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter()
                    .map(|(initiator, recipient)| {
                        if initiator == item.owner.id { recipient } else { initiator }
                    })
                    .collect()
            };

            tx.execute("DELETE FROM items WHERE id = ?1", [id.to_string()])?;
            tx.execute(
                "UPDATE users SET items_listed = MAX(items_listed - 1, 0), updated_at = ?2 WHERE id = ?1",
                params![item.owner.id.to_string(), now()],
            )?;
            let notifications = counterparts
                .into_iter()
                .map(|user_id| {
                    insert_notification(&tx, &NewNotification::swap_withdrawn(user_id, &item.title))
                })
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            Ok(Some(notifications))
        })
    }

    /// Likes the item, or removes the like if the user already gave one.
    pub fn toggle_like(&self, item_id: Uuid, user_id: Uuid) -> Result<Option<LikeResponse>> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
                [item_id.to_string()],
                |r| r.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let removed = conn.execute(
                "DELETE FROM item_likes WHERE item_id = ?1 AND user_id = ?2",
                params![item_id.to_string(), user_id.to_string()],
            )?;
            if removed == 0 {
                conn.execute(
                    "INSERT INTO item_likes (item_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![item_id.to_string(), user_id.to_string(), now()],
                )?;
            }

            let likes: i64 = conn.query_row(
                "SELECT COUNT(*) FROM item_likes WHERE item_id = ?1",
                [item_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(Some(LikeResponse {
                liked: removed == 0,
                likes,
            }))
        })
    }

    /// Newest first, with the total number of matches.
    pub fn list_items(&self, filter: &ItemFilter, offset: u32, limit: u32) -> Result<(Vec<Item>, i64)> {
        let (where_sql, mut values) = filter_clause(filter);

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM items i{}", where_sql),
                params_from_iter(values.iter()),
                |r| r.get(0),
            )?;

            values.push(Value::Integer(limit as i64));
            values.push(Value::Integer(offset as i64));
            let sql = format!(
                "{}{} ORDER BY i.created_at DESC, i.rowid DESC LIMIT ? OFFSET ?",
                ITEM_SELECT, where_sql
            );
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map(params_from_iter(values.iter()), map_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((items, total))
        })
    }

    /// Browsable items ranked by views, then likes, then recency.
    pub fn featured_items(&self, limit: u32) -> Result<Vec<Item>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE i.status = 'Available' AND i.is_approved = 1 \
                 ORDER BY i.views DESC, likes DESC, i.created_at DESC LIMIT ?1",
                ITEM_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let items = stmt
                .query_map([limit], map_item)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    /// Publishes a pending listing and notifies its owner.
    pub fn approve_item(&self, id: Uuid, admin_id: Uuid) -> Result<Option<(Item, Notification)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(item) = query_item(&tx, id)? else {
                return Ok(None);
            };
            if item.is_approved {
                return Err(Rejected::new("Item already approved", "This item has already been approved").into());
            }

            let ts = now();
            tx.execute(
                "UPDATE items SET status = ?2, is_approved = 1, approved_by = ?3, approved_at = ?4, \
                 updated_at = ?4 WHERE id = ?1",
                params![id.to_string(), ItemStatus::Available.as_str(), admin_id.to_string(), ts],
            )?;
            let notification = insert_notification(
                &tx,
                &NewNotification::item_approved(item.owner.id, id, &item.title),
            )?;

            let item = query_item(&tx, id)?.ok_or_else(|| anyhow!("item {} vanished", id))?;
            tx.commit()?;
            Ok(Some((item, notification)))
        })
    }

    /// Takes an unapproved listing off the platform and tells the owner why.
    pub fn reject_item(&self, id: Uuid, reason: &str) -> Result<Option<(Item, Notification)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(item) = query_item(&tx, id)? else {
                return Ok(None);
            };
            if item.is_approved {
                return Err(Rejected::new("Item already approved", "Approved items cannot be rejected").into());
            }

            tx.execute(
                "UPDATE items SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), ItemStatus::Removed.as_str(), now()],
            )?;
            let notification = insert_notification(
                &tx,
                &NewNotification::item_rejected(item.owner.id, id, &item.title, reason),
            )?;

            let item = query_item(&tx, id)?.ok_or_else(|| anyhow!("item {} vanished", id))?;
            tx.commit()?;
            Ok(Some((item, notification)))
        })
    }
}
