use anyhow::{Result, anyhow};
use rewear_types::api::AdminUserSummary;
use rewear_types::models::{
    Badge, EnumText, LeaderboardEntry, Location, Notification, Preferences, Role, STARTING_POINTS, User,
    UserStats,
};
use rewear_types::notifications::NewNotification;
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::models::{get_enum, get_json, get_time, get_uuid};
use crate::notifications::insert_notification;
use crate::{Database, NewUser, ProfileChanges, Rejected, like_pattern, now};

pub(crate) const USER_COLUMNS: &str = "id, name, email, avatar, points, role, is_verified, badges, \
     total_swaps, items_listed, items_received, eco_impact, preferences, city, country, \
     last_active, created_at, updated_at";

pub(crate) fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
        points: row.get(4)?,
        role: get_enum(row, 5)?,
        is_verified: row.get(6)?,
        badges: get_json(row, 7)?,
        stats: UserStats {
            total_swaps: row.get(8)?,
            items_listed: row.get(9)?,
            items_received: row.get(10)?,
            eco_impact: row.get(11)?,
        },
        preferences: get_json(row, 12)?,
        location: Location {
            city: row.get(13)?,
            country: row.get(14)?,
        },
        last_active: get_time(row, 15)?,
        created_at: get_time(row, 16)?,
        updated_at: get_time(row, 17)?,
    })
}

impl Database {
    /// Inserts the account with the starting balance and stores its welcome
    /// notification. Emails are expected to be normalized by the caller.
    pub fn create_user(&self, new: &NewUser) -> Result<(User, Notification)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [&new.email],
                |r| r.get(0),
            )?;
            if taken {
                return Err(Rejected::new(
                    "User already exists",
                    "An account with this email already exists",
                )
                .into());
            }

            let id = Uuid::new_v4();
            let ts = now();
            tx.execute(
                "INSERT INTO users (id, name, email, password_hash, avatar, points, role, preferences, \
                 last_active, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?9)",
                params![
                    id.to_string(),
                    new.name,
                    new.email,
                    new.password_hash,
                    new.avatar,
                    STARTING_POINTS,
                    new.role.as_str(),
                    serde_json::to_string(&Preferences::default())?,
                    ts,
                ],
            )?;

            let welcome = insert_notification(&tx, &NewNotification::welcome(id, STARTING_POINTS))?;
            let user = query_user(&tx, id)?.ok_or_else(|| anyhow!("user {} missing after insert", id))?;
            tx.commit()?;
            Ok((user, welcome))
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// The user and their stored password hash, for login.
    pub fn get_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {}, password_hash FROM users WHERE email = ?1", USER_COLUMNS);
            let found = conn
                .query_row(&sql, [email], |row| Ok((map_user(row)?, row.get(18)?)))
                .optional()?;
            Ok(found)
        })
    }

    pub fn touch_last_active(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_active = ?2 WHERE id = ?1",
                params![id.to_string(), now()],
            )?;
            Ok(())
        })
    }

    /// Applies the fields present in `changes`; a location replaces both city and country.
    pub fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<Option<User>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = query_user(&tx, id)? else {
                return Ok(None);
            };

            let name = changes.name.unwrap_or(current.name);
            let avatar = changes.avatar.or(current.avatar);
            let preferences = changes.preferences.unwrap_or(current.preferences);
            let location = changes.location.unwrap_or(current.location);

            tx.execute(
                "UPDATE users SET name = ?2, avatar = ?3, preferences = ?4, city = ?5, country = ?6, \
                 updated_at = ?7 WHERE id = ?1",
                params![
                    id.to_string(),
                    name,
                    avatar,
                    serde_json::to_string(&preferences)?,
                    location.city,
                    location.country,
                    now(),
                ],
            )?;

            let user = query_user(&tx, id)?;
            tx.commit()?;
            Ok(user)
        })
    }

    /// Credits `amount` points and returns the new balance, or `None` for an unknown user.
    pub fn add_points(&self, id: Uuid, amount: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET points = points + ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), amount, now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let balance = conn.query_row(
                "SELECT points FROM users WHERE id = ?1",
                [id.to_string()],
                |r| r.get(0),
            )?;
            Ok(Some(balance))
        })
    }

    pub fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), role.as_str(), now()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, id)
        })
    }

    /// Removes the account. Their items, swaps, likes and notifications go with it.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(changed > 0)
        })
    }

    /// Newest first, optionally narrowed by a name or email substring.
    pub fn list_users(&self, search: Option<&str>, offset: u32, limit: u32) -> Result<(Vec<User>, i64)> {
        self.with_conn(|conn| {
            let pattern = search.map(like_pattern);
            let filter = "(?1 IS NULL OR name LIKE ?1 ESCAPE '\\' OR email LIKE ?1 ESCAPE '\\')";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users WHERE {}", filter),
                [&pattern],
                |r| r.get(0),
            )?;

            let sql = format!(
                "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                USER_COLUMNS, filter
            );
            let mut stmt = conn.prepare(&sql)?;
            let users = stmt
                .query_map(params![pattern, limit, offset], map_user)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((users, total))
        })
    }

    pub fn recent_users(&self, limit: u32) -> Result<Vec<AdminUserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, role, created_at FROM users \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            )?;
            let users = stmt
                .query_map([limit], |row| {
                    Ok(AdminUserSummary {
                        id: get_uuid(row, 0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        role: get_enum(row, 3)?,
                        created_at: get_time(row, 4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Highest eco impact first; ties go to the member with more swaps.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, avatar, eco_impact, total_swaps, badges FROM users \
                 ORDER BY eco_impact DESC, total_swaps DESC, created_at ASC LIMIT ?1",
            )?;
            let entries = stmt
                .query_map([limit], |row| {
                    Ok(LeaderboardEntry {
                        id: get_uuid(row, 0)?,
                        name: row.get(1)?,
                        avatar: row.get(2)?,
                        eco_impact: row.get(3)?,
                        total_swaps: row.get(4)?,
                        badges: get_json(row, 5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let user = conn.query_row(&sql, [id.to_string()], map_user).optional()?;
    Ok(user)
}

/// Grants every badge the user's current stats qualify for and has not yet
/// received, storing a notification for each.
pub(crate) fn award_badges(conn: &Connection, user_id: Uuid) -> Result<Vec<Notification>> {
    let Some(user) = query_user(conn, user_id)? else {
        return Ok(vec![]);
    };

    let fresh: Vec<Badge> = Badge::earned(&user.stats)
        .into_iter()
        .filter(|badge| !user.badges.contains(badge))
        .collect();
    if fresh.is_empty() {
        return Ok(vec![]);
    }

    let mut badges = user.badges;
    badges.extend(fresh.iter().copied());
    conn.execute(
        "UPDATE users SET badges = ?2, updated_at = ?3 WHERE id = ?1",
        params![user_id.to_string(), serde_json::to_string(&badges)?, now()],
    )?;

    fresh
        .into_iter()
        .map(|badge| insert_notification(conn, &NewNotification::badge_earned(user_id, badge)))
        .collect()
}
