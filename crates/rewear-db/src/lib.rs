pub mod items;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod stats;
pub mod swaps;
pub mod users;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use models::{ItemFilter, NewItem, NewSwap, NewUser, ProfileChanges, SwapOutcome};

/// A business rule that failed inside a store operation, e.g. an item that
/// was swapped between the caller's check and the write. Carried through
/// `anyhow::Error` and surfaced to clients as a 400.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}: {message}")]
pub struct Rejected {
    pub error: &'static str,
    pub message: String,
}

impl Rejected {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
        }
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Fresh private database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Mutable access for operations that open a transaction.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

/// Current time in the format every timestamp column uses.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Substring pattern for `LIKE ... ESCAPE '\'`, with wildcards in `term` taken literally.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
pub(crate) mod testutil {
    use rewear_types::models::{
        Category, Condition, ItemImage, Role, Size, SwapPreference, User,
    };
    use uuid::Uuid;

    use crate::{Database, NewItem, NewUser};

    pub fn user(db: &Database, name: &str) -> User {
        user_with_role(db, name, Role::User)
    }

    pub fn user_with_role(db: &Database, name: &str, role: Role) -> User {
        let (user, _) = db
            .create_user(&NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password_hash: "hash".to_string(),
                avatar: None,
                role,
            })
            .unwrap();
        user
    }

    pub fn new_item(owner_id: Uuid, title: &str, points: i64) -> NewItem {
        NewItem {
            owner_id,
            title: title.to_string(),
            description: "A well loved garment in fine shape".to_string(),
            category: Category::Tops,
            size: Size::M,
            condition: Condition::Good,
            brand: Some("Acme".to_string()),
            color: None,
            material: None,
            tags: vec!["cotton".to_string()],
            points_required: points,
            swap_preference: SwapPreference::Both,
            images: vec![ItemImage {
                url: format!("https://img.example.com/{}.jpg", title),
                public_id: format!("rewear/items/{}", title),
                is_primary: false,
            }],
        }
    }

    /// An approved, available listing.
    pub fn live_item(db: &Database, owner_id: Uuid, admin_id: Uuid, title: &str, points: i64) -> Uuid {
        let (item, _) = db.create_item(&new_item(owner_id, title, points)).unwrap();
        db.approve_item(item.id, admin_id).unwrap().unwrap();
        item.id
    }
}
