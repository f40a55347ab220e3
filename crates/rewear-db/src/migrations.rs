use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                avatar          TEXT,
                points          INTEGER NOT NULL DEFAULT 10 CHECK (points >= 0),
                role            TEXT NOT NULL DEFAULT 'user',
                is_verified     INTEGER NOT NULL DEFAULT 0,
                badges          TEXT NOT NULL DEFAULT '[]',
                total_swaps     INTEGER NOT NULL DEFAULT 0,
                items_listed    INTEGER NOT NULL DEFAULT 0,
                items_received  INTEGER NOT NULL DEFAULT 0,
                eco_impact      REAL NOT NULL DEFAULT 0,
                preferences     TEXT NOT NULL DEFAULT '{}',
                city            TEXT,
                country         TEXT,
                last_active     TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_users_leaderboard ON users(eco_impact DESC, total_swaps DESC);
            CREATE INDEX idx_users_created ON users(created_at);

            CREATE TABLE items (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                category        TEXT NOT NULL,
                size            TEXT NOT NULL,
                condition       TEXT NOT NULL,
                brand           TEXT,
                color           TEXT,
                material        TEXT,
                tags            TEXT NOT NULL DEFAULT '[]',
                images          TEXT NOT NULL,
                points_required INTEGER NOT NULL CHECK (points_required BETWEEN 1 AND 100),
                status          TEXT NOT NULL DEFAULT 'Pending',
                is_approved     INTEGER NOT NULL DEFAULT 0,
                approved_by     TEXT REFERENCES users(id) ON DELETE SET NULL,
                approved_at     TEXT,
                views           INTEGER NOT NULL DEFAULT 0,
                swap_preference TEXT NOT NULL DEFAULT 'Both',
                eco_impact      REAL NOT NULL DEFAULT 2.5,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_items_owner ON items(owner_id);
            CREATE INDEX idx_items_browse ON items(status, is_approved, created_at);
            CREATE INDEX idx_items_category ON items(category, status);

            CREATE TABLE item_likes (
                item_id     TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (item_id, user_id)
            );

            CREATE TABLE swaps (
                id                  TEXT PRIMARY KEY,
                initiator_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                recipient_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                requested_item_id   TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                offered_item_id     TEXT REFERENCES items(id) ON DELETE CASCADE,
                points_offered      INTEGER CHECK (points_offered IS NULL OR points_offered >= 0),
                swap_type           TEXT NOT NULL,
                status              TEXT NOT NULL DEFAULT 'Pending',
                message             TEXT,
                response_message    TEXT,
                completed_at        TEXT,
                cancelled_at        TEXT,
                cancelled_by        TEXT REFERENCES users(id) ON DELETE SET NULL,
                cancellation_reason TEXT,
                eco_impact          REAL NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                CHECK (initiator_id != recipient_id)
            );

            CREATE INDEX idx_swaps_initiator ON swaps(initiator_id, status);
            CREATE INDEX idx_swaps_recipient ON swaps(recipient_id, status);
            CREATE INDEX idx_swaps_requested ON swaps(requested_item_id);

            CREATE TABLE swap_messages (
                id          TEXT PRIMARY KEY,
                swap_id     TEXT NOT NULL REFERENCES swaps(id) ON DELETE CASCADE,
                sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message     TEXT NOT NULL,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_swap_messages_swap ON swap_messages(swap_id, created_at);

            CREATE TABLE swap_ratings (
                swap_id     TEXT NOT NULL REFERENCES swaps(id) ON DELETE CASCADE,
                rater_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment     TEXT,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (swap_id, rater_id)
            );

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind        TEXT NOT NULL,
                title       TEXT NOT NULL,
                message     TEXT NOT NULL,
                swap_id     TEXT REFERENCES swaps(id) ON DELETE SET NULL,
                item_id     TEXT REFERENCES items(id) ON DELETE SET NULL,
                sender_id   TEXT REFERENCES users(id) ON DELETE SET NULL,
                points      INTEGER,
                badge       TEXT,
                url         TEXT,
                is_read     INTEGER NOT NULL DEFAULT 0,
                priority    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, is_read);
            CREATE INDEX idx_notifications_user_created ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
