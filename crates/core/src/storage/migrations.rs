//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Conversation rooms, one per (listing, supplier, buyer) tuple.
            -- The unique index is what makes get-or-create race-free.
            CREATE TABLE IF NOT EXISTS rooms (
                id TEXT PRIMARY KEY,
                listing_id TEXT NOT NULL,
                listing_type INTEGER NOT NULL,
                supplier_id TEXT NOT NULL,
                buyer_id TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                last_activity_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_tuple
                ON rooms(listing_id, listing_type, supplier_id, buyer_id);

            -- Append-only message log. seq is gapless per room.
            CREATE TABLE IF NOT EXISTS messages (
                room_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                sender_role INTEGER NOT NULL,
                body TEXT NOT NULL,
                kind INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (room_id, seq),
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
            );

            -- Client-supplied message ids are unique per room (idempotent sends)
            CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_room_id
                ON messages(room_id, id);

            -- Per-participant read watermarks
            CREATE TABLE IF NOT EXISTS watermarks (
                room_id TEXT NOT NULL,
                participant_id TEXT NOT NULL,
                last_read_seq INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (room_id, participant_id),
                FOREIGN KEY (room_id) REFERENCES rooms(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            -- Inbox queries scan by participant, newest activity first
            CREATE INDEX IF NOT EXISTS idx_rooms_supplier ON rooms(supplier_id, last_activity_at);
            CREATE INDEX IF NOT EXISTS idx_rooms_buyer ON rooms(buyer_id, last_activity_at);

            -- Listing-deletion archival scans by listing
            CREATE INDEX IF NOT EXISTS idx_rooms_listing ON rooms(listing_id, listing_type);

            -- Unread counting filters by sender within a room
            CREATE INDEX IF NOT EXISTS idx_messages_room_sender ON messages(room_id, sender_id);
        "#,
    },
];

/// Run all pending migrations
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current: u32 = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })?
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        info!(
            version = migration.version,
            description = migration.description,
            "Applied migration"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as u32 + 1);
        }
    }

    #[test]
    fn test_run_migrations_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }
}
