//! SQLite storage layer for Tradeyard

mod messages;
mod migrations;
mod parse;
mod rooms;
mod traits;
mod watermarks;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ListingType, Message, MessageKind, ReadWatermark, Room, RoomKey, RoomStatus, SenderRole,
};

pub use messages::{MessageStore, MAX_PAGE};
pub use rooms::RoomStore;
pub use traits::{MessageRepository, RoomRepository, WatermarkRepository};
pub use watermarks::WatermarkStore;

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    /// Get room registry store
    pub fn rooms(&self) -> RoomStore<'_> {
        RoomStore::new(&self.conn)
    }

    /// Get message log store
    pub fn messages(&self) -> MessageStore<'_> {
        MessageStore::new(&self.conn)
    }

    /// Get read watermark store
    pub fn watermarks(&self) -> WatermarkStore<'_> {
        WatermarkStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl RoomRepository for Database {
    fn get_or_create_room(&self, key: &RoomKey) -> Result<(Room, bool)> {
        self.rooms().get_or_create(key)
    }

    fn find_room_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        self.rooms().find_by_id(id)
    }

    fn list_rooms_for_participant(&self, participant_id: Uuid) -> Result<Vec<Room>> {
        self.rooms().list_for_participant(participant_id)
    }

    fn set_room_status(&self, room_id: Uuid, status: RoomStatus) -> Result<()> {
        self.rooms().set_status(room_id, status)
    }

    fn archive_rooms_for_listing(
        &self,
        listing_id: Uuid,
        listing_type: ListingType,
    ) -> Result<u64> {
        self.rooms().archive_for_listing(listing_id, listing_type)
    }

    fn touch_room(&self, room_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.rooms().touch(room_id, at)
    }
}

impl MessageRepository for Database {
    fn append_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_role: SenderRole,
        body: &str,
        kind: MessageKind,
    ) -> Result<Message> {
        self.messages()
            .append(room_id, message_id, sender_id, sender_role, body, kind)
    }

    fn read_messages_after(
        &self,
        room_id: Uuid,
        after_seq: u64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.messages().read_after(room_id, after_seq, limit)
    }

    fn latest_seq(&self, room_id: Uuid) -> Result<u64> {
        self.messages().latest_seq(room_id)
    }
}

impl WatermarkRepository for Database {
    fn mark_read(&self, room_id: Uuid, participant_id: Uuid, upto_seq: u64) -> Result<()> {
        self.watermarks().mark_read(room_id, participant_id, upto_seq)
    }

    fn watermark(&self, room_id: Uuid, participant_id: Uuid) -> Result<ReadWatermark> {
        self.watermarks().watermark(room_id, participant_id)
    }

    fn unread_count(&self, room_id: Uuid, participant_id: Uuid) -> Result<u64> {
        self.watermarks().unread_count(room_id, participant_id)
    }
}
