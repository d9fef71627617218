//! Room Registry storage operations
//!
//! Owns the (listing, supplier, buyer) -> room mapping. Creation is an
//! atomic insert-if-absent against the tuple's unique index; `was_created`
//! comes from the insert's affected-row count, never from a prior read.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{map_room, OptionalExt};
use crate::error::{Error, Result};
use crate::invariants::{assert_room_invariants, assert_room_key_invariants};
use crate::models::{ListingType, Room, RoomKey, RoomStatus};

const ROOM_COLUMNS: &str =
    "id, listing_id, listing_type, supplier_id, buyer_id, status, created_at, last_activity_at";

pub struct RoomStore<'a> {
    conn: &'a Connection,
}

impl<'a> RoomStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get the room for `key`, creating it if absent.
    ///
    /// Returns the room and whether this call created it. Concurrent calls
    /// with the same key resolve to the same room and exactly one observes
    /// `true`: the conflict target is the unique tuple index, so losers
    /// insert zero rows and read back the winner.
    #[instrument(skip(self, key), fields(listing_id = %key.listing_id))]
    pub fn get_or_create(&self, key: &RoomKey) -> Result<(Room, bool)> {
        assert_room_key_invariants(key);

        let candidate = Room::new(*key);
        let inserted = self.conn.execute(
            "INSERT INTO rooms (id, listing_id, listing_type, supplier_id, buyer_id, status, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(listing_id, listing_type, supplier_id, buyer_id) DO NOTHING",
            params![
                candidate.id.to_string(),
                candidate.listing_id.to_string(),
                candidate.listing_type.as_u8(),
                candidate.supplier_id.to_string(),
                candidate.buyer_id.to_string(),
                candidate.status.as_u8(),
                candidate.created_at.to_rfc3339(),
                candidate.last_activity_at.to_rfc3339(),
            ],
        )?;

        if inserted == 1 {
            return Ok((candidate, true));
        }

        let room = self.find_by_key(key)?.ok_or_else(|| {
            // Insert conflicted yet the row is gone. Registry bug or an
            // out-of-band delete raced us.
            Error::Conflict(format!("room for listing {} vanished", key.listing_id))
        })?;
        assert_room_invariants(&room);
        Ok((room, false))
    }

    /// Find room by ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Room>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1"))?;
        let room = stmt
            .query_row(params![id.to_string()], map_room)
            .optional()?;
        Ok(room)
    }

    /// Find room by its identifying tuple
    pub fn find_by_key(&self, key: &RoomKey) -> Result<Option<Room>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms
             WHERE listing_id = ?1 AND listing_type = ?2 AND supplier_id = ?3 AND buyer_id = ?4"
        ))?;
        let room = stmt
            .query_row(
                params![
                    key.listing_id.to_string(),
                    key.listing_type.as_u8(),
                    key.supplier_id.to_string(),
                    key.buyer_id.to_string(),
                ],
                map_room,
            )
            .optional()?;
        Ok(room)
    }

    /// List rooms where the participant is either party, newest activity first
    #[instrument(skip(self))]
    pub fn list_for_participant(&self, participant_id: Uuid) -> Result<Vec<Room>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms
             WHERE supplier_id = ?1 OR buyer_id = ?1
             ORDER BY last_activity_at DESC"
        ))?;
        let rooms = stmt
            .query_map(params![participant_id.to_string()], map_room)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    /// Transition a room's status. `Archived` is terminal.
    #[instrument(skip(self))]
    pub fn set_status(&self, room_id: Uuid, status: RoomStatus) -> Result<()> {
        let room = self
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;

        if room.status == RoomStatus::Archived && status != RoomStatus::Archived {
            return Err(Error::InvalidArgument(format!(
                "room {room_id} is archived and cannot transition to {status:?}"
            )));
        }

        self.conn.execute(
            "UPDATE rooms SET status = ?1 WHERE id = ?2",
            params![status.as_u8(), room_id.to_string()],
        )?;
        Ok(())
    }

    /// Archive every room attached to a listing (listing deleted).
    /// Returns the number of rooms archived.
    #[instrument(skip(self))]
    pub fn archive_for_listing(&self, listing_id: Uuid, listing_type: ListingType) -> Result<u64> {
        let changed = self.conn.execute(
            "UPDATE rooms SET status = ?1 WHERE listing_id = ?2 AND listing_type = ?3",
            params![
                RoomStatus::Archived.as_u8(),
                listing_id.to_string(),
                listing_type.as_u8(),
            ],
        )?;
        Ok(changed as u64)
    }

    /// Bump last_activity_at. Called by the message log inside its append
    /// transaction; exposed for callers that record non-message activity.
    pub fn touch(&self, room_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE rooms SET last_activity_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), room_id.to_string()],
        )?;
        Ok(())
    }
}
