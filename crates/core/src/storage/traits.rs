//! Storage repository traits
//!
//! These traits define the storage interface, allowing for different
//! implementations (SQLite, mock, future server-side backend).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ListingType, Message, MessageKind, ReadWatermark, Room, RoomKey, RoomStatus, SenderRole,
};

/// Room Registry operations
pub trait RoomRepository {
    /// Atomic get-or-create for the identifying tuple.
    /// The bool is true iff this call created the room.
    fn get_or_create_room(&self, key: &RoomKey) -> Result<(Room, bool)>;

    /// Find room by ID
    fn find_room_by_id(&self, id: Uuid) -> Result<Option<Room>>;

    /// List rooms for a participant, newest activity first
    fn list_rooms_for_participant(&self, participant_id: Uuid) -> Result<Vec<Room>>;

    /// Transition room status (Archived is terminal)
    fn set_room_status(&self, room_id: Uuid, status: RoomStatus) -> Result<()>;

    /// Archive all rooms for a listing; returns how many were touched
    fn archive_rooms_for_listing(
        &self,
        listing_id: Uuid,
        listing_type: ListingType,
    ) -> Result<u64>;

    /// Bump a room's last-activity timestamp
    fn touch_room(&self, room_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Message Log operations
pub trait MessageRepository {
    /// Append with a caller-supplied idempotency id; returns the stored
    /// message (existing one on duplicate id)
    #[allow(clippy::too_many_arguments)]
    fn append_message(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_role: SenderRole,
        body: &str,
        kind: MessageKind,
    ) -> Result<Message>;

    /// Page messages with seq > after_seq, ascending
    fn read_messages_after(&self, room_id: Uuid, after_seq: u64, limit: u32)
        -> Result<Vec<Message>>;

    /// Highest seq in the room, 0 if empty
    fn latest_seq(&self, room_id: Uuid) -> Result<u64>;
}

/// Read Tracker operations
pub trait WatermarkRepository {
    /// Monotone advance; MAX merge
    fn mark_read(&self, room_id: Uuid, participant_id: Uuid, upto_seq: u64) -> Result<()>;

    /// Current watermark (implicit 0 when absent)
    fn watermark(&self, room_id: Uuid, participant_id: Uuid) -> Result<ReadWatermark>;

    /// Messages past the watermark not sent by the participant
    fn unread_count(&self, room_id: Uuid, participant_id: Uuid) -> Result<u64>;
}
