//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, Utc};
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{ListingType, MessageKind, Room, RoomStatus, SenderRole};

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a full room row in column order:
/// id, listing_id, listing_type, supplier_id, buyer_id, status,
/// created_at, last_activity_at
pub fn map_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        listing_id: parse_uuid(&row.get::<_, String>(1)?)?,
        listing_type: ListingType::from_u8(row.get(2)?),
        supplier_id: parse_uuid(&row.get::<_, String>(3)?)?,
        buyer_id: parse_uuid(&row.get::<_, String>(4)?)?,
        status: RoomStatus::from_u8(row.get(5)?),
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        last_activity_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

/// Map a full message row in column order:
/// room_id, seq, id, sender_id, sender_role, body, kind, created_at
pub fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<crate::models::Message> {
    Ok(crate::models::Message {
        room_id: parse_uuid(&row.get::<_, String>(0)?)?,
        seq: row.get::<_, i64>(1)? as u64,
        id: parse_uuid(&row.get::<_, String>(2)?)?,
        sender_id: parse_uuid(&row.get::<_, String>(3)?)?,
        sender_role: SenderRole::from_u8(row.get(4)?),
        body: row.get(5)?,
        kind: MessageKind::from_u8(row.get(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
    })
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for Result<T, SqlError> {
    fn optional(self) -> Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
