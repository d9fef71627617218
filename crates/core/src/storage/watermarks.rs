//! Read Tracker storage operations
//!
//! Watermarks are monotone: the upsert merges with MAX(), so mark-read
//! calls arriving out of order are safe and commutative.

use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::ReadWatermark;

pub struct WatermarkStore<'a> {
    conn: &'a Connection,
}

impl<'a> WatermarkStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Advance a participant's watermark to at least `upto_seq`.
    /// Never decreases the stored value; idempotent.
    #[instrument(skip(self))]
    pub fn mark_read(&self, room_id: Uuid, participant_id: Uuid, upto_seq: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO watermarks (room_id, participant_id, last_read_seq)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(room_id, participant_id)
             DO UPDATE SET last_read_seq = MAX(last_read_seq, excluded.last_read_seq)",
            params![
                room_id.to_string(),
                participant_id.to_string(),
                upto_seq as i64,
            ],
        )?;
        Ok(())
    }

    /// Current watermark, 0 when the participant has never marked read
    pub fn watermark(&self, room_id: Uuid, participant_id: Uuid) -> Result<ReadWatermark> {
        let mut stmt = self.conn.prepare(
            "SELECT room_id, participant_id, last_read_seq FROM watermarks
             WHERE room_id = ?1 AND participant_id = ?2",
        )?;
        let stored = stmt
            .query_row(
                params![room_id.to_string(), participant_id.to_string()],
                |row| {
                    Ok(ReadWatermark {
                        room_id: parse_uuid(&row.get::<_, String>(0)?)?,
                        participant_id: parse_uuid(&row.get::<_, String>(1)?)?,
                        last_read_seq: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(stored.unwrap_or_else(|| ReadWatermark::initial(room_id, participant_id)))
    }

    /// Count of messages past the watermark not authored by the participant
    #[instrument(skip(self))]
    pub fn unread_count(&self, room_id: Uuid, participant_id: Uuid) -> Result<u64> {
        let watermark = self.watermark(room_id, participant_id)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE room_id = ?1 AND seq > ?2 AND sender_id != ?3",
            params![
                room_id.to_string(),
                watermark.last_read_seq as i64,
                participant_id.to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingType, MessageKind, RoomKey, SenderRole};
    use crate::storage::Database;

    fn create_test_room(db: &Database) -> (Uuid, Uuid, Uuid) {
        let key = RoomKey {
            listing_id: Uuid::new_v4(),
            listing_type: ListingType::Supply,
            supplier_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
        };
        let (room, _) = db.rooms().get_or_create(&key).unwrap();
        (room.id, key.supplier_id, key.buyer_id)
    }

    fn send(db: &Database, room_id: Uuid, sender: Uuid, body: &str) {
        db.messages()
            .append(
                room_id,
                Uuid::new_v4(),
                sender,
                SenderRole::Supplier,
                body,
                MessageKind::Text,
            )
            .unwrap();
    }

    #[test]
    fn test_watermark_starts_at_zero() {
        let db = Database::open_in_memory().unwrap();
        let (room_id, _, buyer) = create_test_room(&db);

        let wm = db.watermarks().watermark(room_id, buyer).unwrap();
        assert_eq!(wm.last_read_seq, 0);
    }

    #[test]
    fn test_mark_read_is_monotonic() {
        let db = Database::open_in_memory().unwrap();
        let (room_id, _, buyer) = create_test_room(&db);

        db.watermarks().mark_read(room_id, buyer, 7).unwrap();
        db.watermarks().mark_read(room_id, buyer, 3).unwrap();
        db.watermarks().mark_read(room_id, buyer, 7).unwrap();

        let wm = db.watermarks().watermark(room_id, buyer).unwrap();
        assert_eq!(wm.last_read_seq, 7);
    }

    #[test]
    fn test_unread_excludes_own_messages() {
        let db = Database::open_in_memory().unwrap();
        let (room_id, supplier, buyer) = create_test_room(&db);

        send(&db, room_id, supplier, "from supplier");
        send(&db, room_id, supplier, "another");
        send(&db, room_id, buyer, "from buyer");

        assert_eq!(db.watermarks().unread_count(room_id, buyer).unwrap(), 2);
        assert_eq!(db.watermarks().unread_count(room_id, supplier).unwrap(), 1);
    }

    #[test]
    fn test_unread_drops_after_mark_read() {
        let db = Database::open_in_memory().unwrap();
        let (room_id, supplier, buyer) = create_test_room(&db);

        for i in 0..4 {
            send(&db, room_id, supplier, &format!("m{i}"));
        }

        db.watermarks().mark_read(room_id, buyer, 2).unwrap();
        assert_eq!(db.watermarks().unread_count(room_id, buyer).unwrap(), 2);

        db.watermarks().mark_read(room_id, buyer, 4).unwrap();
        assert_eq!(db.watermarks().unread_count(room_id, buyer).unwrap(), 0);
    }

    #[test]
    fn test_watermarks_are_per_participant() {
        let db = Database::open_in_memory().unwrap();
        let (room_id, supplier, buyer) = create_test_room(&db);

        send(&db, room_id, supplier, "hello");
        db.watermarks().mark_read(room_id, buyer, 1).unwrap();

        assert_eq!(
            db.watermarks().watermark(room_id, buyer).unwrap().last_read_seq,
            1
        );
        assert_eq!(
            db.watermarks()
                .watermark(room_id, supplier)
                .unwrap()
                .last_read_seq,
            0
        );
    }
}
