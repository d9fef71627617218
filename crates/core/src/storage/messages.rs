//! Message Log storage operations
//!
//! Append-only, per-room, gapless sequence. Sequence allocation and the
//! insert happen in one immediate transaction, which also stamps the room's
//! last_activity_at.

use chrono::Utc;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{map_message, OptionalExt};
use crate::error::{Error, Result};
use crate::models::{Message, MessageKind, SenderRole, MAX_BODY_LEN};

/// Upper bound on a single read_after page
pub const MAX_PAGE: u32 = 500;

const MESSAGE_COLUMNS: &str = "room_id, seq, id, sender_id, sender_role, body, kind, created_at";

pub struct MessageStore<'a> {
    conn: &'a Connection,
}

impl<'a> MessageStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a message to a room's log.
    ///
    /// `message_id` is the caller's idempotency key: appending an id already
    /// present in the room returns the stored message unchanged instead of
    /// inserting a second row.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub fn append(
        &self,
        room_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        sender_role: SenderRole,
        body: &str,
        kind: MessageKind,
    ) -> Result<Message> {
        let body = body.trim();
        if body.is_empty() && kind != MessageKind::System {
            return Err(Error::InvalidArgument("empty message body".to_string()));
        }
        if body.len() > MAX_BODY_LEN {
            return Err(Error::InvalidArgument(format!(
                "message body exceeds {MAX_BODY_LEN} bytes"
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let room_exists: bool = tx
            .query_row(
                "SELECT 1 FROM rooms WHERE id = ?1",
                params![room_id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !room_exists {
            return Err(Error::NotFound(format!("room {room_id}")));
        }

        if let Some(existing) = Self::find_in_tx(&tx, room_id, message_id)? {
            tx.commit()?;
            return Ok(existing);
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE room_id = ?1",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;

        let message = Message {
            id: message_id,
            room_id,
            seq: seq as u64,
            sender_id,
            sender_role,
            body: body.to_string(),
            kind,
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO messages (room_id, seq, id, sender_id, sender_role, body, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.room_id.to_string(),
                seq,
                message.id.to_string(),
                message.sender_id.to_string(),
                message.sender_role.as_u8(),
                message.body,
                message.kind.as_u8(),
                message.created_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE rooms SET last_activity_at = ?1 WHERE id = ?2",
            params![message.created_at.to_rfc3339(), room_id.to_string()],
        )?;

        tx.commit()?;
        Ok(message)
    }

    fn find_in_tx(
        tx: &Transaction<'_>,
        room_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<Message>> {
        let mut stmt = tx.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ?1 AND id = ?2"
        ))?;
        let message = stmt
            .query_row(
                params![room_id.to_string(), message_id.to_string()],
                map_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Find a message by its client-supplied id
    pub fn find_by_id(&self, room_id: Uuid, message_id: Uuid) -> Result<Option<Message>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE room_id = ?1 AND id = ?2"
        ))?;
        let message = stmt
            .query_row(
                params![room_id.to_string(), message_id.to_string()],
                map_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Page messages with seq > after_seq, ascending. Repeated calls with
    /// the same after_seq return identical results until something appends.
    #[instrument(skip(self))]
    pub fn read_after(&self, room_id: Uuid, after_seq: u64, limit: u32) -> Result<Vec<Message>> {
        let limit = limit.min(MAX_PAGE);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE room_id = ?1 AND seq > ?2
             ORDER BY seq ASC
             LIMIT ?3"
        ))?;
        let messages = stmt
            .query_map(
                params![room_id.to_string(), after_seq as i64, limit],
                map_message,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Highest sequence number in the room, 0 if empty
    pub fn latest_seq(&self, room_id: Uuid) -> Result<u64> {
        let seq: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM messages WHERE room_id = ?1",
            params![room_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }

    /// Count messages with seq > after_seq not sent by `exclude_sender`.
    /// Backs the unread computation.
    pub fn count_after(&self, room_id: Uuid, after_seq: u64, exclude_sender: Uuid) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE room_id = ?1 AND seq > ?2 AND sender_id != ?3",
            params![
                room_id.to_string(),
                after_seq as i64,
                exclude_sender.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingType, RoomKey};
    use crate::storage::Database;

    fn create_test_room(db: &Database) -> Uuid {
        let key = RoomKey {
            listing_id: Uuid::new_v4(),
            listing_type: ListingType::Supply,
            supplier_id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
        };
        db.rooms().get_or_create(&key).unwrap().0.id
    }

    #[test]
    fn test_append_allocates_gapless_seq() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);
        let sender = Uuid::new_v4();

        for expected in 1..=5 {
            let message = db
                .messages()
                .append(
                    room_id,
                    Uuid::new_v4(),
                    sender,
                    SenderRole::Buyer,
                    &format!("message {expected}"),
                    MessageKind::Text,
                )
                .unwrap();
            assert_eq!(message.seq, expected);
        }
    }

    #[test]
    fn test_append_rejects_empty_body() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);

        let err = db
            .messages()
            .append(
                room_id,
                Uuid::new_v4(),
                Uuid::new_v4(),
                SenderRole::Buyer,
                "   ",
                MessageKind::Text,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_system_kind_may_be_empty() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);

        let message = db
            .messages()
            .append(
                room_id,
                Uuid::new_v4(),
                Uuid::nil(),
                SenderRole::System,
                "",
                MessageKind::System,
            )
            .unwrap();
        assert_eq!(message.seq, 1);
    }

    #[test]
    fn test_append_unknown_room() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .messages()
            .append(
                Uuid::new_v4(),
                Uuid::new_v4(),
                Uuid::new_v4(),
                SenderRole::Buyer,
                "hello",
                MessageKind::Text,
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_append_is_idempotent_by_id() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);
        let message_id = Uuid::new_v4();
        let sender = Uuid::new_v4();

        let first = db
            .messages()
            .append(
                room_id,
                message_id,
                sender,
                SenderRole::Buyer,
                "hello",
                MessageKind::Text,
            )
            .unwrap();
        let second = db
            .messages()
            .append(
                room_id,
                message_id,
                sender,
                SenderRole::Buyer,
                "hello",
                MessageKind::Text,
            )
            .unwrap();

        assert_eq!(first.seq, second.seq);
        assert_eq!(db.messages().latest_seq(room_id).unwrap(), 1);
    }

    #[test]
    fn test_read_after_pages_in_order() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);
        let sender = Uuid::new_v4();

        for i in 1..=10 {
            db.messages()
                .append(
                    room_id,
                    Uuid::new_v4(),
                    sender,
                    SenderRole::Supplier,
                    &format!("m{i}"),
                    MessageKind::Text,
                )
                .unwrap();
        }

        let page = db.messages().read_after(room_id, 3, 4).unwrap();
        let seqs: Vec<u64> = page.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![4, 5, 6, 7]);

        // Idempotent while nothing appends
        let again = db.messages().read_after(room_id, 3, 4).unwrap();
        assert_eq!(
            again.iter().map(|m| m.id).collect::<Vec<_>>(),
            page.iter().map(|m| m.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_append_touches_room_activity() {
        let db = Database::open_in_memory().unwrap();
        let room_id = create_test_room(&db);
        let before = db.rooms().find_by_id(room_id).unwrap().unwrap();

        db.messages()
            .append(
                room_id,
                Uuid::new_v4(),
                Uuid::new_v4(),
                SenderRole::Buyer,
                "ping",
                MessageKind::Text,
            )
            .unwrap();

        let after = db.rooms().find_by_id(room_id).unwrap().unwrap();
        assert!(after.last_activity_at >= before.last_activity_at);
    }

    #[test]
    fn test_rooms_sequence_independently() {
        let db = Database::open_in_memory().unwrap();
        let room_a = create_test_room(&db);
        let room_b = create_test_room(&db);
        let sender = Uuid::new_v4();

        db.messages()
            .append(
                room_a,
                Uuid::new_v4(),
                sender,
                SenderRole::Buyer,
                "a1",
                MessageKind::Text,
            )
            .unwrap();
        let b1 = db
            .messages()
            .append(
                room_b,
                Uuid::new_v4(),
                sender,
                SenderRole::Buyer,
                "b1",
                MessageKind::Text,
            )
            .unwrap();

        assert_eq!(b1.seq, 1);
    }

    #[test]
    fn test_concurrent_appends_stay_gapless() {
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appends.db");
        let db = Database::open(&path).unwrap();
        let room_id = create_test_room(&db);
        let room_id = Arc::new(room_id);

        let mut handles = Vec::new();
        for t in 0..4 {
            let path = path.clone();
            let room_id = Arc::clone(&room_id);
            handles.push(std::thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                let sender = Uuid::new_v4();
                for i in 0..5 {
                    loop {
                        match db.messages().append(
                            *room_id,
                            Uuid::new_v4(),
                            sender,
                            SenderRole::Buyer,
                            &format!("t{t} m{i}"),
                            MessageKind::Text,
                        ) {
                            Ok(_) => break,
                            Err(Error::Unavailable(_)) => std::thread::yield_now(),
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let messages = db.messages().read_after(*room_id, 0, 100).unwrap();
        let seqs: Vec<u64> = messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<u64>>());
    }
}
