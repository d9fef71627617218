//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Message, Room, RoomKey};

/// Validate that a room key is well-formed
pub fn assert_room_key_invariants(key: &RoomKey) {
    debug_assert!(
        key.listing_id != Uuid::nil(),
        "Room key has nil listing_id"
    );
    debug_assert!(
        key.supplier_id != Uuid::nil(),
        "Room key has nil supplier_id"
    );
    debug_assert!(key.buyer_id != Uuid::nil(), "Room key has nil buyer_id");

    // Rooms are strictly two-party
    debug_assert!(
        key.supplier_id != key.buyer_id,
        "Room key has supplier == buyer ({})",
        key.supplier_id
    );
}

/// Validate that a room's state is internally consistent
pub fn assert_room_invariants(room: &Room) {
    assert_room_key_invariants(&room.key());

    debug_assert!(
        room.last_activity_at >= room.created_at,
        "Room {} has last_activity_at before created_at",
        room.id
    );
}

/// Validate that a fetched message page is ascending and gapless
pub fn assert_page_invariants(room_id: Uuid, after_seq: u64, page: &[Message]) {
    let mut expected = after_seq + 1;
    for message in page {
        debug_assert!(
            message.room_id == room_id,
            "Page for room {} contains message {} from room {}",
            room_id,
            message.id,
            message.room_id
        );
        debug_assert!(
            message.seq == expected,
            "Page for room {} has seq {} where {} was expected",
            room_id,
            message.seq,
            expected
        );
        expected = message.seq + 1;
    }
}
