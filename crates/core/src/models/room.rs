//! Conversation room model - one persistent two-party chat per listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the marketplace a listing sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListingType {
    Supply,
    Demand,
}

impl ListingType {
    pub fn as_u8(self) -> u8 {
        match self {
            ListingType::Supply => 1,
            ListingType::Demand => 2,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => ListingType::Demand,
            _ => ListingType::Supply,
        }
    }
}

/// A listing as seen by the chat core: just enough to validate a contact
/// attempt. The listing subsystem itself is an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRef {
    pub id: Uuid,
    pub listing_type: ListingType,
    pub supplier_id: Uuid,
}

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Active,
    Closed,
    /// Terminal. Set when a listing is deleted or by administrative action.
    Archived,
}

impl RoomStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            RoomStatus::Active => 1,
            RoomStatus::Closed => 2,
            RoomStatus::Archived => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => RoomStatus::Closed,
            3 => RoomStatus::Archived,
            _ => RoomStatus::Active,
        }
    }
}

/// The identifying tuple of a room. At most one room exists per key,
/// enforced by a unique index in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    pub listing_id: Uuid,
    pub listing_type: ListingType,
    pub supplier_id: Uuid,
    pub buyer_id: Uuid,
}

/// A buyer–supplier conversation scoped to one listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub listing_type: ListingType,
    pub supplier_id: Uuid,
    pub buyer_id: Uuid,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Room {
    pub fn new(key: RoomKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            listing_id: key.listing_id,
            listing_type: key.listing_type,
            supplier_id: key.supplier_id,
            buyer_id: key.buyer_id,
            status: RoomStatus::Active,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn key(&self) -> RoomKey {
        RoomKey {
            listing_id: self.listing_id,
            listing_type: self.listing_type,
            supplier_id: self.supplier_id,
            buyer_id: self.buyer_id,
        }
    }

    /// Whether the given participant belongs to this room
    pub fn has_participant(&self, participant_id: Uuid) -> bool {
        participant_id == self.supplier_id || participant_id == self.buyer_id
    }

    /// The other party relative to `participant_id`
    pub fn counterpart(&self, participant_id: Uuid) -> Option<Uuid> {
        if participant_id == self.supplier_id {
            Some(self.buyer_id)
        } else if participant_id == self.buyer_id {
            Some(self.supplier_id)
        } else {
            None
        }
    }
}

/// Room with the viewer's unread count, for inbox listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: Room,
    pub unread: u64,
}
