//! Chat Service - the caller-facing orchestrator
//!
//! Validates at the boundary, then drives Room Registry, Message Log, Read
//! Tracker, and the Subscription Bus. Participant identity is always passed
//! in explicitly; there is no ambient "current user".

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use tradeyard_core::{
    invariants::assert_page_invariants, Database, Error, ListingDirectory, ListingType, Message,
    MessageKind, Result, Room, RoomStatus, RoomSummary, SenderRole,
};

use crate::bus::SubscriptionBus;

/// Orchestrates the chat core behind the surface of spec-level operations
pub struct ChatService {
    db: Arc<Mutex<Database>>,
    bus: SubscriptionBus,
    listings: Arc<dyn ListingDirectory>,
}

impl ChatService {
    pub fn new(db: Database, listings: Arc<dyn ListingDirectory>) -> Self {
        Self::with_shared(Arc::new(Mutex::new(db)), listings)
    }

    /// Build over a database handle shared with other subsystems
    pub fn with_shared(db: Arc<Mutex<Database>>, listings: Arc<dyn ListingDirectory>) -> Self {
        Self {
            db,
            bus: SubscriptionBus::new(),
            listings,
        }
    }

    /// Storage is on disk, so a panic elsewhere cannot leave the database
    /// half-mutated in memory; recover the guard instead of propagating
    /// the poison.
    fn db_guard(&self) -> std::sync::MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Contact a listing: get-or-create the room for (listing, supplier,
    /// buyer) and, only when this call created it, append one system
    /// greeting carrying `greeting`.
    ///
    /// Idempotent per tuple: concurrent or retried calls converge on the
    /// same room with exactly one greeting. The guard is the registry's
    /// atomic insert, never a "does the room have messages yet" read; the
    /// greeting id is additionally derived from the room id so a retry of a
    /// half-finished creation cannot double it.
    #[instrument(skip(self, greeting))]
    pub fn contact(
        &self,
        listing_id: Uuid,
        listing_type: ListingType,
        supplier_id: Uuid,
        buyer_id: Uuid,
        greeting: &str,
    ) -> Result<Room> {
        require_id("listing_id", listing_id)?;
        require_id("supplier_id", supplier_id)?;
        require_id("buyer_id", buyer_id)?;
        if supplier_id == buyer_id {
            return Err(Error::InvalidArgument(
                "supplier and buyer must be distinct".to_string(),
            ));
        }

        let listing = self
            .listings
            .resolve(listing_id, listing_type)?
            .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
        if listing.supplier_id != supplier_id {
            return Err(Error::InvalidArgument(format!(
                "listing {listing_id} does not belong to supplier {supplier_id}"
            )));
        }

        let db = self.db_guard();
        let (room, created) = db.rooms().get_or_create(&tradeyard_core::RoomKey {
            listing_id,
            listing_type,
            supplier_id,
            buyer_id,
        })?;

        if created {
            info!(room_id = %room.id, %listing_id, "Room created on first contact");
            let greeting_id = Uuid::new_v5(&room.id, b"room-greeting");
            let message = db.messages().append(
                room.id,
                greeting_id,
                Uuid::nil(),
                SenderRole::System,
                greeting,
                MessageKind::System,
            )?;
            self.bus.publish(&message);
        }

        Ok(room)
    }

    /// Send a message into a room. The sender must be a participant and the
    /// room must be active.
    pub fn send(&self, room_id: Uuid, sender_id: Uuid, body: &str) -> Result<Message> {
        self.send_with_id(room_id, sender_id, body, Uuid::new_v4())
    }

    /// Like `send`, with a client-generated message id as idempotency key:
    /// retrying a failed send with the same id cannot duplicate the message.
    #[instrument(skip(self, body))]
    pub fn send_with_id(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        body: &str,
        message_id: Uuid,
    ) -> Result<Message> {
        require_id("sender_id", sender_id)?;

        let db = self.db_guard();
        let room = db
            .rooms()
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;

        if !room.has_participant(sender_id) {
            return Err(Error::PermissionDenied(format!(
                "{sender_id} is not a participant of room {room_id}"
            )));
        }
        if room.status != RoomStatus::Active {
            return Err(Error::PermissionDenied(format!(
                "room {room_id} is {:?}",
                room.status
            )));
        }

        let role = if sender_id == room.supplier_id {
            SenderRole::Supplier
        } else {
            SenderRole::Buyer
        };

        let message =
            db.messages()
                .append(room_id, message_id, sender_id, role, body, MessageKind::Text)?;

        // Published under the db lock so per-subscriber delivery follows
        // seq order even with racing senders.
        self.bus.publish(&message);
        Ok(message)
    }

    /// Page a room's history: messages with seq > after_seq, ascending
    #[instrument(skip(self))]
    pub fn fetch_messages(
        &self,
        room_id: Uuid,
        after_seq: u64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        let db = self.db_guard();
        db.rooms()
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;

        let page = db.messages().read_after(room_id, after_seq, limit)?;
        assert_page_invariants(room_id, after_seq, &page);
        Ok(page)
    }

    /// Advance the participant's watermark to the room's latest sequence
    #[instrument(skip(self))]
    pub fn mark_read(&self, room_id: Uuid, participant_id: Uuid) -> Result<()> {
        let db = self.db_guard();
        let room = db
            .rooms()
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;
        if !room.has_participant(participant_id) {
            return Err(Error::PermissionDenied(format!(
                "{participant_id} is not a participant of room {room_id}"
            )));
        }

        let latest = db.messages().latest_seq(room_id)?;
        db.watermarks().mark_read(room_id, participant_id, latest)
    }

    /// Messages the participant has not read and did not send
    pub fn unread_count(&self, room_id: Uuid, participant_id: Uuid) -> Result<u64> {
        let db = self.db_guard();
        let room = db
            .rooms()
            .find_by_id(room_id)?
            .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;
        if !room.has_participant(participant_id) {
            return Err(Error::PermissionDenied(format!(
                "{participant_id} is not a participant of room {room_id}"
            )));
        }

        db.watermarks().unread_count(room_id, participant_id)
    }

    /// Open a live message stream for a room. Push is best-effort: after a
    /// disconnect, reconcile with `fetch_messages` from the last seen seq.
    pub fn subscribe(&self, room_id: Uuid, subscriber_id: Uuid) -> Result<mpsc::Receiver<Message>> {
        {
            let db = self.db_guard();
            db.rooms()
                .find_by_id(room_id)?
                .ok_or_else(|| Error::NotFound(format!("room {room_id}")))?;
        }
        Ok(self.bus.subscribe(room_id, subscriber_id))
    }

    /// Detach a live stream. Idempotent; safe from disconnect callbacks.
    pub fn unsubscribe(&self, room_id: Uuid, subscriber_id: Uuid) {
        self.bus.unsubscribe(room_id, subscriber_id);
    }

    /// The participant's rooms with unread counts, newest activity first
    #[instrument(skip(self))]
    pub fn inbox(&self, participant_id: Uuid) -> Result<Vec<RoomSummary>> {
        let db = self.db_guard();
        let rooms = db.rooms().list_for_participant(participant_id)?;
        rooms
            .into_iter()
            .map(|room| {
                let unread = db.watermarks().unread_count(room.id, participant_id)?;
                Ok(RoomSummary { room, unread })
            })
            .collect()
    }

    /// Administrative close. Participants can no longer send.
    pub fn close_room(&self, room_id: Uuid) -> Result<()> {
        let db = self.db_guard();
        db.rooms().set_status(room_id, RoomStatus::Closed)
    }

    /// Administrative archive. Terminal.
    pub fn archive_room(&self, room_id: Uuid) -> Result<()> {
        let db = self.db_guard();
        db.rooms().set_status(room_id, RoomStatus::Archived)
    }

    /// A listing was deleted: archive every room attached to it
    #[instrument(skip(self))]
    pub fn listing_deleted(&self, listing_id: Uuid, listing_type: ListingType) -> Result<u64> {
        let db = self.db_guard();
        let archived = db.rooms().archive_for_listing(listing_id, listing_type)?;
        if archived > 0 {
            warn!(%listing_id, archived, "Archived rooms for deleted listing");
        }
        Ok(archived)
    }
}

fn require_id(name: &str, id: Uuid) -> Result<()> {
    if id == Uuid::nil() {
        return Err(Error::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}
