//! Tradeyard Chat Runtime
//!
//! Composes the storage layer into the chat core's caller-facing surface:
//! the Subscription Bus (live fan-out of appended messages) and the Chat
//! Service orchestrator (contact, send, fetch, mark-read, subscribe).
//!
//! # Architecture
//!
//! - **SubscriptionBus**: per-room map of live subscribers, each behind a
//!   bounded channel. Push is best-effort; the Message Log stays the source
//!   of truth and clients reconcile by refetching after a gap.
//! - **ChatService**: validates at the boundary, then drives Room Registry,
//!   Message Log, Read Tracker, and the bus in order.
//!
//! # Usage
//!
//! ```ignore
//! let db = Database::open("tradeyard.db")?;
//! let listings = Arc::new(StaticListings::new());
//! let chat = ChatService::new(db, listings);
//!
//! let room = chat.contact(listing_id, ListingType::Supply, supplier, buyer,
//!     "Hi, I'm interested in your listing")?;
//! let mut stream = chat.subscribe(room.id, session_id)?;
//! chat.send(room.id, buyer, "Is this still available?")?;
//! while let Some(message) = stream.recv().await { /* render */ }
//! ```

pub mod bus;
pub mod service;

pub use bus::SubscriptionBus;
pub use service::ChatService;
