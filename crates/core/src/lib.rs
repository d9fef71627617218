//! Tradeyard Core Library
//!
//! Core models, the listing collaborator seam, and storage for the Tradeyard
//! buyer–supplier chat core.

pub mod error;
pub mod invariants;
pub mod listings;
pub mod models;
pub mod storage;

pub use error::{Error, Result};
pub use listings::{ListingDirectory, StaticListings};
pub use models::*;
pub use storage::{
    Database, MessageRepository, MessageStore, RoomRepository, RoomStore, WatermarkRepository,
    WatermarkStore,
};
