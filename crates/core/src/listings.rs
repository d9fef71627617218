//! Listing collaborator seam
//!
//! The listing subsystem (CRUD, categories, pricing) is external to the chat
//! core. The core only needs to resolve a listing reference when a contact
//! attempt comes in, so that seam is a trait the caller supplies.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{ListingRef, ListingType};

/// Resolves listing references for the chat core
pub trait ListingDirectory: Send + Sync {
    /// Look up a listing. `Ok(None)` means the reference does not resolve.
    fn resolve(&self, listing_id: Uuid, listing_type: ListingType) -> Result<Option<ListingRef>>;
}

/// In-memory directory for tests and embedding without a listing backend
#[derive(Default)]
pub struct StaticListings {
    listings: RwLock<HashMap<(Uuid, ListingType), ListingRef>>,
}

impl StaticListings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, listing: ListingRef) {
        self.listings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((listing.id, listing.listing_type), listing);
    }

    pub fn remove(&self, listing_id: Uuid, listing_type: ListingType) {
        self.listings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&(listing_id, listing_type));
    }
}

impl ListingDirectory for StaticListings {
    fn resolve(&self, listing_id: Uuid, listing_type: ListingType) -> Result<Option<ListingRef>> {
        Ok(self
            .listings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(listing_id, listing_type))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_listing() {
        let dir = StaticListings::new();
        let found = dir.resolve(Uuid::new_v4(), ListingType::Supply).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_resolve_is_keyed_by_type() {
        let dir = StaticListings::new();
        let id = Uuid::new_v4();
        dir.insert(ListingRef {
            id,
            listing_type: ListingType::Supply,
            supplier_id: Uuid::new_v4(),
        });

        assert!(dir.resolve(id, ListingType::Supply).unwrap().is_some());
        assert!(dir.resolve(id, ListingType::Demand).unwrap().is_none());
    }

    #[test]
    fn test_remove() {
        let dir = StaticListings::new();
        let id = Uuid::new_v4();
        dir.insert(ListingRef {
            id,
            listing_type: ListingType::Demand,
            supplier_id: Uuid::new_v4(),
        });
        dir.remove(id, ListingType::Demand);
        assert!(dir.resolve(id, ListingType::Demand).unwrap().is_none());
    }
}
