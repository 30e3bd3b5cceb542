//! Invalidation router.
//!
//! Services call one method per entity family right after a write commits and
//! before responding. Every call runs synchronously against the store, so a
//! read that starts after the call returns cannot see pre-write data.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::keys::Tag;
use super::mutation::Mutation;
use super::planner::InvalidationPlan;
use super::store::TtlStore;

pub struct InvalidationRouter {
    store: Arc<TtlStore>,
}

impl InvalidationRouter {
    pub fn new(store: Arc<TtlStore>) -> Self {
        Self { store }
    }

    /// Plan and apply the invalidation for a mutation.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, mutation: Mutation) -> usize {
        let plan = InvalidationPlan::from_mutation(&mutation);
        debug!(mutation = %mutation, plan = %plan, "Invalidation planned");

        let removed = match &plan {
            InvalidationPlan::PurgeAll => self.store.clear(),
            InvalidationPlan::Tags(tags) => self.remove_tags(tags),
        };

        info!(mutation = %mutation, removed, "Cache invalidated");
        removed
    }

    pub fn invalidate_booking_cache(
        &self,
        booking_id: Option<Uuid>,
        customer_id: Option<Uuid>,
        vehicle_id: Option<Uuid>,
    ) -> usize {
        self.invalidate(Mutation::Booking {
            booking_id,
            customer_id,
            vehicle_id,
        })
    }

    pub fn invalidate_vehicle_cache(&self, vehicle_id: Option<Uuid>) -> usize {
        self.invalidate(Mutation::Vehicle { vehicle_id })
    }

    pub fn invalidate_customer_cache(&self, customer_id: Option<Uuid>) -> usize {
        self.invalidate(Mutation::Customer { customer_id })
    }

    pub fn invalidate_dashboard_cache(&self, user_id: Option<&str>) -> usize {
        self.invalidate(Mutation::Dashboard {
            user_id: user_id.map(str::to_string),
        })
    }

    pub fn invalidate_financial_cache(&self) -> usize {
        self.invalidate(Mutation::Financial)
    }

    pub fn invalidate_expense_cache(&self, expense_id: Option<Uuid>) -> usize {
        self.invalidate(Mutation::Expense { expense_id })
    }

    pub fn invalidate_maintenance_cache(&self, vehicle_id: Option<Uuid>) -> usize {
        self.invalidate(Mutation::Maintenance { vehicle_id })
    }

    pub fn invalidate_all_cache(&self) -> usize {
        self.invalidate(Mutation::All)
    }

    fn remove_tags(&self, tags: &BTreeSet<Tag>) -> usize {
        // An entry carrying several of the tags is only counted once: the
        // first tag removes it, later ones no longer see it.
        tags.iter().map(|tag| self.store.delete_by_tag(tag)).sum()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::keys::{CacheKey, KeyParams, Namespace, build_key, entity_key};

    const TTL: Duration = Duration::from_secs(60);

    fn router() -> (InvalidationRouter, Arc<TtlStore>) {
        let store = Arc::new(TtlStore::new(&CacheConfig::default()));
        (InvalidationRouter::new(Arc::clone(&store)), store)
    }

    fn list_key(ns: Namespace) -> CacheKey {
        build_key(ns.as_str(), &KeyParams::new().with("page", 1))
    }

    #[test]
    fn booking_invalidation_removes_listings_and_details() {
        let (router, store) = router();
        let booking = Uuid::new_v4();
        let vehicle = Uuid::new_v4();

        store.set_tagged(
            list_key(Namespace::Booking),
            1u8,
            TTL,
            [Tag::Namespace(Namespace::Booking)],
        );
        store.set_tagged(
            entity_key(Namespace::Vehicle, vehicle),
            2u8,
            TTL,
            [
                Tag::Namespace(Namespace::Vehicle),
                Tag::entity(Namespace::Vehicle, vehicle),
            ],
        );
        store.set_tagged(
            list_key(Namespace::Invoice),
            3u8,
            TTL,
            [Tag::Namespace(Namespace::Invoice)],
        );

        let removed = router.invalidate_booking_cache(Some(booking), None, Some(vehicle));

        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(&list_key(Namespace::Invoice)).is_some());
    }

    #[test]
    fn dashboard_invalidation_is_scoped_to_dashboard() {
        let (router, store) = router();
        store.set_tagged(
            CacheKey::from_raw("dashboard:u1"),
            1u8,
            TTL,
            [Tag::Namespace(Namespace::Dashboard), Tag::user("u1")],
        );
        store.set_tagged(
            list_key(Namespace::Vehicle),
            2u8,
            TTL,
            [Tag::Namespace(Namespace::Vehicle)],
        );

        assert_eq!(router.invalidate_dashboard_cache(Some("u1")), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn financial_invalidation_leaves_fleet_data() {
        let (router, store) = router();
        for ns in [Namespace::Invoice, Namespace::Payout, Namespace::Vehicle] {
            store.set_tagged(list_key(ns), 0u8, TTL, [Tag::Namespace(ns)]);
        }

        assert_eq!(router.invalidate_financial_cache(), 2);
        assert!(store.get(&list_key(Namespace::Vehicle)).is_some());
    }

    #[test]
    fn all_cache_clears_untagged_entries_too() {
        let (router, store) = router();
        store.set(CacheKey::from_raw("misc"), 1u8, TTL);
        store.set_tagged(
            list_key(Namespace::Report),
            2u8,
            TTL,
            [Tag::Namespace(Namespace::Report)],
        );

        assert_eq!(router.invalidate_all_cache(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn invalidation_with_nothing_cached_is_harmless() {
        let (router, store) = router();
        let before = store.epoch();

        assert_eq!(router.invalidate_vehicle_cache(None), 0);
        assert!(store.epoch() > before);
    }
}
