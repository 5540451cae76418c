// ═══════════════════════════════════════════════════════════════════
// Cache Tests — QueryCache, CacheRegistry, OptimisticMutationCache
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, NaiveDate, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use zenith_ops_core::cache::optimistic::{MutationChange, MutationState, OptimisticMutationCache};
use zenith_ops_core::cache::query_cache::QueryCache;
use zenith_ops_core::cache::registry::CacheRegistry;
use zenith_ops_core::errors::CoreError;
use zenith_ops_core::models::cache_key::{CacheKey, CacheScope};
use zenith_ops_core::models::entity::{EntityId, OptimisticEntity};
use zenith_ops_core::models::settings::{InvalidationMap, Settings};

// ═══════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: EntityId,
    name: String,
}

impl OptimisticEntity for Item {
    type Draft = String;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn placeholder(draft: &String, id: EntityId) -> Self {
        Item {
            id,
            name: draft.clone(),
        }
    }
}

fn item(id: u64, name: &str) -> Item {
    Item {
        id: EntityId::from(id),
        name: name.into(),
    }
}

fn make_date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn expenses_key() -> CacheKey {
    CacheKey::new(CacheScope::Expenses).with_range(make_date(2025, 1, 1), make_date(2025, 1, 31))
}

/// Fresh for a minute, collected after ten.
fn long_lived<T: Clone>() -> QueryCache<T> {
    QueryCache::new(Duration::seconds(60), Duration::seconds(600))
}

struct Harness {
    expenses: Arc<QueryCache<Item>>,
    payables: Arc<QueryCache<Item>>,
    dashboard: Arc<QueryCache<Item>>,
    receivables: Arc<QueryCache<Item>>,
    mutations: OptimisticMutationCache<Item>,
}

fn harness() -> Harness {
    let expenses = Arc::new(long_lived());
    let payables = Arc::new(long_lived());
    let dashboard = Arc::new(long_lived());
    let receivables = Arc::new(long_lived());

    let mut registry = CacheRegistry::new();
    registry.register(expenses.clone());
    registry.register(payables.clone());
    registry.register(dashboard.clone());
    registry.register(receivables.clone());

    let mutations = OptimisticMutationCache::new(
        expenses.clone(),
        Arc::new(registry),
        CacheScope::Expenses,
        &InvalidationMap::default(),
    );

    Harness {
        expenses,
        payables,
        dashboard,
        receivables,
        mutations,
    }
}

// ═══════════════════════════════════════════════════════════════════
// QueryCache — reads, writes, staleness
// ═══════════════════════════════════════════════════════════════════

mod query_cache_basics {
    use super::*;

    #[test]
    fn set_then_get_while_fresh() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        assert_eq!(cache.get(&expenses_key()), Some(vec![item(1, "hotel")]));
        assert!(!cache.is_stale(&expenses_key()));
    }

    #[test]
    fn zero_stale_time_serves_nothing_from_get() {
        let cache: QueryCache<Item> = QueryCache::new(Duration::zero(), Duration::seconds(300));
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        assert_eq!(cache.get(&expenses_key()), None);
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "hotel")]));
    }

    #[test]
    fn missing_key_is_stale() {
        let cache: QueryCache<Item> = long_lived();
        assert!(cache.is_stale(&expenses_key()));
        assert!(cache.get(&expenses_key()).is_none());
    }

    #[test]
    fn entry_goes_stale_after_stale_time() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        let later = Utc::now() + Duration::seconds(61);
        assert!(cache.is_stale_at(&expenses_key(), later));
    }

    #[test]
    fn invalidate_marks_one_key() {
        let cache = long_lived();
        let other = CacheKey::new(CacheScope::Expenses);
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        cache.set(other.clone(), vec![]);

        assert!(cache.invalidate(&expenses_key()));
        assert!(cache.is_stale(&expenses_key()));
        assert!(!cache.is_stale(&other));
        assert!(!cache.invalidate(&CacheKey::new(CacheScope::Payables)));
    }

    #[test]
    fn invalidate_scope_matches_every_range_and_account() {
        let cache = long_lived();
        let january = expenses_key();
        let february = CacheKey::new(CacheScope::Expenses)
            .with_range(make_date(2025, 2, 1), make_date(2025, 2, 28));
        let account = CacheKey::new(CacheScope::BankStatement).with_account("ACC-1");
        cache.set(january.clone(), vec![]);
        cache.set(february.clone(), vec![]);
        cache.set(account.clone(), vec![item(9, "wire")]);

        assert_eq!(cache.invalidate_scope(CacheScope::Expenses), 2);
        assert!(cache.is_stale(&january));
        assert!(cache.is_stale(&february));
        assert!(!cache.is_stale(&account));
    }

    #[test]
    fn set_clears_staleness() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![]);
        cache.invalidate(&expenses_key());
        cache.set(expenses_key(), vec![item(2, "bus")]);
        assert!(!cache.is_stale(&expenses_key()));
    }

    #[test]
    fn modify_on_missing_key_creates_stale_entry() {
        let cache = long_lived();
        cache.modify(&expenses_key(), |items| items.push(item(1, "hotel")));
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "hotel")]));
        assert!(cache.is_stale(&expenses_key()));
    }

    #[test]
    fn restore_none_removes_key() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        cache.restore(&expenses_key(), None);
        assert!(!cache.contains(&expenses_key()));
    }

    #[test]
    fn evict_expired_drops_old_entries() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        cache.set(CacheKey::new(CacheScope::Payables), vec![]);

        assert_eq!(cache.evict_expired(Utc::now()), 0);
        assert_eq!(cache.evict_expired(Utc::now() + Duration::seconds(601)), 2);
        assert!(cache.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// QueryCache — fetch coordination & cancellation
// ═══════════════════════════════════════════════════════════════════

mod query_cache_fetch {
    use super::*;

    #[test]
    fn completed_ticket_is_stored() {
        let cache = long_lived();
        let ticket = cache.begin_fetch(&expenses_key());
        assert!(cache.is_current(&ticket));
        assert!(cache.complete_fetch(ticket, vec![item(1, "hotel")]));
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "hotel")]));
    }

    #[test]
    fn cancelled_ticket_is_discarded() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        let ticket = cache.begin_fetch(&expenses_key());
        cache.cancel_fetches(&expenses_key());

        assert!(!cache.is_current(&ticket));
        assert!(!cache.complete_fetch(ticket, vec![]));
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "hotel")]));
    }

    #[test]
    fn scope_invalidation_during_read_stores_result_stale() {
        let cache = long_lived();
        let ticket = cache.begin_fetch(&expenses_key());
        // Nothing cached yet, but the read is in flight.
        assert_eq!(cache.invalidate_scope(CacheScope::Expenses), 0);

        assert!(cache.complete_fetch(ticket, vec![item(1, "pre-mutation")]));
        assert!(cache.is_stale(&expenses_key()));
        assert_eq!(cache.get(&expenses_key()), None);
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "pre-mutation")]));
    }

    #[test]
    fn key_invalidation_during_read_stores_result_stale() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        let ticket = cache.begin_fetch(&expenses_key());
        assert!(cache.invalidate(&expenses_key()));

        assert!(cache.complete_fetch(ticket, vec![item(1, "hotel")]));
        assert!(cache.is_stale(&expenses_key()));
    }

    #[test]
    fn read_started_after_invalidation_is_fresh() {
        let cache = long_lived();
        cache.invalidate_scope(CacheScope::Expenses);
        let ticket = cache.begin_fetch(&expenses_key());

        assert!(cache.complete_fetch(ticket, vec![item(2, "bus")]));
        assert_eq!(cache.get(&expenses_key()), Some(vec![item(2, "bus")]));
    }

    #[test]
    fn invalidation_of_other_scope_leaves_read_fresh() {
        let cache = long_lived();
        let ticket = cache.begin_fetch(&expenses_key());
        cache.invalidate_scope(CacheScope::Receivables);

        assert!(cache.complete_fetch(ticket, vec![item(1, "hotel")]));
        assert!(!cache.is_stale(&expenses_key()));
    }

    #[test]
    fn from_settings_clamps_huge_durations() {
        let settings = Settings {
            stale_time_secs: u64::MAX,
            gc_time_secs: 10_000_000_000_000_000,
            ..Settings::default()
        };
        let cache: QueryCache<Item> = QueryCache::from_settings(&settings);
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        assert_eq!(cache.get(&expenses_key()), Some(vec![item(1, "hotel")]));
        assert_eq!(cache.evict_expired(Utc::now()), 0);
    }

    #[test]
    fn cancellation_is_per_key() {
        let cache: QueryCache<Item> = long_lived();
        let other = CacheKey::new(CacheScope::Receivables);
        let ticket = cache.begin_fetch(&other);
        cache.cancel_fetches(&expenses_key());
        assert!(cache.complete_fetch(ticket, vec![]));
    }

    #[tokio::test]
    async fn fetch_with_serves_fresh_hit_without_fetching() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        let calls = AtomicUsize::new(0);

        let items = cache
            .fetch_with(&expenses_key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![])
            })
            .await
            .unwrap();

        assert_eq!(items, vec![item(1, "hotel")]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_with_fetches_on_miss_and_stores() {
        let cache = long_lived();
        let items = cache
            .fetch_with(&expenses_key(), || async { Ok(vec![item(3, "tour")]) })
            .await
            .unwrap();

        assert_eq!(items, vec![item(3, "tour")]);
        assert_eq!(cache.get(&expenses_key()), Some(vec![item(3, "tour")]));
    }

    #[tokio::test]
    async fn fetch_with_refetches_stale_entry() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        cache.invalidate(&expenses_key());

        let items = cache
            .fetch_with(&expenses_key(), || async { Ok(vec![item(1, "hotel"), item(2, "bus")]) })
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn fetch_error_leaves_cache_untouched() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);
        cache.invalidate(&expenses_key());

        let result = cache
            .fetch_with(&expenses_key(), || async {
                Err::<Vec<Item>, _>(CoreError::Network("connection reset".into()))
            })
            .await;

        assert!(matches!(result, Err(CoreError::Network(_))));
        assert_eq!(cache.peek(&expenses_key()), Some(vec![item(1, "hotel")]));
    }

    #[tokio::test]
    async fn read_cancelled_mid_flight_returns_cached_list() {
        let cache = long_lived();
        cache.set(expenses_key(), vec![item(1, "hotel")]);

        let items = cache
            .refetch_with(&expenses_key(), || async {
                // A mutation starts while the read is in flight.
                cache.cancel_fetches(&expenses_key());
                cache.modify(&expenses_key(), |items| items.insert(0, item(2, "optimistic")));
                Ok(vec![item(1, "hotel")])
            })
            .await
            .unwrap();

        assert_eq!(items, vec![item(2, "optimistic"), item(1, "hotel")]);
        assert_eq!(cache.peek(&expenses_key()), Some(items));
    }
}

// ═══════════════════════════════════════════════════════════════════
// CacheRegistry
// ═══════════════════════════════════════════════════════════════════

mod registry {
    use super::*;

    #[test]
    fn invalidates_across_entity_types() {
        let expenses: Arc<QueryCache<Item>> = Arc::new(long_lived());
        let totals: Arc<QueryCache<f64>> = Arc::new(long_lived());
        let dashboard = CacheKey::new(CacheScope::FinancialDashboard);
        expenses.set(expenses_key(), vec![]);
        totals.set(dashboard.clone(), vec![1.0]);

        let mut registry = CacheRegistry::new();
        registry.register(expenses.clone());
        registry.register(totals.clone());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.invalidate(&[CacheScope::FinancialDashboard]), 1);
        assert!(totals.is_stale(&dashboard));
        assert!(!expenses.is_stale(&expenses_key()));
    }

    #[test]
    fn evict_expired_sums_over_caches() {
        let a: Arc<QueryCache<Item>> = Arc::new(long_lived());
        let b: Arc<QueryCache<Item>> = Arc::new(long_lived());
        a.set(expenses_key(), vec![]);
        b.set(CacheKey::new(CacheScope::Receivables), vec![]);

        let mut registry = CacheRegistry::new();
        registry.register(a);
        registry.register(b);
        assert_eq!(registry.evict_expired(Utc::now() + Duration::days(1)), 2);
    }

    #[test]
    fn empty_registry_invalidates_nothing() {
        let registry = CacheRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.invalidate(&[CacheScope::Expenses]), 0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// OptimisticMutationCache — start
// ═══════════════════════════════════════════════════════════════════

mod mutation_start {
    use super::*;

    #[test]
    fn create_prepends_one_speculative_entry() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel"), item(2, "bus")]);

        let ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));

        let items = h.expenses.peek(&expenses_key()).unwrap();
        assert_eq!(items.len(), 3);
        let temp_id = ctx.temp_id().unwrap();
        assert_eq!(&items[0].id, temp_id);
        assert_eq!(items[0].name, "ferry");
        assert!(temp_id.is_temporary());
        assert!(items[1..].iter().all(|i| &i.id != temp_id));
        assert_eq!(items.iter().filter(|i| i.is_speculative()).count(), 1);
    }

    #[test]
    fn start_moves_key_to_pending() {
        let h = harness();
        assert_eq!(h.mutations.state_of(&expenses_key()), MutationState::Idle);
        let ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        assert_eq!(ctx.state(), MutationState::Pending);
        assert_eq!(h.mutations.state_of(&expenses_key()), MutationState::Pending);
    }

    #[test]
    fn start_on_uncached_key_creates_list() {
        let h = harness();
        let ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap().len(), 1);
        assert!(ctx.snapshot_items().is_none());
    }

    #[test]
    fn start_cancels_in_flight_read() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);
        let ticket = h.expenses.begin_fetch(&expenses_key());

        h.mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));

        assert!(!h.expenses.complete_fetch(ticket, vec![item(1, "hotel")]));
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap().len(), 2);
    }

    #[test]
    fn update_replaces_entity_and_keeps_id() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel"), item(2, "bus")]);

        let ctx = h.mutations.on_mutation_start(
            &expenses_key(),
            &MutationChange::Update(EntityId::from(2), "coach".into()),
        );

        let items = h.expenses.peek(&expenses_key()).unwrap();
        assert_eq!(items, vec![item(1, "hotel"), item(2, "coach")]);
        assert!(ctx.temp_id().is_none());
    }

    #[test]
    fn delete_removes_entity() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel"), item(2, "bus")]);

        h.mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Delete(EntityId::from(1)));

        assert_eq!(h.expenses.peek(&expenses_key()).unwrap(), vec![item(2, "bus")]);
    }

    #[test]
    fn temporary_ids_are_unique_across_mutations() {
        let h = harness();
        let a = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("a".into()));
        let b = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("b".into()));
        assert_ne!(a.temp_id(), b.temp_id());
    }
}

// ═══════════════════════════════════════════════════════════════════
// OptimisticMutationCache — rollback
// ═══════════════════════════════════════════════════════════════════

mod mutation_rollback {
    use super::*;

    #[test]
    fn error_restores_exact_snapshot() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel"), item(2, "bus")]);
        let before = h.expenses.snapshot(&expenses_key());

        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        h.mutations.on_mutation_error(&mut ctx).unwrap();

        assert_eq!(h.expenses.snapshot(&expenses_key()), before);
        assert_eq!(ctx.state(), MutationState::RolledBack);
        assert_eq!(h.mutations.state_of(&expenses_key()), MutationState::RolledBack);
    }

    #[test]
    fn error_restores_deleted_and_updated_entities() {
        let h = harness();
        let original = vec![item(1, "hotel"), item(2, "bus")];
        h.expenses.set(expenses_key(), original.clone());

        let mut del = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Delete(EntityId::from(1)));
        h.mutations.on_mutation_error(&mut del).unwrap();
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap(), original);

        let mut upd = h.mutations.on_mutation_start(
            &expenses_key(),
            &MutationChange::Update(EntityId::from(2), "coach".into()),
        );
        h.mutations.on_mutation_error(&mut upd).unwrap();
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap(), original);
    }

    #[test]
    fn error_on_previously_uncached_key_removes_it() {
        let h = harness();
        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        h.mutations.on_mutation_error(&mut ctx).unwrap();
        assert!(!h.expenses.contains(&expenses_key()));
    }

    #[test]
    fn rollback_does_not_invalidate() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);
        h.dashboard.set(CacheKey::new(CacheScope::FinancialDashboard), vec![]);

        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        h.mutations.on_mutation_error(&mut ctx).unwrap();

        assert!(!h.expenses.is_stale(&expenses_key()));
        assert!(!h.dashboard.is_stale(&CacheKey::new(CacheScope::FinancialDashboard)));
    }

    #[test]
    fn second_mutation_snapshots_first_speculative_entry() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);

        let first = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("a".into()));
        let mut second = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("b".into()));

        let snapshot = second.snapshot_items().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(Some(&snapshot[0].id), first.temp_id());

        // Rolling back the second leaves the first speculative entry in place.
        h.mutations.on_mutation_error(&mut second).unwrap();
        let items = h.expenses.peek(&expenses_key()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(Some(&items[0].id), first.temp_id());
    }
}

// ═══════════════════════════════════════════════════════════════════
// OptimisticMutationCache — commit
// ═══════════════════════════════════════════════════════════════════

mod mutation_commit {
    use super::*;

    #[test]
    fn success_invalidates_key_and_dependents() {
        let h = harness();
        let payables_key = CacheKey::new(CacheScope::Payables);
        let dashboard_key = CacheKey::new(CacheScope::FinancialDashboard);
        let receivables_key = CacheKey::new(CacheScope::Receivables);
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);
        h.payables.set(payables_key.clone(), vec![]);
        h.dashboard.set(dashboard_key.clone(), vec![]);
        h.receivables.set(receivables_key.clone(), vec![]);

        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        let marked = h.mutations.on_mutation_success(&mut ctx).unwrap();

        assert_eq!(marked, 3);
        assert!(h.expenses.is_stale(&expenses_key()));
        assert!(h.expenses.get(&expenses_key()).is_none());
        assert!(h.payables.is_stale(&payables_key));
        assert!(h.dashboard.is_stale(&dashboard_key));
        assert!(!h.receivables.is_stale(&receivables_key));
        assert_eq!(ctx.state(), MutationState::Committed);
        assert!(ctx.snapshot_items().is_none());
    }

    #[test]
    fn success_overtakes_dependent_read_in_flight() {
        let h = harness();
        let dashboard_key = CacheKey::new(CacheScope::FinancialDashboard);
        let ticket = h.dashboard.begin_fetch(&dashboard_key);

        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("taxi".into()));
        h.mutations.on_mutation_success(&mut ctx).unwrap();

        assert!(h.dashboard.complete_fetch(ticket, vec![item(9, "old totals")]));
        assert!(h.dashboard.is_stale(&dashboard_key));
    }

    #[test]
    fn success_keeps_speculative_entry_until_refetch() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);
        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        h.mutations.on_mutation_success(&mut ctx).unwrap();
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap().len(), 2);
    }

    #[test]
    fn dependents_follow_invalidation_map() {
        let h = harness();
        assert_eq!(
            h.mutations.dependents(),
            &[CacheScope::Payables, CacheScope::FinancialDashboard]
        );
    }

    #[test]
    fn settling_twice_is_rejected() {
        let h = harness();
        let mut ctx = h
            .mutations
            .on_mutation_start(&expenses_key(), &MutationChange::Create("ferry".into()));
        h.mutations.on_mutation_success(&mut ctx).unwrap();

        assert!(matches!(
            h.mutations.on_mutation_success(&mut ctx),
            Err(CoreError::InvalidMutationState(_))
        ));
        assert!(matches!(
            h.mutations.on_mutation_error(&mut ctx),
            Err(CoreError::InvalidMutationState(_))
        ));
        // The committed entry was not rolled back by the rejected call.
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// OptimisticMutationCache — run()
// ═══════════════════════════════════════════════════════════════════

mod mutation_run {
    use super::*;

    #[tokio::test]
    async fn optimistic_entry_visible_before_request_runs() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);
        let cache = h.expenses.clone();
        let key = expenses_key();

        let seen = h
            .mutations
            .run(&expenses_key(), MutationChange::Create("ferry".into()), async move {
                let items = cache.peek(&key).unwrap();
                assert!(items[0].id.is_temporary());
                Ok(items.len())
            })
            .await
            .unwrap();

        assert_eq!(seen, 2);
        assert_eq!(h.mutations.state_of(&expenses_key()), MutationState::Committed);
    }

    #[tokio::test]
    async fn failed_request_rolls_back_and_reports_mutation_error() {
        let h = harness();
        h.expenses.set(expenses_key(), vec![item(1, "hotel")]);

        let result: Result<(), CoreError> = h
            .mutations
            .run(&expenses_key(), MutationChange::Create("ferry".into()), async {
                Err(CoreError::Api {
                    endpoint: "finance/expenses/".into(),
                    status: 400,
                    message: "amount must be positive".into(),
                })
            })
            .await;

        match result {
            Err(CoreError::Mutation { entity, message }) => {
                assert_eq!(entity, "expenses");
                assert!(message.contains("amount must be positive"));
            }
            other => panic!("expected mutation error, got {other:?}"),
        }
        assert_eq!(h.expenses.peek(&expenses_key()).unwrap(), vec![item(1, "hotel")]);
        assert_eq!(h.mutations.state_of(&expenses_key()), MutationState::RolledBack);
    }
}
