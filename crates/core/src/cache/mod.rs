pub mod optimistic;
pub mod query_cache;
pub mod registry;
