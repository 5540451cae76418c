pub mod cache_key;
pub mod entity;
pub mod finance;
pub mod mutation;
pub mod rate;
pub mod settings;
pub mod summary;
