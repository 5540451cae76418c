pub mod client;
pub mod endpoint;
pub mod rates;
pub mod traits;
