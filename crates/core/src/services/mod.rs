pub mod bank_statement;
pub mod dashboard;
pub mod entity_service;
pub mod exchange_rates;
pub mod expenses;
pub mod notifications;
pub mod receivables;
