// Application layer - Chart sessions, aggregation and tradeoff use cases
pub mod aggregation_service;
pub mod analytics_repository;
pub mod cancel;
pub mod chart_session;
pub mod error;
pub mod tradeoff_service;
