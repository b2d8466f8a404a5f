// Domain layer - Plant samples, binning, charts and chat turns
pub mod category;
pub mod chart;
pub mod chat;
pub mod query;
pub mod sample;
