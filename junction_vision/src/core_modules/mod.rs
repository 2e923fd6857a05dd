pub mod aggregator;
pub mod controller;
pub mod detection;
pub mod metrics_store;
pub mod tracker;
