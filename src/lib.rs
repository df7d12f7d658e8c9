pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod navigation;
pub mod scheduler;
pub mod search;
