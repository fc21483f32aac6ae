pub mod metrics;
pub mod platform;
