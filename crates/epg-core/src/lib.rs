pub mod cache;
pub mod clock;
pub mod config;
pub mod freshness;
pub mod platform;
pub mod schedule;
