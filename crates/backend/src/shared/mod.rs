pub mod config;
pub mod throttle;
