pub mod astro;
pub mod config;
pub mod context;
pub mod device;
pub mod report;
pub mod schedule;
pub mod solar;
