//! Data ingestion module - sequential pipeline for PurpleAir sensor data

pub mod error;
pub mod fetch;
pub mod history;
pub mod locate;
pub mod parse;
pub mod throttle;
pub mod types;
pub mod utils;
pub mod windows;
pub mod write;

pub use types::*;
