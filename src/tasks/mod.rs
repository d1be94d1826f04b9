//! Background Tasks Module
//!
//! # Tasks
//! - Expired-record sweep: optional eager removal of expired entries

mod sweep;

pub use sweep::spawn_sweep_task;
