//! Marketplace worker: claims tasks from a shared marketplace and runs them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod marketplace;
pub mod task;
pub mod worker;
