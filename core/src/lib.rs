//! Restock budget simulation core.
//!
//! Tier pricing, SKU price lookup, the selection/budget aggregator and
//! the SQLite-backed session that writes it through.

pub mod budget;
pub mod command;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod format;
pub mod price_index;
pub mod repository;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod tier;
pub mod types;
