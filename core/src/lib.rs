//! Hierarchical commission-split engine for an insurance agency back office.
//!
//! A commission event is split between the writing agent and the override
//! recipients of each ancestor organization (agency -> MGA -> IMO), then
//! written to the ledger.

pub mod aggregate;
pub mod allocator;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod formulas;
pub mod hierarchy;
pub mod model;
pub mod recipient;
pub mod store;
pub mod types;
