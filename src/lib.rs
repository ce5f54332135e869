//! treeflow - read-side reconciler for on-chain tree-planting sessions
//!
//! Builds a de-duplicated, newest-first view of sessions and funding
//! movements from historical log queries plus live log delivery, and keeps
//! the derived aggregates consistent with it.

pub mod aggregate;
pub mod backfill;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod index;
pub mod ledger;
pub mod live;
pub mod normalizer;
pub mod notify;
pub mod runtime;
pub mod snapshot;
pub mod source;
pub mod types;

pub use config::Config;
pub use engine::{Reconciler, Trigger};
pub use error::ReconcileError;
