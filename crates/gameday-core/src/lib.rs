pub mod calendar;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod io;
pub mod ledger;
pub mod notify;
pub mod paths;
pub mod presence;
pub mod reconcile;
pub mod recovery;
pub mod registry;
pub mod schedule;
pub mod types;

#[cfg(test)]
mod testing;

pub use engine::DecisionEngine;
pub use error::{GamedayError, Result};
pub use reconcile::ReconciliationProcessor;
