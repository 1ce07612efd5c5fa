//! `yango-recon` — milestone payment reconciliation engine.
//!
//! Pure engine crate: receives raw reconciliation rows, returns classified
//! rows and weekly aggregates. No HTTP, UI or persistence dependencies.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod model;
pub mod normalize;
pub mod reasons;
pub mod summary;
pub mod week;

pub use aggregate::{aggregate_rows, totals};
pub use classify::classify;
pub use config::ReconConfig;
pub use engine::{run, ReconInput, ReconSource};
pub use error::{ReconError, RowError};
pub use model::{GrandTotal, ReconResult, ReconRow, WeeklyAggregate};
pub use reasons::{AnomalyReason, ReasonCatalog, ReasonLookup, Severity};
pub use week::effective_week;
