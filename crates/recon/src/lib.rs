//! `kasa-recon`: EKJ Z-report vs OLD sales export reconciliation engine.
//!
//! Pure engine crate: receives already-read text, returns typed results.
//! No file discovery, no CLI, no report writing.

pub mod amount;
pub mod config;
pub mod ekj;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod old;
pub mod reconcile;
pub mod render;

pub use config::ReconConfig;
pub use engine::{Engine, RunOutcome};
pub use error::{ConfigError, ExtractError, ParseError, RunError};
pub use model::{AmountMismatch, OldRecord, Receipt, ReconStatus, Reconciliation, ZReport};
pub use render::render_text;
