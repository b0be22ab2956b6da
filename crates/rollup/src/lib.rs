//! `smeta-rollup` — cost-estimate rollup engine.
//!
//! Pure engine crate: receives parsed document trees and mapping tables,
//! returns rolled-up, classified and grouped report rows. No CLI or file IO.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod items;
pub mod itog;
pub mod model;
pub mod tep;
pub mod tree;

pub use classify::{Classification, ClassificationTable, NlsrEntry};
pub use config::SmetaConfig;
pub use engine::{run, DocumentInput, Mappings};
pub use error::{DocumentError, RollupError};
pub use extract::{extract_document, DocumentSource, DocumentSummary, ExtractOptions};
pub use itog::{compute_rollup, FinancialRollup};
pub use model::{Amount, CorpusReport, DocumentOutcome, PriceLevel, UnitMetric};
pub use tep::TepTable;
pub use tree::{FlatRecord, Node};
