//! `gstmatch-recon`: GST invoice reconciliation engine.
//!
//! Pure engine crate: receives pre-parsed rows from the company ledger and
//! the tax portal, returns every invoice classified as matched,
//! buffer-matched, or unmatched on one side. File formats live in the CLI.

pub mod buffer;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod input;
pub mod matcher;
pub mod model;
pub mod normalize;

pub use config::ReconConfig;
pub use engine::run;
pub use error::{NormalizationError, ReconError};
pub use input::load_csv_rows;
pub use model::{InvoiceRecord, MatchClass, RawRow, RawValue, ReconInput, ReconResult, Source};
