//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `gstmatch` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 2    | CLI usage error (bad args, no input file configured)      |
//! | 3    | I/O error (cannot read or write a file)                   |
//! | 4    | Invalid configuration                                     |
//! | 5    | Input error (missing column, unreadable sheet)            |
//! | 6    | Internal aggregation fault                                |
//! | 7    | Unmatched records present (`--fail-on-unmatched`)         |

use gstmatch_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// An input file is readable but unusable.
pub const EXIT_INPUT: u8 = 5;

/// Classification sets violated the exactly-once invariant.
pub const EXIT_AGGREGATION: u8 = 6;

/// Unmatched or buffer-matched records found and `--fail-on-unmatched` set.
pub const EXIT_UNMATCHED: u8 = 7;

/// Map a `ReconError` to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        e if e.is_configuration() => EXIT_INVALID_CONFIG,
        ReconError::MissingColumn { .. } => EXIT_INPUT,
        ReconError::Io(_) | ReconError::Serialize(_) => EXIT_IO,
        ReconError::Aggregation(_) => EXIT_AGGREGATION,
        _ => EXIT_INVALID_CONFIG,
    }
}
