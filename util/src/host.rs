//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software installation.
///
/// The root is read from the `ARES_SW_ROOT` environment variable, which must
/// point at the checkout containing the `params` and `sessions` directories.
pub fn get_ares_sw_root() -> Result<PathBuf, std::env::VarError> {
    Ok(PathBuf::from(std::env::var("ARES_SW_ROOT")?))
}
