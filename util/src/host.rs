//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the software directory.
pub const SW_ROOT_ENV_VAR: &str = "RACE_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable ({0}) is not set")]
    SwRootNotSet(&'static str),

    #[error("The software root {0:?} is not a directory")]
    SwRootNotDir(PathBuf)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the root directory of the software, which contains the `params` and
/// `sessions` directories.
pub fn get_sw_root() -> Result<PathBuf, HostError> {
    let root = match env::var_os(SW_ROOT_ENV_VAR) {
        Some(r) => PathBuf::from(r),
        None => return Err(HostError::SwRootNotSet(SW_ROOT_ENV_VAR))
    };

    if !root.is_dir() {
        return Err(HostError::SwRootNotDir(root))
    }

    Ok(root)
}
