//! Global error handling.
//!
//! Each sub-crate of the project defines its own type error.
//! Their types can be unified, for example in a main function,
//! when winding results at the top-level.
//!
//! ```rust
//! use droidworks_deodex::prelude::*;
//!
//! fn main() -> DwResult<()> { // can return a DwError
//!    let _resolver = InlineMethodResolver::for_vm_version(35)?; // can return an AnalysisError
//!    Ok(())
//! }
//! ```

use dw_analysis::classpath::errors::ClassPathError;
use dw_analysis::errors::AnalysisError;
use dw_dex::errors::DexError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DwError`].
pub type DwResult<T> = Result<T, DwError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum DwError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned from [`dw_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from the class path of [`dw_analysis`].
    #[error(transparent)]
    ClassPath(#[from] ClassPathError),

    /// Error that can be returned from [`dw_dex`] functions.
    #[error(transparent)]
    Dex(#[from] DexError),
}
