//! Common code for any engine implementation
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use anyhow::Result;

////////////////////////////////////////////////////////////////////////////////
// The strategy trait.
////////////////////////////////////////////////////////////////////////////////

/// This is what an execution engine exposes to clients outside of this
/// library.  If any functionality is missing that an embedder requires then
/// it should be added to this trait and implemented for all engines.
pub trait ExecutionEngine: Send {
    /// Entry point for the execution engine: instantiates the `program`
    /// binary against the export table and runs its `_start` function.
    /// Returns `Ok(c)` with the code the guest passed to `proc_exit`, or `0`
    /// if `_start` returned normally.  Returns `Err(e)` if the module could
    /// not be instantiated or if the guest trapped for any other reason.
    fn invoke_entry_point(&mut self, program: &[u8]) -> Result<i32>;
}
