//! The host bridge
//!
//! This crate runs a sandboxed WebAssembly guest and exposes two families of
//! host functions to it:
//!
//! 1. a capability-gated subset of WASI preview1 (output, exit, program
//!    arguments, an empty environment, randomness and clocks),
//! 2. the `node3D_*` calls, which let the guest manipulate host spatial nodes
//!    through opaque, generation-checked handles.
//!
//! Every guest supplied offset is bounds checked against the guest's linear
//! memory, and every failure is reported to the guest as a WASI error number
//! followed by a trap.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

pub mod capability;
pub mod context;
pub mod engines;
pub mod error;
pub mod exports;
pub mod handle;
pub mod hcall;
pub mod marshal;
pub mod memory;
pub mod scene;
pub mod services;
mod strace;
pub mod wasi;

// Expose the error to the external.
pub use crate::error::{BridgeError, BridgeResult, ErrNo};

use crate::{
    capability::CapabilitySet,
    context::InstanceState,
    engines::{common::ExecutionEngine, wasmtime::WasmtimeRuntimeState},
    scene::NodeRegistry,
    services::HostServices,
};
use serde::{Deserialize, Serialize};
use std::{boxed::Box, string::String, sync::Arc, vec::Vec};

/// Per-instance configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// The raw program arguments, folded into `key=value` entries for
    /// `args_get`.
    pub program_arguments: Vec<String>,
    /// The capabilities granted to the guest.  None by default.
    pub capabilities: CapabilitySet,
    /// Whether strace-like output is enabled.
    pub enable_strace: bool,
}

impl Options {
    /// Parses options from JSON, e.g.
    /// `{"program_arguments": ["--speed=2"], "capabilities": ["print"]}`.
    /// Missing fields take their defaults.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The top-level function runs the guest `program` (binary or text format)
/// with the given `options`, routing output, randomness and time through
/// `services`, and resolving node handles in `nodes`.
///
/// Returns the code the guest passed to `proc_exit`, or `0` if its `_start`
/// returned.  Any other trap, and any failure to instantiate the module, is an
/// error.
///
/// Note that the `execute` function is essentially this library's
/// interface to the outside world.
pub fn execute(
    program: &[u8],
    options: Options,
    services: Box<dyn HostServices + Send>,
    nodes: Arc<NodeRegistry>,
) -> anyhow::Result<i32> {
    let state = InstanceState::new(options, services, nodes);
    let mut engine = WasmtimeRuntimeState::new(state)?;
    engine.invoke_entry_point(program)
}
