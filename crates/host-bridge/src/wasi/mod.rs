//! The WASI preview1 subset offered to guests
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

pub mod common;

pub use self::common::WasiAPIName;

/// The name of the containing module for all WASI imports.
pub const WASI_SNAPSHOT_MODULE_NAME: &str = "wasi_snapshot_preview1";
/// The name of the WASM program's linear memory.
pub const LINEAR_MEMORY_NAME: &str = "memory";
/// The name of the WASM program's entry point.
pub const ENTRY_POINT_NAME: &str = "_start";
