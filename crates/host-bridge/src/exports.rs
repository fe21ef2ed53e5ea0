//! The table of every function a guest may import
//!
//! Keys are qualified `module.name` strings: `wasi_snapshot_preview1.<call>`
//! for the WASI subset and `godot.node3D_<operation>` for the node calls.  The
//! table is built once and shared by every instance.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use crate::{
    hcall::{
        node3d::{self, NODE3D_PREFIX},
        CallSignature,
    },
    wasi::{WasiAPIName, WASI_SNAPSHOT_MODULE_NAME},
};
use lazy_static::lazy_static;
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// The name of the containing module for all node imports.
pub const HOST_OBJECT_MODULE_NAME: &str = "godot";

lazy_static! {
    static ref EXPORT_TABLE: ExportTable = ExportTable::build();
}

/// Qualified import names mapped to their signatures.
#[derive(Debug)]
pub struct ExportTable {
    signatures: HashMap<String, CallSignature>,
}

/// Joins a module and a function name into a table key.
pub fn qualified_name(module: &str, name: &str) -> String {
    format!("{}.{}", module, name)
}

impl ExportTable {
    fn build() -> Self {
        let wasi = WasiAPIName::iter().map(|api| {
            (
                qualified_name(WASI_SNAPSHOT_MODULE_NAME, api.name()),
                api.signature(),
            )
        });
        let nodes = node3d::exports().into_iter().map(|(operation, signature)| {
            (
                format!("{}.{}{}", HOST_OBJECT_MODULE_NAME, NODE3D_PREFIX, operation),
                signature,
            )
        });
        ExportTable {
            signatures: wasi.chain(nodes).collect(),
        }
    }

    /// The process-wide table.
    pub fn global() -> &'static ExportTable {
        &EXPORT_TABLE
    }

    /// The signature of `name` in `module`, if the host offers it.
    pub fn lookup(&self, module: &str, name: &str) -> Option<&CallSignature> {
        self.get(&qualified_name(module, name))
    }

    /// The signature for an already qualified name.
    pub fn get(&self, qualified: &str) -> Option<&CallSignature> {
        self.signatures.get(qualified)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Every qualified name, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.signatures.keys().map(String::as_str)
    }
}
