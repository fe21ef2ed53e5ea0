//! An implementation of the ExecutionEngine runtime state for Wasmtime.
//!
//! Every import of a guest module is resolved against the export table before
//! instantiation; a module importing anything the table does not name is
//! rejected.  Each resolved import becomes a dynamically typed `Func` that
//! borrows the caller's linear memory and the instance state for the duration
//! of the call and hands both to `CallSignature::invoke`.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Copyright
//!
//! See the file `LICENSE.md` in the repository root directory for licensing
//! and copyright information.

use crate::{
    context::{CallContext, InstanceState},
    engines::common::ExecutionEngine,
    error::BridgeError,
    exports::{qualified_name, ExportTable},
    hcall::CallSignature,
    wasi::{ENTRY_POINT_NAME, LINEAR_MEMORY_NAME},
};
use anyhow::Result;
use log::info;
use std::vec::Vec;
use wasmtime::{
    AsContextMut, Caller, Config, Engine, Extern, ExternType, Func, Instance, Module, Store, Val,
};

////////////////////////////////////////////////////////////////////////////////
// The Wasmtime runtime state.
////////////////////////////////////////////////////////////////////////////////

/// The facade of the Wasmtime host provisioning state: an engine and a store
/// owning the state of one guest instance.
pub struct WasmtimeRuntimeState {
    engine: Engine,
    store: Store<InstanceState>,
}

/// Wraps the export table entry `signature` as a host function callable by a
/// guest.  `name` is the qualified import name, used for tracing.
pub fn host_function(
    store: impl AsContextMut<Data = InstanceState>,
    name: String,
    signature: &'static CallSignature,
) -> Func {
    Func::new(store, signature.func_type(), move |caller, params, results| {
        call_host(caller, &name, signature, params, results)
    })
}

fn call_host(
    mut caller: Caller<'_, InstanceState>,
    name: &str,
    signature: &CallSignature,
    params: &[Val],
    results: &mut [Val],
) -> Result<()> {
    let memory = caller
        .get_export(LINEAR_MEMORY_NAME)
        .and_then(Extern::into_memory);
    let mut context = match memory {
        Some(memory) => {
            let (bytes, state) = memory.data_and_store_mut(&mut caller);
            CallContext::new(Some(bytes), state)
        }
        None => CallContext::new(None, caller.data_mut()),
    };
    signature.invoke(name, &mut context, params, results)?;
    Ok(())
}

/// Builds the import list for `module`, in import order.
fn resolve_imports(
    store: &mut Store<InstanceState>,
    module: &Module,
) -> Result<Vec<Extern>, BridgeError> {
    let table = ExportTable::global();
    module
        .imports()
        .map(|import| {
            let name = qualified_name(import.module(), import.name());
            if let ExternType::Func(_) = import.ty() {
                let signature = table
                    .get(&name)
                    .ok_or_else(|| BridgeError::UnknownHostFunction(name.clone()))?;
                Ok(Extern::Func(host_function(&mut *store, name, signature)))
            } else {
                Err(BridgeError::InvalidModule(format!(
                    "import '{}' is not a function",
                    name
                )))
            }
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////////////
// Operations on the WasmtimeRuntimeState.
////////////////////////////////////////////////////////////////////////////////

impl WasmtimeRuntimeState {
    /// Creates a new runtime state owning `state`.
    pub fn new(state: InstanceState) -> Result<Self> {
        let engine = Engine::new(&Config::default())?;
        let store = Store::new(&engine, state);
        info!("Wasmtime is initialised");
        Ok(Self { engine, store })
    }

    #[inline]
    pub fn state(&self) -> &InstanceState {
        self.store.data()
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut InstanceState {
        self.store.data_mut()
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut Store<InstanceState> {
        &mut self.store
    }

    pub fn into_state(self) -> InstanceState {
        self.store.into_data()
    }

    /// Compiles `program` (binary or text format) and instantiates it against
    /// the export table, without running anything.
    pub fn instantiate(&mut self, program: &[u8]) -> Result<Instance> {
        let module = Module::new(&self.engine, program)
            .map_err(|e| BridgeError::InvalidModule(e.to_string()))?;
        let imports = resolve_imports(&mut self.store, &module)?;
        Ok(Instance::new(&mut self.store, &module, &imports)?)
    }
}

/// The `WasmtimeRuntimeState` implements everything needed to create a
/// compliant instance of `ExecutionEngine`.
impl ExecutionEngine for WasmtimeRuntimeState {
    /// Executes the entry point of the WASM program.
    ///
    /// Returns an error if the program is invalid, imports functions the host
    /// does not offer, or does not export `_start`.  Also returns an error if
    /// the program traps, unless the trap is the one raised by `proc_exit`, in
    /// which case the exit code is returned.
    fn invoke_entry_point(&mut self, program: &[u8]) -> Result<i32> {
        let instance = self.instantiate(program)?;
        let start = instance
            .get_typed_func::<(), ()>(&mut self.store, ENTRY_POINT_NAME)
            .map_err(|_| BridgeError::NoProgramEntryPoint)?;

        info!("Engine readies.");
        let outcome = start.call(&mut self.store, ());

        // Suppress the trap if proc_exit is called.
        if let Some(exit_code) = self.store.data().exit_code() {
            info!("Guest exited with {}", exit_code);
            return Ok(exit_code);
        }
        outcome.map_err(|e| {
            info!("Engine return error: {:?}", e);
            e
        })?;

        info!("Execution returns.");
        Ok(0)
    }
}
