//! Host-call signatures and dispatch
//!
//! Every function a guest may import is described by a `CallSignature`: the
//! primitive kinds of its parameters and results, and a plain function
//! pointer implementing it.  `CallSignature::invoke` is the single path all
//! calls take, whatever engine drives the guest:
//!
//! 1. the arity of the arguments and results is checked,
//! 2. result slots are zeroed,
//! 3. the callback runs,
//! 4. on failure the WASI error number is written to the first result slot
//!    and the error is returned, which the engine turns into a trap.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

pub(crate) mod node3d;

use crate::{
    context::CallContext,
    error::{BridgeError, BridgeResult, ErrNo},
    handle::Handle,
    marshal::{arg_u64, ValueKind},
    memory::GuestMemory,
    scene::Node3D,
    strace::Strace,
};
use log::{debug, trace};
use std::fmt;
use wasmtime::{FuncType, Val};

/// The implementation of a host call.
pub type HostCallback = fn(&mut CallContext<'_>, &[Val], &mut [Val]) -> BridgeResult<()>;

/// The declared shape of a host call, together with its implementation.
#[derive(Clone, Copy)]
pub struct CallSignature {
    params: &'static [ValueKind],
    results: &'static [ValueKind],
    callback: HostCallback,
}

impl fmt::Debug for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSignature")
            .field("params", &self.params)
            .field("results", &self.results)
            .finish()
    }
}

impl CallSignature {
    pub const fn new(
        params: &'static [ValueKind],
        results: &'static [ValueKind],
        callback: HostCallback,
    ) -> Self {
        CallSignature {
            params,
            results,
            callback,
        }
    }

    #[inline]
    pub fn params(&self) -> &'static [ValueKind] {
        self.params
    }

    #[inline]
    pub fn results(&self) -> &'static [ValueKind] {
        self.results
    }

    /// The engine-level function type of this call.
    pub fn func_type(&self) -> FuncType {
        FuncType::new(
            self.params.iter().map(|kind| kind.val_type()),
            self.results.iter().map(|kind| kind.val_type()),
        )
    }

    /// Runs the call named `name` for the guest.  An `Err` means the guest
    /// must trap; the status is already in `results[0]` when there is one.
    pub fn invoke(
        &self,
        name: &str,
        context: &mut CallContext<'_>,
        args: &[Val],
        results: &mut [Val],
    ) -> BridgeResult<()> {
        let mut strace = Strace::func(context.state().options().enable_strace, name);
        for arg in args {
            strace.arg_val(arg);
        }

        let outcome = self.dispatch(context, args, results);

        if let Err(e) = &outcome {
            let errno = e.errno();
            if errno != ErrNo::Success {
                if let Some(status) = results.first_mut() {
                    *status = Val::I32(errno.as_status());
                }
            }
            debug!("{} traps: {}", name, e);
        }
        strace.result(&outcome, results);
        outcome
    }

    fn dispatch(
        &self,
        context: &mut CallContext<'_>,
        args: &[Val],
        results: &mut [Val],
    ) -> BridgeResult<()> {
        if args.len() != self.params.len() || results.len() != self.results.len() {
            return Err(BridgeError::InvalidArgument);
        }
        for (slot, kind) in results.iter_mut().zip(self.results) {
            *slot = kind.zero();
        }
        (self.callback)(context, args, results)
    }
}

/// Runs `operation` on the node whose handle is argument 0.
///
/// The caller must have memory even when the operation does not touch it.  A
/// null or stale handle makes the call a successful no-op, leaving the zeroed
/// results in place.
pub(crate) fn node_call<F>(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
    operation: F,
) -> BridgeResult<()>
where
    F: FnOnce(&mut dyn Node3D, &mut GuestMemory<'_>, &[Val], &mut [Val]) -> BridgeResult<()>,
{
    let (memory, state) = context.split()?;
    let handle = Handle::from_raw(arg_u64(args, 0)?);
    let node = match state.nodes().resolve(handle) {
        Some(node) => node,
        None => {
            trace!("No live node for {:?}", handle);
            return Ok(());
        }
    };
    let mut node = node.lock()?;
    operation(&mut *node, memory, args, results)
}
