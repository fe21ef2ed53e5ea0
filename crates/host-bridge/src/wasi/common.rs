//! The WASI calls themselves
//!
//! Each call is implemented twice over: a typed function working on a
//! `MemoryHandler` and the instance state, and a thin raw wrapper that pulls
//! typed arguments out of the engine values.  The raw wrappers are what the
//! export table points at.
//!
//! Validation happens in a fixed order: arity (in `CallSignature::invoke`),
//! then the presence of memory, then the capability.  Every guest span is
//! checked before anything observable happens.
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
    capability::Capability,
    context::{CallContext, InstanceState},
    error::{BridgeError, BridgeResult},
    hcall::CallSignature,
    marshal::{
        arg_i32, arg_i64, arg_u32, EncodedArguments, Pod,
        ValueKind::{I32, I64},
    },
    memory::{IoVec, MemoryHandler},
    strace::{strace_string, BUFFER_DISPLAY_LEN},
};
use log::{info, trace};
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, mem::size_of};
use strum_macros::EnumIter;
use wasmtime::Val;

////////////////////////////////////////////////////////////////////////////////
// Common constants.
////////////////////////////////////////////////////////////////////////////////

/// The descriptor routed to `HostServices::print`.  Every other descriptor is
/// routed to `HostServices::print_error`.
pub const STDOUT_FD: i32 = 1;
/// `clockid::realtime`.  Any other clock id reads the monotonic clock.
pub const CLOCKID_REALTIME: i32 = 0;
/// `clockid::monotonic`.
pub const CLOCKID_MONOTONIC: i32 = 1;

/// List of WASI API.
#[allow(non_camel_case_types)]
#[derive(
    Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive, ToPrimitive, EnumIter, Serialize, Deserialize,
)]
pub enum WasiAPIName {
    ARGS_GET = 1,
    ARGS_SIZES_GET,
    ENVIRON_GET,
    ENVIRON_SIZES_GET,
    CLOCK_TIME_GET,
    FD_WRITE,
    PROC_EXIT,
    RANDOM_GET,
}

impl TryFrom<&str> for WasiAPIName {
    type Error = ();
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let rst = match s {
            "args_get" => WasiAPIName::ARGS_GET,
            "args_sizes_get" => WasiAPIName::ARGS_SIZES_GET,
            "environ_get" => WasiAPIName::ENVIRON_GET,
            "environ_sizes_get" => WasiAPIName::ENVIRON_SIZES_GET,
            "clock_time_get" => WasiAPIName::CLOCK_TIME_GET,
            "fd_write" => WasiAPIName::FD_WRITE,
            "proc_exit" => WasiAPIName::PROC_EXIT,
            "random_get" => WasiAPIName::RANDOM_GET,
            _otherwise => return Err(()),
        };
        Ok(rst)
    }
}

impl WasiAPIName {
    /// The import name of the call.
    pub fn name(self) -> &'static str {
        match self {
            WasiAPIName::ARGS_GET => "args_get",
            WasiAPIName::ARGS_SIZES_GET => "args_sizes_get",
            WasiAPIName::ENVIRON_GET => "environ_get",
            WasiAPIName::ENVIRON_SIZES_GET => "environ_sizes_get",
            WasiAPIName::CLOCK_TIME_GET => "clock_time_get",
            WasiAPIName::FD_WRITE => "fd_write",
            WasiAPIName::PROC_EXIT => "proc_exit",
            WasiAPIName::RANDOM_GET => "random_get",
        }
    }

    /// The declared signature and implementation of the call.
    pub fn signature(self) -> CallSignature {
        match self {
            WasiAPIName::ARGS_GET => CallSignature::new(&[I32, I32], &[I32], wasi_args_get),
            WasiAPIName::ARGS_SIZES_GET => {
                CallSignature::new(&[I32, I32], &[I32], wasi_args_sizes_get)
            }
            WasiAPIName::ENVIRON_GET => CallSignature::new(&[I32, I32], &[I32], wasi_environ_get),
            WasiAPIName::ENVIRON_SIZES_GET => {
                CallSignature::new(&[I32, I32], &[I32], wasi_environ_sizes_get)
            }
            WasiAPIName::CLOCK_TIME_GET => {
                CallSignature::new(&[I32, I64, I32], &[I32], wasi_clock_time_get)
            }
            WasiAPIName::FD_WRITE => {
                CallSignature::new(&[I32, I32, I32, I32], &[I32], wasi_fd_write)
            }
            WasiAPIName::PROC_EXIT => CallSignature::new(&[I32], &[], wasi_proc_exit),
            WasiAPIName::RANDOM_GET => CallSignature::new(&[I32, I32], &[I32], wasi_random_get),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Raw wrappers.
////////////////////////////////////////////////////////////////////////////////

fn wasi_fd_write(context: &mut CallContext<'_>, args: &[Val], _: &mut [Val]) -> BridgeResult<()> {
    let (memory, state) = context.split()?;
    fd_write(
        state,
        memory,
        arg_i32(args, 0)?,
        arg_u32(args, 1)?,
        arg_u32(args, 2)?,
        arg_u32(args, 3)?,
    )
}

fn wasi_proc_exit(context: &mut CallContext<'_>, args: &[Val], _: &mut [Val]) -> BridgeResult<()> {
    proc_exit(context.state_mut(), arg_i32(args, 0)?)
}

fn wasi_args_sizes_get(
    context: &mut CallContext<'_>,
    args: &[Val],
    _: &mut [Val],
) -> BridgeResult<()> {
    let (memory, state) = context.split()?;
    args_sizes_get(state, memory, arg_u32(args, 0)?, arg_u32(args, 1)?)
}

fn wasi_args_get(context: &mut CallContext<'_>, args: &[Val], _: &mut [Val]) -> BridgeResult<()> {
    let (memory, state) = context.split()?;
    args_get(state, memory, arg_u32(args, 0)?, arg_u32(args, 1)?)
}

fn wasi_environ_sizes_get(
    context: &mut CallContext<'_>,
    args: &[Val],
    _: &mut [Val],
) -> BridgeResult<()> {
    let memory = context.memory()?;
    environ_sizes_get(memory, arg_u32(args, 0)?, arg_u32(args, 1)?)
}

/// The environment is always empty, so there is nothing to write.
fn wasi_environ_get(_: &mut CallContext<'_>, _: &[Val], _: &mut [Val]) -> BridgeResult<()> {
    Ok(())
}

fn wasi_random_get(context: &mut CallContext<'_>, args: &[Val], _: &mut [Val]) -> BridgeResult<()> {
    let (memory, state) = context.split()?;
    random_get(state, memory, arg_u32(args, 0)?, arg_u32(args, 1)?)
}

fn wasi_clock_time_get(
    context: &mut CallContext<'_>,
    args: &[Val],
    _: &mut [Val],
) -> BridgeResult<()> {
    let (memory, state) = context.split()?;
    let clock_id = arg_i32(args, 0)?;
    // Precision is accepted and ignored.
    let _precision = arg_i64(args, 1)?;
    clock_time_get(state, memory, clock_id, arg_u32(args, 2)?)
}

////////////////////////////////////////////////////////////////////////////////
// Typed implementations.
////////////////////////////////////////////////////////////////////////////////

/// Gathers the buffers described by `iovec_count` `IoVec`s at `iovec_base`
/// and emits each as one message.  A buffer that is exactly a line feed is
/// counted but not emitted.  The total byte count goes to `address`.
pub(crate) fn fd_write<T: MemoryHandler>(
    state: &mut InstanceState,
    memory_ref: &mut T,
    fd: i32,
    iovec_base: u32,
    iovec_count: u32,
    address: u32,
) -> BridgeResult<()> {
    state.require(Capability::Print)?;

    // Read everything before emitting anything.
    let iovecs = memory_ref.unpack_array::<IoVec>(iovec_base.into(), iovec_count.into())?;
    let bufs = memory_ref.read_iovec_scattered(&iovecs)?;
    memory_ref.check_span(address.into(), size_of::<u32>() as u64)?;

    let strace = state.options().enable_strace;
    let mut size_written: u32 = 0;
    for buf in bufs.iter() {
        size_written = size_written.wrapping_add(buf.len() as u32);
        if strace {
            info!("  fd_write({}) {}", fd, strace_string(buf, BUFFER_DISPLAY_LEN));
        }
        if buf.as_slice() == b"\n" {
            continue;
        }
        let message = String::from_utf8_lossy(buf);
        if fd == STDOUT_FD {
            state.services_mut().print(&message);
        } else {
            state.services_mut().print_error(&message);
        }
    }
    memory_ref.write_u32(address.into(), size_written)
}

/// Records the exit code and stops the guest.
pub(crate) fn proc_exit(state: &mut InstanceState, exit_code: i32) -> BridgeResult<()> {
    state.require(Capability::Exit)?;
    info!("Guest called proc_exit({})", exit_code);
    state.set_exit_code(exit_code);
    Err(BridgeError::Exit(exit_code))
}

/// Writes the number of encoded arguments to `address_for_counts` and their
/// total size to `address_for_buffer_size`.
pub(crate) fn args_sizes_get<T: MemoryHandler>(
    state: &mut InstanceState,
    memory_ref: &mut T,
    address_for_counts: u32,
    address_for_buffer_size: u32,
) -> BridgeResult<()> {
    state.require(Capability::Args)?;
    let encoded = EncodedArguments::encode(state.program_arguments());
    memory_ref.check_span(address_for_counts.into(), u32::SIZE as u64)?;
    memory_ref.check_span(address_for_buffer_size.into(), u32::SIZE as u64)?;

    memory_ref.write_u32(address_for_counts.into(), encoded.count())?;
    memory_ref.write_u32(address_for_buffer_size.into(), encoded.length())
}

/// Writes the encoded arguments to `buf_address` and a pointer to each of
/// them to `address_for_string_ptrs`.  Both regions are checked first.
pub(crate) fn args_get<T: MemoryHandler>(
    state: &mut InstanceState,
    memory_ref: &mut T,
    address_for_string_ptrs: u32,
    buf_address: u32,
) -> BridgeResult<()> {
    state.require(Capability::Args)?;
    let encoded = EncodedArguments::encode(state.program_arguments());
    memory_ref.check_span(
        address_for_string_ptrs.into(),
        u64::from(encoded.count()) * u32::SIZE as u64,
    )?;
    memory_ref.check_span(buf_address.into(), encoded.length().into())?;

    memory_ref.write_string_list(
        encoded.entries(),
        buf_address.into(),
        address_for_string_ptrs.into(),
    )
}

/// The environment is always empty.  Not gated on any capability.
pub(crate) fn environ_sizes_get<T: MemoryHandler>(
    memory_ref: &mut T,
    address_for_counts: u32,
    address_for_buffer_size: u32,
) -> BridgeResult<()> {
    memory_ref.check_span(address_for_counts.into(), u32::SIZE as u64)?;
    memory_ref.check_span(address_for_buffer_size.into(), u32::SIZE as u64)?;
    memory_ref.write_u32(address_for_counts.into(), 0)?;
    memory_ref.write_u32(address_for_buffer_size.into(), 0)
}

/// Fills `length` bytes at `buf_ptr` from the host's random source.
pub(crate) fn random_get<T: MemoryHandler>(
    state: &mut InstanceState,
    memory_ref: &mut T,
    buf_ptr: u32,
    length: u32,
) -> BridgeResult<()> {
    state.require(Capability::Random)?;
    memory_ref.check_span(buf_ptr.into(), length.into())?;
    let mut bytes = vec![0u8; length as usize];
    state.services_mut().random_bytes(&mut bytes)?;
    memory_ref.write_buffer(buf_ptr.into(), &bytes)
}

/// Writes the reading of the clock `clock_id`, in nanoseconds, to `address`.
pub(crate) fn clock_time_get<T: MemoryHandler>(
    state: &mut InstanceState,
    memory_ref: &mut T,
    clock_id: i32,
    address: u32,
) -> BridgeResult<()> {
    state.require(Capability::Time)?;
    let time = if clock_id == CLOCKID_REALTIME {
        state.services().realtime_nanos()
    } else {
        if clock_id != CLOCKID_MONOTONIC {
            trace!("clock_time_get: clock {} read as monotonic", clock_id);
        }
        state.services().monotonic_nanos()
    };
    memory_ref.write_u64(address.into(), time)
}
