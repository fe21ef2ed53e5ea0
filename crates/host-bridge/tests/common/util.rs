//! Shared helpers for the integration tests
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

#![allow(dead_code)]

use host_bridge::{
    context::InstanceState,
    engines::wasmtime::WasmtimeRuntimeState,
    scene::NodeRegistry,
    services::HostServices,
    BridgeError, BridgeResult, Options,
};
use std::sync::{Arc, Mutex};
use wasmtime::Instance;

/// Fixed reading of the realtime clock.
pub const REALTIME_NANOS: u64 = 1_600_000_000_123_456_789;
/// Fixed reading of the monotonic clock.
pub const MONOTONIC_NANOS: u64 = 987_654_321;

pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Everything the guest printed.
#[derive(Default, Debug)]
pub struct Transcript {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Host services with deterministic clocks and randomness, recording output
/// into a transcript the test keeps a handle on.
pub struct RecordingServices {
    transcript: Arc<Mutex<Transcript>>,
}

impl RecordingServices {
    pub fn new() -> (Self, Arc<Mutex<Transcript>>) {
        let transcript = Arc::new(Mutex::new(Transcript::default()));
        (
            Self {
                transcript: Arc::clone(&transcript),
            },
            transcript,
        )
    }
}

impl HostServices for RecordingServices {
    fn print(&mut self, message: &str) {
        self.transcript.lock().unwrap().stdout.push(message.to_string());
    }

    fn print_error(&mut self, message: &str) {
        self.transcript.lock().unwrap().stderr.push(message.to_string());
    }

    fn random_bytes(&mut self, buffer: &mut [u8]) -> BridgeResult<()> {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(7).wrapping_add(1);
        }
        Ok(())
    }

    fn realtime_nanos(&self) -> u64 {
        REALTIME_NANOS
    }

    fn monotonic_nanos(&self) -> u64 {
        MONOTONIC_NANOS
    }
}

/// Parses options, panicking on malformed test input.
pub fn options(json: &str) -> Options {
    Options::from_json(json).unwrap()
}

/// An instantiated guest whose exports the test drives directly, so that it
/// can inspect guest memory between calls.
pub struct Guest {
    pub runtime: WasmtimeRuntimeState,
    pub instance: Instance,
}

impl Guest {
    pub fn new(wat: &str, options: Options, nodes: Arc<NodeRegistry>) -> (Self, Arc<Mutex<Transcript>>) {
        let (services, transcript) = RecordingServices::new();
        let state = InstanceState::new(options, Box::new(services), nodes);
        let mut runtime = WasmtimeRuntimeState::new(state).unwrap();
        let instance = runtime.instantiate(wat.as_bytes()).unwrap();
        (Guest { runtime, instance }, transcript)
    }

    /// Calls the export `name`, which takes and returns nothing.
    pub fn call(&mut self, name: &str) -> anyhow::Result<()> {
        let store = self.runtime.store_mut();
        let func = self.instance.get_typed_func::<(), ()>(&mut *store, name)?;
        func.call(&mut *store, ())
    }

    /// Calls the export `name`, which takes one `i64`, typically a handle.
    pub fn call_with(&mut self, name: &str, argument: i64) -> anyhow::Result<()> {
        let store = self.runtime.store_mut();
        let func = self.instance.get_typed_func::<i64, ()>(&mut *store, name)?;
        func.call(&mut *store, argument)
    }

    pub fn read_memory(&mut self, offset: usize, length: usize) -> Vec<u8> {
        let store = self.runtime.store_mut();
        let memory = self.instance.get_memory(&mut *store, "memory").unwrap();
        memory.data(&*store)[offset..offset + length].to_vec()
    }

    pub fn read_u32(&mut self, offset: usize) -> u32 {
        let bytes = self.read_memory(offset, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn read_u64(&mut self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.read_memory(offset, 8));
        u64::from_le_bytes(raw)
    }

    pub fn read_f32s(&mut self, offset: usize, count: usize) -> Vec<f32> {
        self.read_memory(offset, count * 4)
            .chunks(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Finds the bridge error carried by a trap, wherever it sits in the chain.
pub fn bridge_error(error: &anyhow::Error) -> Option<&BridgeError> {
    error
        .downcast_ref::<BridgeError>()
        .or_else(|| error.chain().find_map(|cause| cause.downcast_ref::<BridgeError>()))
}
