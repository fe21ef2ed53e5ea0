//! Host services reached from guest calls
//!
//! The WASI calls never talk to the operating system directly: output,
//! randomness and clocks go through `HostServices`, so that an embedder can
//! route them into its own logging or supply deterministic sources.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use crate::error::{BridgeError, BridgeResult};
use lazy_static::lazy_static;
use log::{error, info};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// The services a guest call may use.
pub trait HostServices {
    /// Emits a message written to standard output.
    fn print(&mut self, message: &str);
    /// Emits a message written to any other descriptor.
    fn print_error(&mut self, message: &str);
    /// Fills `buffer` with random bytes.
    fn random_bytes(&mut self, buffer: &mut [u8]) -> BridgeResult<()>;
    /// Nanoseconds since the Unix epoch.
    fn realtime_nanos(&self) -> u64;
    /// Nanoseconds on a non-decreasing clock with an arbitrary origin.
    fn monotonic_nanos(&self) -> u64;
}

lazy_static! {
    // Origin of the monotonic clock, fixed on first use.
    static ref MONOTONIC_ORIGIN: Instant = Instant::now();
}

/// Services backed by the standard library, the `log` facade and the
/// operating system's random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdHostServices;

impl HostServices for StdHostServices {
    fn print(&mut self, message: &str) {
        info!("{}", message);
    }

    fn print_error(&mut self, message: &str) {
        error!("{}", message);
    }

    /// Fills a buffer, `buffer`, with random bytes sampled from the random
    /// number source provided by the host operating system, as provided by
    /// `getrandom`.
    fn random_bytes(&mut self, buffer: &mut [u8]) -> BridgeResult<()> {
        getrandom::getrandom(buffer).map_err(|e| {
            error!("getrandom failed: {}", e);
            BridgeError::RandomnessUnavailable
        })
    }

    fn realtime_nanos(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0)
    }

    fn monotonic_nanos(&self) -> u64 {
        MONOTONIC_ORIGIN.elapsed().as_nanos() as u64
    }
}
