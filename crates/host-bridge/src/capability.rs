//! Capabilities a guest instance may be granted
//!
//! The WASI calls that reach outside of the guest are gated on a named
//! capability.  An instance holds a `CapabilitySet`; a call whose capability
//! is missing fails with `PermissionDenied` before it touches guest memory or
//! host services.
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
use log::warn;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, iter::FromIterator, str::FromStr};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// A named permission.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Writing to the standard streams (`fd_write`).
    Print,
    /// Terminating the guest (`proc_exit`).
    Exit,
    /// Reading the program arguments (`args_sizes_get`, `args_get`).
    Args,
    /// Reading host randomness (`random_get`).
    Random,
    /// Reading the clocks (`clock_time_get`).
    Time,
}

/// The capabilities granted to one instance.  Empty by default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new<I: IntoIterator<Item = Capability>>(capabilities: I) -> Self {
        CapabilitySet(capabilities.into_iter().collect())
    }

    /// Every capability.
    pub fn all() -> Self {
        Capability::iter().collect()
    }

    #[inline]
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Looks a capability up by name.  Unknown names are never granted.
    pub fn has_permission(&self, name: &str) -> bool {
        Capability::from_str(name)
            .map(|capability| self.contains(capability))
            .unwrap_or(false)
    }

    pub fn grant(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn revoke(&mut self, capability: Capability) {
        self.0.remove(&capability);
    }

    /// Fails with `PermissionDenied` unless `capability` is granted.
    pub fn require(&self, capability: Capability) -> BridgeResult<()> {
        if self.contains(capability) {
            Ok(())
        } else {
            warn!("Capability '{}' is not granted", capability);
            Err(BridgeError::PermissionDenied)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        CapabilitySet::new(iter)
    }
}
