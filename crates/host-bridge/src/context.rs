//! Per-instance state and the context of a single host call
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
    capability::{Capability, CapabilitySet},
    error::{BridgeError, BridgeResult},
    memory::GuestMemory,
    scene::NodeRegistry,
    services::{HostServices, StdHostServices},
    Options,
};
use std::{boxed::Box, sync::Arc};

////////////////////////////////////////////////////////////////////////////////
// Instance state.
////////////////////////////////////////////////////////////////////////////////

/// Everything the host keeps for one guest instance.
pub struct InstanceState {
    /// Arguments, capabilities and tracing for this instance.
    options: Options,
    /// Where output, randomness and time come from.
    services: Box<dyn HostServices + Send>,
    /// The node table; may be shared with other instances.
    nodes: Arc<NodeRegistry>,
    /// The exit code, if program calls proc_exit.
    exit_code: Option<i32>,
}

impl InstanceState {
    pub fn new(
        options: Options,
        services: Box<dyn HostServices + Send>,
        nodes: Arc<NodeRegistry>,
    ) -> Self {
        InstanceState {
            options,
            services,
            nodes,
            exit_code: None,
        }
    }

    /// An instance using `StdHostServices` and a private node table.
    pub fn with_defaults(options: Options) -> Self {
        Self::new(
            options,
            Box::new(StdHostServices),
            Arc::new(NodeRegistry::new()),
        )
    }

    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[inline]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.options.capabilities
    }

    #[inline]
    pub fn program_arguments(&self) -> &[String] {
        &self.options.program_arguments
    }

    /// Whether the named capability is granted.  Unknown names are not.
    #[inline]
    pub fn has_permission(&self, name: &str) -> bool {
        self.options.capabilities.has_permission(name)
    }

    #[inline]
    pub(crate) fn require(&self, capability: Capability) -> BridgeResult<()> {
        self.options.capabilities.require(capability)
    }

    #[inline]
    pub fn services_mut(&mut self) -> &mut (dyn HostServices + Send) {
        &mut *self.services
    }

    #[inline]
    pub fn services(&self) -> &(dyn HostServices + Send) {
        &*self.services
    }

    #[inline]
    pub fn nodes(&self) -> &Arc<NodeRegistry> {
        &self.nodes
    }

    /// The code passed to `proc_exit`, if the guest called it.
    #[inline]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[inline]
    pub(crate) fn set_exit_code(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Call context.
////////////////////////////////////////////////////////////////////////////////

/// What a host call sees: the caller's memory, if it has any, and the
/// instance state.
pub struct CallContext<'a> {
    memory: Option<GuestMemory<'a>>,
    state: &'a mut InstanceState,
}

impl<'a> CallContext<'a> {
    /// A memory of zero bytes counts as no memory.
    pub fn new(memory: Option<&'a mut [u8]>, state: &'a mut InstanceState) -> Self {
        CallContext {
            memory: memory.filter(|bytes| !bytes.is_empty()).map(GuestMemory::new),
            state,
        }
    }

    #[inline]
    pub fn state(&self) -> &InstanceState {
        &*self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut InstanceState {
        &mut *self.state
    }

    /// The caller's memory, or `InvalidMemory` if it has none.
    pub fn memory(&mut self) -> BridgeResult<&mut GuestMemory<'a>> {
        self.memory.as_mut().ok_or(BridgeError::InvalidMemory)
    }

    /// Memory and state at once, for calls that need both.
    pub fn split(&mut self) -> BridgeResult<(&mut GuestMemory<'a>, &mut InstanceState)> {
        let memory = self.memory.as_mut().ok_or(BridgeError::InvalidMemory)?;
        Ok((memory, &mut *self.state))
    }
}
