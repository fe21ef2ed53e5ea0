//! A self-contained `Node3D` implementation
//!
//! `SpatialNode` keeps its local transform as the source of truth and caches
//! the rotation and scale it was last given, so that reading back a value
//! that was just written returns it unchanged instead of a value
//! re-derived from the matrix.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use super::{
    math::{Basis, Quaternion, Transform3D, Vector3},
    EulerOrder, Node3D, RotationEditMode, SharedNode,
};
use crate::handle::Handle;
use log::{trace, warn};
use std::{
    mem,
    sync::{Arc, Mutex, PoisonError, Weak},
};

/// Link to a spatial parent.  The parent is held weakly: removing it from the
/// registry and dropping it detaches the child.
struct ParentLink {
    handle: Handle,
    node: Weak<Mutex<dyn Node3D + Send>>,
}

impl ParentLink {
    fn upgrade(&self) -> Option<SharedNode> {
        self.node.upgrade()
    }
}

/// Counters for editor-facing requests this node has received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GizmoRequests {
    pub updates: u64,
    pub clears: u64,
    pub subgizmo_clears: u64,
}

/// A plain spatial node.
pub struct SpatialNode {
    local: Transform3D,
    euler: Option<Vector3>,
    /// The rotation as last written in degrees.  Only valid alongside `euler`.
    euler_degrees: Option<Vector3>,
    quaternion: Option<Quaternion>,
    scale: Option<Vector3>,
    rotation_order: EulerOrder,
    rotation_edit_mode: RotationEditMode,
    parent: Option<ParentLink>,
    top_level: bool,
    disable_scale: bool,
    visible: bool,
    ignore_transform_notification: bool,
    notify_local_transform: bool,
    notify_transform: bool,
    gizmos: GizmoRequests,
    forced_updates: u64,
}

impl Default for SpatialNode {
    fn default() -> Self {
        SpatialNode {
            local: Transform3D::IDENTITY,
            euler: None,
            euler_degrees: None,
            quaternion: None,
            scale: None,
            rotation_order: EulerOrder::default(),
            rotation_edit_mode: RotationEditMode::default(),
            parent: None,
            top_level: false,
            disable_scale: false,
            visible: true,
            ignore_transform_notification: false,
            notify_local_transform: false,
            notify_transform: false,
            gizmos: GizmoRequests::default(),
            forced_updates: 0,
        }
    }
}

impl SpatialNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// A node at the local `transform`.
    pub fn with_transform(transform: Transform3D) -> Self {
        let mut node = Self::default();
        node.local = transform;
        node
    }

    /// Parents this node to the registered node `parent`, known to guests as
    /// `handle`.
    ///
    /// Parent chains must be acyclic: a global transform locks every ancestor
    /// in turn, so a cycle deadlocks.  Parenting a node to itself is refused.
    pub fn set_parent(&mut self, handle: Handle, parent: &SharedNode) {
        if self.is_stored_in(parent) {
            warn!("set_parent: {:?} is this node, ignored", handle);
            return;
        }
        self.parent = Some(ParentLink {
            handle,
            node: Arc::downgrade(parent),
        });
    }

    pub fn clear_parent(&mut self) {
        self.parent = None;
    }

    pub fn gizmo_requests(&self) -> GizmoRequests {
        self.gizmos
    }

    /// How many times `force_update_transform` was called.
    pub fn forced_updates(&self) -> u64 {
        self.forced_updates
    }

    pub fn is_transform_notification_ignored(&self) -> bool {
        self.ignore_transform_notification
    }

    /// Whether `shared` is the allocation holding this node.
    fn is_stored_in(&self, shared: &SharedNode) -> bool {
        let start = Arc::as_ptr(shared) as *const u8 as usize;
        let end = start + mem::size_of_val(&**shared);
        (start..end).contains(&(self as *const SpatialNode as usize))
    }

    /// The global transform of the parent, unless this node is top level or
    /// has no live parent.
    fn parent_global_transform(&self) -> Option<Transform3D> {
        if self.top_level {
            return None;
        }
        let parent = self.parent.as_ref()?.upgrade()?;
        let parent = parent.lock().unwrap_or_else(PoisonError::into_inner);
        Some(parent.get_global_transform())
    }

    fn invalidate_caches(&mut self) {
        self.euler = None;
        self.euler_degrees = None;
        self.quaternion = None;
        self.scale = None;
    }

    fn compose(&mut self, rotation: Basis, scale: Vector3) {
        self.local.basis = rotation.scaled_local(scale);
        self.scale = Some(scale);
    }
}

impl Node3D for SpatialNode {
    fn set_transform(&mut self, local: Transform3D) {
        self.local = local;
        self.invalidate_caches();
    }

    fn get_transform(&self) -> Transform3D {
        self.local
    }

    fn set_position(&mut self, position: Vector3) {
        self.local.origin = position;
    }

    fn get_position(&self) -> Vector3 {
        self.local.origin
    }

    fn set_rotation(&mut self, euler: Vector3) {
        let scale = self.get_scale();
        self.compose(Basis::from_euler(euler, self.rotation_order), scale);
        self.euler = Some(euler);
        self.euler_degrees = None;
        self.quaternion = None;
    }

    fn get_rotation(&self) -> Vector3 {
        self.euler.unwrap_or_else(|| {
            self.local
                .basis
                .orthonormalized()
                .get_euler(self.rotation_order)
        })
    }

    fn set_rotation_degrees(&mut self, euler_degrees: Vector3) {
        self.set_rotation(euler_degrees.to_radians());
        self.euler_degrees = Some(euler_degrees);
    }

    fn get_rotation_degrees(&self) -> Vector3 {
        self.euler_degrees
            .unwrap_or_else(|| self.get_rotation().to_degrees())
    }

    /// Changing the order keeps the transform and re-expresses the rotation.
    fn set_rotation_order(&mut self, order: EulerOrder) {
        if order != self.rotation_order {
            self.rotation_order = order;
            self.euler = None;
            self.euler_degrees = None;
        }
    }

    fn get_rotation_order(&self) -> EulerOrder {
        self.rotation_order
    }

    fn set_rotation_edit_mode(&mut self, mode: RotationEditMode) {
        self.rotation_edit_mode = mode;
    }

    fn get_rotation_edit_mode(&self) -> RotationEditMode {
        self.rotation_edit_mode
    }

    fn set_scale(&mut self, scale: Vector3) {
        if self.rotation_edit_mode == RotationEditMode::Quaternion {
            let quaternion = self.get_quaternion();
            self.compose(Basis::from_quaternion(quaternion), scale);
            self.quaternion = Some(quaternion);
            self.euler = None;
            self.euler_degrees = None;
        } else {
            let euler = self.get_rotation();
            self.compose(Basis::from_euler(euler, self.rotation_order), scale);
            self.euler = Some(euler);
            self.quaternion = None;
        }
    }

    fn get_scale(&self) -> Vector3 {
        self.scale.unwrap_or_else(|| self.local.basis.get_scale())
    }

    fn set_quaternion(&mut self, quaternion: Quaternion) {
        let scale = self.get_scale();
        self.compose(Basis::from_quaternion(quaternion), scale);
        self.quaternion = Some(quaternion);
        self.euler = None;
        self.euler_degrees = None;
    }

    fn get_quaternion(&self) -> Quaternion {
        self.quaternion
            .unwrap_or_else(|| self.local.basis.orthonormalized().get_quaternion())
    }

    fn set_basis(&mut self, basis: Basis) {
        self.local.basis = basis;
        self.invalidate_caches();
    }

    fn get_basis(&self) -> Basis {
        self.local.basis
    }

    fn set_global_transform(&mut self, global: Transform3D) {
        let local = match self.parent_global_transform() {
            Some(parent) => match parent.affine_inverse() {
                Some(inverse) => inverse * global,
                None => {
                    trace!("set_global_transform: singular parent, storing as local");
                    global
                }
            },
            None => global,
        };
        self.set_transform(local);
    }

    fn get_global_transform(&self) -> Transform3D {
        let mut global = match self.parent_global_transform() {
            Some(parent) => parent * self.local,
            None => self.local,
        };
        if self.disable_scale {
            global.basis = global.basis.orthonormalized();
        }
        global
    }

    fn get_parent_node_3d(&self) -> Option<Handle> {
        let link = self.parent.as_ref()?;
        link.upgrade().map(|_| link.handle)
    }

    fn set_ignore_transform_notification(&mut self, enabled: bool) {
        self.ignore_transform_notification = enabled;
    }

    fn set_as_top_level(&mut self, enable: bool) {
        if enable == self.top_level {
            return;
        }
        // Keep the node where it is in world space.
        let global = self.get_global_transform();
        self.top_level = enable;
        self.set_global_transform(global);
    }

    fn is_set_as_top_level(&self) -> bool {
        self.top_level
    }

    fn set_disable_scale(&mut self, disable: bool) {
        self.disable_scale = disable;
    }

    fn is_scale_disabled(&self) -> bool {
        self.disable_scale
    }

    fn force_update_transform(&mut self) {
        self.forced_updates += 1;
    }

    fn update_gizmos(&mut self) {
        self.gizmos.updates += 1;
    }

    fn clear_gizmos(&mut self) {
        self.gizmos.clears += 1;
    }

    fn clear_subgizmo_selection(&mut self) {
        self.gizmos.subgizmo_clears += 1;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn is_visible_in_tree(&self) -> bool {
        if !self.visible {
            return false;
        }
        match self.parent.as_ref().and_then(ParentLink::upgrade) {
            Some(parent) => parent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_visible_in_tree(),
            None => true,
        }
    }

    fn set_notify_local_transform(&mut self, enable: bool) {
        self.notify_local_transform = enable;
    }

    fn is_local_transform_notification_enabled(&self) -> bool {
        self.notify_local_transform
    }

    fn set_notify_transform(&mut self, enable: bool) {
        self.notify_transform = enable;
    }

    fn is_transform_notification_enabled(&self) -> bool {
        self.notify_transform
    }
}
