//! The spatial-node object model exposed to guests
//!
//! `Node3D` is the host-side interface behind every `node3D_*` host call.  An
//! embedder implements it for its own scene objects (or uses `SpatialNode`)
//! and registers them in a `NodeRegistry`; guests then address them by handle.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

pub mod math;
mod node;

pub use self::node::SpatialNode;

use self::math::{Basis, Quaternion, Transform3D, Vector3};
use crate::handle::{Handle, HandleRegistry};
use log::warn;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A registered node, shared between the registry and any child that links
/// to it.
pub type SharedNode = Arc<Mutex<dyn Node3D + Send>>;

/// The table guests address nodes through.
pub type NodeRegistry = HandleRegistry<Mutex<dyn Node3D + Send>>;

/// Wraps `node` for sharing and registers it, returning its handle together
/// with the shared reference (needed to parent other nodes to it).
pub fn register_node<N>(registry: &NodeRegistry, node: N) -> (Handle, SharedNode)
where
    N: Node3D + Send + 'static,
{
    let shared: SharedNode = Arc::new(Mutex::new(node));
    (registry.insert(Arc::clone(&shared)), shared)
}

////////////////////////////////////////////////////////////////////////////////
// Enumerations.
////////////////////////////////////////////////////////////////////////////////

/// The order in which per-axis rotations are composed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
pub enum EulerOrder {
    XYZ = 0,
    XZY = 1,
    YXZ = 2,
    YZX = 3,
    ZXY = 4,
    ZYX = 5,
}

impl Default for EulerOrder {
    fn default() -> Self {
        EulerOrder::YXZ
    }
}

impl EulerOrder {
    /// Axis indices (0 = X, 1 = Y, 2 = Z) from outermost to innermost.
    pub fn axes(self) -> (usize, usize, usize) {
        match self {
            EulerOrder::XYZ => (0, 1, 2),
            EulerOrder::XZY => (0, 2, 1),
            EulerOrder::YXZ => (1, 0, 2),
            EulerOrder::YZX => (1, 2, 0),
            EulerOrder::ZXY => (2, 0, 1),
            EulerOrder::ZYX => (2, 1, 0),
        }
    }
}

/// Which representation of rotation an editor presents.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
pub enum RotationEditMode {
    Euler = 0,
    Quaternion = 1,
    Basis = 2,
}

impl Default for RotationEditMode {
    fn default() -> Self {
        RotationEditMode::Euler
    }
}

////////////////////////////////////////////////////////////////////////////////
// The node interface.
////////////////////////////////////////////////////////////////////////////////

/// A node with a position, rotation and scale in 3D space.
///
/// Angles are radians unless the method name says degrees.  The provided
/// methods are expressed through the required ones and rarely need
/// overriding.
pub trait Node3D {
    fn set_transform(&mut self, local: Transform3D);
    fn get_transform(&self) -> Transform3D;
    fn set_position(&mut self, position: Vector3);
    fn get_position(&self) -> Vector3;
    fn set_rotation(&mut self, euler: Vector3);
    fn get_rotation(&self) -> Vector3;
    fn set_rotation_order(&mut self, order: EulerOrder);
    fn get_rotation_order(&self) -> EulerOrder;
    fn set_rotation_edit_mode(&mut self, mode: RotationEditMode);
    fn get_rotation_edit_mode(&self) -> RotationEditMode;
    fn set_scale(&mut self, scale: Vector3);
    fn get_scale(&self) -> Vector3;
    fn set_quaternion(&mut self, quaternion: Quaternion);
    fn get_quaternion(&self) -> Quaternion;
    fn set_basis(&mut self, basis: Basis);
    fn get_basis(&self) -> Basis;
    fn set_global_transform(&mut self, global: Transform3D);
    fn get_global_transform(&self) -> Transform3D;

    /// The handle of the spatial parent, if it is registered and alive.
    fn get_parent_node_3d(&self) -> Option<Handle>;

    fn set_ignore_transform_notification(&mut self, enabled: bool);
    fn set_as_top_level(&mut self, enable: bool);
    fn is_set_as_top_level(&self) -> bool;
    fn set_disable_scale(&mut self, disable: bool);
    fn is_scale_disabled(&self) -> bool;
    fn force_update_transform(&mut self);
    fn update_gizmos(&mut self);
    fn clear_gizmos(&mut self);
    fn clear_subgizmo_selection(&mut self);
    fn set_visible(&mut self, visible: bool);
    fn is_visible(&self) -> bool;
    fn is_visible_in_tree(&self) -> bool;
    fn set_notify_local_transform(&mut self, enable: bool);
    fn is_local_transform_notification_enabled(&self) -> bool;
    fn set_notify_transform(&mut self, enable: bool);
    fn is_transform_notification_enabled(&self) -> bool;

    fn set_rotation_degrees(&mut self, euler_degrees: Vector3) {
        self.set_rotation(euler_degrees.to_radians());
    }

    fn get_rotation_degrees(&self) -> Vector3 {
        self.get_rotation().to_degrees()
    }

    fn set_global_position(&mut self, position: Vector3) {
        let mut global = self.get_global_transform();
        global.origin = position;
        self.set_global_transform(global);
    }

    fn get_global_position(&self) -> Vector3 {
        self.get_global_transform().origin
    }

    /// Replaces the global rotation, keeping global scale and position.
    fn set_global_rotation(&mut self, euler: Vector3) {
        let mut global = self.get_global_transform();
        let scale = global.basis.get_scale();
        global.basis = Basis::from_euler(euler, self.get_rotation_order()).scaled_local(scale);
        self.set_global_transform(global);
    }

    fn get_global_rotation(&self) -> Vector3 {
        self.get_global_transform()
            .basis
            .orthonormalized()
            .get_euler(self.get_rotation_order())
    }

    fn set_global_rotation_degrees(&mut self, euler_degrees: Vector3) {
        self.set_global_rotation(euler_degrees.to_radians());
    }

    fn get_global_rotation_degrees(&self) -> Vector3 {
        self.get_global_rotation().to_degrees()
    }

    fn show(&mut self) {
        self.set_visible(true);
    }

    fn hide(&mut self) {
        self.set_visible(false);
    }

    /// Rotates the local transform around `axis` in the parent frame.  A zero
    /// axis leaves the node unchanged.
    fn rotate(&mut self, axis: Vector3, angle: f64) {
        if let Some(axis) = axis.try_normalized() {
            let mut local = self.get_transform();
            local.basis = local.basis.rotated(axis, angle);
            self.set_transform(local);
        }
    }

    /// Rotates the global transform around `axis` in world space.
    fn global_rotate(&mut self, axis: Vector3, angle: f64) {
        if let Some(axis) = axis.try_normalized() {
            let mut global = self.get_global_transform();
            global.basis = global.basis.rotated(axis, angle);
            self.set_global_transform(global);
        }
    }

    /// Rotates around `axis` expressed in the node's own frame.
    fn rotate_object_local(&mut self, axis: Vector3, angle: f64) {
        if let Some(axis) = axis.try_normalized() {
            let mut local = self.get_transform();
            local.basis = local.basis.rotated_local(axis, angle);
            self.set_transform(local);
        }
    }

    fn rotate_x(&mut self, angle: f64) {
        self.rotate(Vector3::RIGHT, angle);
    }

    fn rotate_y(&mut self, angle: f64) {
        self.rotate(Vector3::UP, angle);
    }

    fn rotate_z(&mut self, angle: f64) {
        self.rotate(Vector3::BACK, angle);
    }

    fn global_scale(&mut self, scale: Vector3) {
        let mut global = self.get_global_transform();
        global.basis = global.basis.scaled(scale);
        self.set_global_transform(global);
    }

    fn scale_object_local(&mut self, scale: Vector3) {
        let mut local = self.get_transform();
        local.basis = local.basis.scaled_local(scale);
        self.set_transform(local);
    }

    fn global_translate(&mut self, offset: Vector3) {
        let mut global = self.get_global_transform();
        global.origin += offset;
        self.set_global_transform(global);
    }

    /// Moves the node by `offset` expressed in its own frame.
    fn translate_object_local(&mut self, offset: Vector3) {
        let mut local = self.get_transform();
        local.origin += local.basis.xform(offset);
        self.set_transform(local);
    }

    /// Same as `translate_object_local`.
    fn translate(&mut self, offset: Vector3) {
        self.translate_object_local(offset);
    }

    /// Removes scale and shear from the local basis.
    fn orthonormalize(&mut self) {
        let mut local = self.get_transform();
        local.basis = local.basis.orthonormalized();
        self.set_transform(local);
    }

    fn set_identity(&mut self) {
        self.set_transform(Transform3D::IDENTITY);
    }

    /// Turns the node so that its forward axis points at the global `target`.
    fn look_at(&mut self, target: Vector3, up: Vector3, use_model_front: bool) {
        let position = self.get_global_position();
        self.look_at_from_position(position, target, up, use_model_front);
    }

    /// Moves the node to the global `position` and turns it towards `target`.
    /// Degenerate configurations (target at the position, or `up` parallel to
    /// the view direction) are ignored with a warning.
    fn look_at_from_position(
        &mut self,
        position: Vector3,
        target: Vector3,
        up: Vector3,
        use_model_front: bool,
    ) {
        let basis = match Basis::looking_at(target - position, up, use_model_front) {
            Some(basis) => basis,
            None => {
                warn!("look_at: degenerate target {:?} from {:?}", target, position);
                return;
            }
        };
        let mut global = self.get_global_transform();
        let scale = global.basis.get_scale();
        global.basis = basis.scaled_local(scale);
        global.origin = position;
        self.set_global_transform(global);
    }

    /// Converts a global point into the node's local frame.  A node with a
    /// singular global basis returns the point unchanged.
    fn to_local(&self, global_point: Vector3) -> Vector3 {
        match self.get_global_transform().affine_inverse() {
            Some(inverse) => inverse.xform(global_point),
            None => global_point,
        }
    }

    fn to_global(&self, local_point: Vector3) -> Vector3 {
        self.get_global_transform().xform(local_point)
    }
}
