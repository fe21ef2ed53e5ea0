//! The `node3D_*` host calls
//!
//! Argument 0 of every call is a node handle.  Composite values travel through
//! guest memory: a setter reads the value at the offset in argument 1, a getter
//! writes it there.  Booleans and enumerations arrive as `I64` and are returned
//! as `I32`; angles are `F64`.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use super::{node_call, CallSignature};
use crate::{
    context::CallContext,
    error::{BridgeError, BridgeResult},
    handle::Handle,
    marshal::{
        arg_f64, arg_flag, arg_i64, arg_u64, put_result,
        ValueKind::{F64, I32, I64},
    },
    memory::MemoryHandler,
    scene::{
        math::{Basis, Quaternion, Transform3D, Vector3},
        EulerOrder, Node3D, RotationEditMode,
    },
};
use num_traits::{FromPrimitive, ToPrimitive};
use std::vec::Vec;
use wasmtime::Val;

/// Prefix of every node call's import name.
pub const NODE3D_PREFIX: &str = "node3D_";

/// A macro generating the table entry for one node call: its import name
/// (without the module) and its signature.  The implementation is a nested
/// `fn` so that it coerces to a `HostCallback`.
macro_rules! node_export {
    // A composite value read from guest memory and passed to the node.
    (set $method:ident : $t:ty) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, memory, args, _| {
                let value: $t = memory.read(arg_u64(args, 1)?)?;
                node.$method(value);
                Ok(())
            })
        }
        (stringify!($method), CallSignature::new(&[I64, I64], &[], callback))
    }};
    // A composite value read from the node and written to guest memory.
    (get $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, memory, args, _| {
                let value = node.$method();
                memory.write(arg_u64(args, 1)?, &value)
            })
        }
        (stringify!($method), CallSignature::new(&[I64, I64], &[], callback))
    }};
    (set_flag $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, _, args, _| {
                node.$method(arg_flag(args, 1)?);
                Ok(())
            })
        }
        (stringify!($method), CallSignature::new(&[I64, I64], &[], callback))
    }};
    (get_flag $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, _, _, results| {
                put_result(results, 0, Val::I32(node.$method() as i32))
            })
        }
        (stringify!($method), CallSignature::new(&[I64], &[I32], callback))
    }};
    // No arguments beyond the handle.
    (action $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, _, _, _| {
                node.$method();
                Ok(())
            })
        }
        (stringify!($method), CallSignature::new(&[I64], &[], callback))
    }};
    // An axis read from guest memory and an angle.
    (axis_angle $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, memory, args, _| {
                let axis: Vector3 = memory.read(arg_u64(args, 1)?)?;
                node.$method(axis, arg_f64(args, 2)?);
                Ok(())
            })
        }
        (stringify!($method), CallSignature::new(&[I64, I64, F64], &[], callback))
    }};
    (angle $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, _, args, _| {
                node.$method(arg_f64(args, 1)?);
                Ok(())
            })
        }
        (stringify!($method), CallSignature::new(&[I64, F64], &[], callback))
    }};
    // A point read from argument 1, converted, and written to argument 2.
    (point $method:ident) => {{
        fn callback(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
            node_call(context, args, results, |node, memory, args, _| {
                let point: Vector3 = memory.read(arg_u64(args, 1)?)?;
                let converted = node.$method(point);
                memory.write(arg_u64(args, 2)?, &converted)
            })
        }
        (stringify!($method), CallSignature::new(&[I64, I64, I64], &[], callback))
    }};
    // Hand-written implementation.
    (custom $method:ident ($($param:ident),*) -> ($($result:ident),*) = $callback:path) => {
        (
            stringify!($method),
            CallSignature::new(&[$($param),*], &[$($result),*], $callback),
        )
    };
}

/// Every node call, keyed by its name without `NODE3D_PREFIX`.
pub(crate) fn exports() -> Vec<(&'static str, CallSignature)> {
    vec![
        node_export!(set set_transform: Transform3D),
        node_export!(get get_transform),
        node_export!(set set_position: Vector3),
        node_export!(get get_position),
        node_export!(set set_rotation: Vector3),
        node_export!(get get_rotation),
        node_export!(set set_rotation_degrees: Vector3),
        node_export!(get get_rotation_degrees),
        node_export!(custom set_rotation_order(I64, I64) -> () = set_rotation_order),
        node_export!(custom get_rotation_order(I64) -> (I32) = get_rotation_order),
        node_export!(custom set_rotation_edit_mode(I64, I64) -> () = set_rotation_edit_mode),
        node_export!(custom get_rotation_edit_mode(I64) -> (I32) = get_rotation_edit_mode),
        node_export!(set set_scale: Vector3),
        node_export!(get get_scale),
        node_export!(set set_quaternion: Quaternion),
        node_export!(get get_quaternion),
        node_export!(set set_basis: Basis),
        node_export!(get get_basis),
        node_export!(set set_global_transform: Transform3D),
        node_export!(get get_global_transform),
        node_export!(set set_global_position: Vector3),
        node_export!(get get_global_position),
        node_export!(set set_global_rotation: Vector3),
        node_export!(get get_global_rotation),
        node_export!(set set_global_rotation_degrees: Vector3),
        node_export!(get get_global_rotation_degrees),
        node_export!(custom get_parent_node_3d(I64) -> (I64) = get_parent_node_3d),
        node_export!(set_flag set_ignore_transform_notification),
        node_export!(set_flag set_as_top_level),
        node_export!(get_flag is_set_as_top_level),
        node_export!(set_flag set_disable_scale),
        node_export!(get_flag is_scale_disabled),
        node_export!(action force_update_transform),
        node_export!(action update_gizmos),
        node_export!(action clear_gizmos),
        node_export!(action clear_subgizmo_selection),
        node_export!(set_flag set_visible),
        node_export!(get_flag is_visible),
        node_export!(get_flag is_visible_in_tree),
        node_export!(action show),
        node_export!(action hide),
        node_export!(set_flag set_notify_local_transform),
        node_export!(get_flag is_local_transform_notification_enabled),
        node_export!(set_flag set_notify_transform),
        node_export!(get_flag is_transform_notification_enabled),
        node_export!(axis_angle rotate),
        node_export!(axis_angle global_rotate),
        node_export!(set global_scale: Vector3),
        node_export!(set global_translate: Vector3),
        node_export!(axis_angle rotate_object_local),
        node_export!(set scale_object_local: Vector3),
        node_export!(set translate_object_local: Vector3),
        node_export!(angle rotate_x),
        node_export!(angle rotate_y),
        node_export!(angle rotate_z),
        node_export!(set translate: Vector3),
        node_export!(action orthonormalize),
        node_export!(action set_identity),
        node_export!(custom look_at(I64, I64, I64, I64) -> () = look_at),
        node_export!(
            custom look_at_from_position(I64, I64, I64, I64, I64) -> () = look_at_from_position
        ),
        node_export!(point to_local),
        node_export!(point to_global),
    ]
}

////////////////////////////////////////////////////////////////////////////////
// Hand-written calls.
////////////////////////////////////////////////////////////////////////////////

fn decode_enum<T: FromPrimitive>(args: &[Val], index: usize) -> BridgeResult<T> {
    T::from_i64(arg_i64(args, index)?).ok_or(BridgeError::InvalidArgument)
}

fn encode_enum<T: ToPrimitive>(value: T) -> BridgeResult<Val> {
    value
        .to_i32()
        .map(Val::I32)
        .ok_or(BridgeError::InvalidArgument)
}

fn set_rotation_order(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, _, args, _| {
        node.set_rotation_order(decode_enum::<EulerOrder>(args, 1)?);
        Ok(())
    })
}

fn get_rotation_order(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, _, _, results| {
        put_result(results, 0, encode_enum(node.get_rotation_order())?)
    })
}

fn set_rotation_edit_mode(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, _, args, _| {
        node.set_rotation_edit_mode(decode_enum::<RotationEditMode>(args, 1)?);
        Ok(())
    })
}

fn get_rotation_edit_mode(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, _, _, results| {
        put_result(results, 0, encode_enum(node.get_rotation_edit_mode())?)
    })
}

/// Returns the parent's handle, or `0` for no (live, registered) parent.
fn get_parent_node_3d(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, _, _, results| {
        let parent = node.get_parent_node_3d().unwrap_or(Handle::NULL);
        put_result(results, 0, Val::I64(parent.into_raw() as i64))
    })
}

fn look_at(context: &mut CallContext<'_>, args: &[Val], results: &mut [Val]) -> BridgeResult<()> {
    node_call(context, args, results, |node, memory, args, _| {
        let target: Vector3 = memory.read(arg_u64(args, 1)?)?;
        let up: Vector3 = memory.read(arg_u64(args, 2)?)?;
        node.look_at(target, up, arg_flag(args, 3)?);
        Ok(())
    })
}

fn look_at_from_position(
    context: &mut CallContext<'_>,
    args: &[Val],
    results: &mut [Val],
) -> BridgeResult<()> {
    node_call(context, args, results, |node, memory, args, _| {
        let position: Vector3 = memory.read(arg_u64(args, 1)?)?;
        let target: Vector3 = memory.read(arg_u64(args, 2)?)?;
        let up: Vector3 = memory.read(arg_u64(args, 3)?)?;
        node.look_at_from_position(position, target, up, arg_flag(args, 4)?);
        Ok(())
    })
}
