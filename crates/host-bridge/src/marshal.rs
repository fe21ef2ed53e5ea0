//! Marshalling of values between guest and host
//!
//! Three concerns live here:
//! - the primitive value kinds a host call may declare (`ValueKind`),
//! - typed extraction of primitive call arguments,
//! - the raw byte encoding of the composite value types (`Pod`), and the
//!   encoding of program arguments for `args_get`.
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
    error::{BridgeError, BridgeResult},
    scene::math::{Basis, Quaternion, Transform3D, Vector2, Vector3},
};
use byteorder::{ByteOrder, LittleEndian};
use std::{string::String, vec::Vec};
use wasmtime::{Val, ValType};

////////////////////////////////////////////////////////////////////////////////
// Primitive value kinds.
////////////////////////////////////////////////////////////////////////////////

/// The primitive kind of a parameter or result of a host call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    I32,
    I64,
    F64,
}

impl ValueKind {
    /// The engine-level type of this kind.
    pub fn val_type(self) -> ValType {
        match self {
            ValueKind::I32 => ValType::I32,
            ValueKind::I64 => ValType::I64,
            ValueKind::F64 => ValType::F64,
        }
    }

    /// The zero value of this kind, used to pre-fill result slots.
    pub fn zero(self) -> Val {
        match self {
            ValueKind::I32 => Val::I32(0),
            ValueKind::I64 => Val::I64(0),
            ValueKind::F64 => Val::F64(0f64.to_bits()),
        }
    }
}

/// A macro generating an accessor which extracts argument `index` as `$t`, or
/// fails with `InvalidArgument` if the argument is missing or of another kind.
macro_rules! argument_accessor {
    ($name:ident, $t:ty, $variant:ident) => {
        #[inline]
        pub fn $name(args: &[Val], index: usize) -> BridgeResult<$t> {
            match args.get(index) {
                Some(Val::$variant(value)) => Ok(*value),
                _ => Err(BridgeError::InvalidArgument),
            }
        }
    };
}

argument_accessor!(arg_i32, i32, I32);
argument_accessor!(arg_i64, i64, I64);

/// Extracts an `F64` argument.
#[inline]
pub fn arg_f64(args: &[Val], index: usize) -> BridgeResult<f64> {
    match args.get(index) {
        Some(Val::F64(bits)) => Ok(f64::from_bits(*bits)),
        _ => Err(BridgeError::InvalidArgument),
    }
}

/// Extracts an `I32` argument used as a guest offset or length.
#[inline]
pub fn arg_u32(args: &[Val], index: usize) -> BridgeResult<u32> {
    arg_i32(args, index).map(|value| value as u32)
}

/// Extracts an `I64` argument used as a handle or guest offset.
#[inline]
pub fn arg_u64(args: &[Val], index: usize) -> BridgeResult<u64> {
    arg_i64(args, index).map(|value| value as u64)
}

/// Extracts a boolean carried as `I64`; any non-zero value is true.
#[inline]
pub fn arg_flag(args: &[Val], index: usize) -> BridgeResult<bool> {
    arg_i64(args, index).map(|value| value != 0)
}

/// Stores `value` into result slot `index`.
#[inline]
pub fn put_result(results: &mut [Val], index: usize, value: Val) -> BridgeResult<()> {
    let slot = results.get_mut(index).ok_or(BridgeError::InvalidArgument)?;
    *slot = value;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////
// Plain old data.
////////////////////////////////////////////////////////////////////////////////

/// A value with a fixed-size little-endian byte encoding identical to the
/// host's in-memory layout.  Callers guarantee `bytes.len() >= SIZE`.
pub trait Pod: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;
    fn decode(bytes: &[u8]) -> Self;
    fn encode(&self, bytes: &mut [u8]);
}

impl Pod for u32 {
    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_u32(bytes, *self)
    }
}

impl Pod for u64 {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        LittleEndian::read_u64(bytes)
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_u64(bytes, *self)
    }
}

impl Pod for Vector2 {
    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        let mut components = [0f32; 2];
        LittleEndian::read_f32_into(&bytes[..Self::SIZE], &mut components);
        Vector2::new(components[0], components[1])
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_f32_into(&[self.x, self.y], &mut bytes[..Self::SIZE]);
    }
}

impl Pod for Vector3 {
    const SIZE: usize = 12;

    fn decode(bytes: &[u8]) -> Self {
        let mut components = [0f32; 3];
        LittleEndian::read_f32_into(&bytes[..Self::SIZE], &mut components);
        Vector3::new(components[0], components[1], components[2])
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_f32_into(&[self.x, self.y, self.z], &mut bytes[..Self::SIZE]);
    }
}

impl Pod for Quaternion {
    const SIZE: usize = 16;

    fn decode(bytes: &[u8]) -> Self {
        let mut components = [0f32; 4];
        LittleEndian::read_f32_into(&bytes[..Self::SIZE], &mut components);
        Quaternion::new(components[0], components[1], components[2], components[3])
    }

    fn encode(&self, bytes: &mut [u8]) {
        LittleEndian::write_f32_into(
            &[self.x, self.y, self.z, self.w],
            &mut bytes[..Self::SIZE],
        );
    }
}

impl Pod for Basis {
    const SIZE: usize = 3 * Vector3::SIZE;

    fn decode(bytes: &[u8]) -> Self {
        let row = |index: usize| Vector3::decode(&bytes[index * Vector3::SIZE..]);
        Basis::from_rows(row(0), row(1), row(2))
    }

    fn encode(&self, bytes: &mut [u8]) {
        for (index, row) in self.rows.iter().enumerate() {
            row.encode(&mut bytes[index * Vector3::SIZE..]);
        }
    }
}

impl Pod for Transform3D {
    const SIZE: usize = Basis::SIZE + Vector3::SIZE;

    fn decode(bytes: &[u8]) -> Self {
        Transform3D::new(Basis::decode(bytes), Vector3::decode(&bytes[Basis::SIZE..]))
    }

    fn encode(&self, bytes: &mut [u8]) {
        self.basis.encode(bytes);
        self.origin.encode(&mut bytes[Basis::SIZE..]);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Program arguments.
////////////////////////////////////////////////////////////////////////////////

/// Prefix marking a flag in the raw argument list.
const FLAG_PREFIX: &str = "--";

/// Program arguments folded into `key=value` entries, each NUL terminated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedArguments {
    count: u32,
    length: u32,
    entries: Vec<Vec<u8>>,
}

impl EncodedArguments {
    /// Folds the raw argument list.  `--key=value` yields `key=value`;
    /// `--key` followed by a bare token yields `key=token`.  Anything after a
    /// second `=` is dropped, and bare tokens with no pending key are ignored.
    pub fn encode<S: AsRef<str>>(arguments: &[S]) -> Self {
        let mut encoded = EncodedArguments::default();
        let mut pending: Option<String> = None;

        for argument in arguments.iter().map(AsRef::as_ref) {
            let entry = match argument.strip_prefix(FLAG_PREFIX) {
                Some(flag) => {
                    let mut parts = flag.split('=');
                    let key = parts.next().unwrap_or_default();
                    match parts.next() {
                        Some(value) => format!("{}={}", key, value),
                        None => {
                            pending = Some(key.to_string()).filter(|key| !key.is_empty());
                            continue;
                        }
                    }
                }
                None => match pending.take() {
                    Some(key) => format!("{}={}", key, argument),
                    None => continue,
                },
            };
            encoded.push(entry);
        }
        encoded
    }

    fn push(&mut self, entry: String) {
        let mut bytes = entry.into_bytes();
        bytes.push(0);
        self.count += 1;
        self.length += bytes.len() as u32;
        self.entries.push(bytes);
    }

    /// Number of entries.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Total size of all entries, terminators included.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(arguments: &[&str]) -> Vec<String> {
        EncodedArguments::encode(arguments)
            .entries()
            .iter()
            .map(|entry| String::from_utf8_lossy(&entry[..entry.len() - 1]).into_owned())
            .collect()
    }

    #[test]
    fn folds_flags_and_values() {
        let encoded = EncodedArguments::encode(&["--foo", "bar", "--a=1", "baz", "--x"]);
        assert_eq!(encoded.count(), 2);
        assert_eq!(encoded.length(), 12);
        assert_eq!(encoded.entries()[0], b"foo=bar\0".to_vec());
        assert_eq!(encoded.entries()[1], b"a=1\0".to_vec());
    }

    #[test]
    fn inline_value_keeps_pending_key() {
        assert_eq!(entries(&["--x", "--a=1", "v"]), vec!["a=1", "x=v"]);
    }

    #[test]
    fn extra_equals_are_dropped() {
        assert_eq!(entries(&["--a=1=2", "--k="]), vec!["a=1", "k="]);
    }

    #[test]
    fn empty_input_encodes_nothing() {
        let encoded = EncodedArguments::encode::<&str>(&[]);
        assert_eq!((encoded.count(), encoded.length()), (0, 0));
        assert!(entries(&["stray", "--", "value"]).is_empty());
    }

    #[test]
    fn transform_layout_is_rows_then_origin() {
        let transform = Transform3D::new(
            Basis::from_rows(
                Vector3::new(1.0, 2.0, 3.0),
                Vector3::new(4.0, 5.0, 6.0),
                Vector3::new(7.0, 8.0, 9.0),
            ),
            Vector3::new(10.0, 11.0, 12.0),
        );
        let mut bytes = vec![0u8; Transform3D::SIZE];
        transform.encode(&mut bytes);
        assert_eq!(Transform3D::SIZE, 48);
        assert_eq!(LittleEndian::read_f32(&bytes[20..24]), 6.0);
        assert_eq!(LittleEndian::read_f32(&bytes[44..48]), 12.0);
        assert_eq!(Transform3D::decode(&bytes), transform);
    }

    #[test]
    fn vector2_layout_is_x_then_y() {
        let vector = Vector2::new(-0.0, 1.0e-38);
        let mut bytes = [0xffu8; 12];
        vector.encode(&mut bytes);
        assert_eq!(Vector2::SIZE, 8);
        assert_eq!(bytes[0..4], (-0.0f32).to_le_bytes());
        assert_eq!(bytes[4..8], 1.0e-38f32.to_le_bytes());
        assert_eq!(bytes[8..12], [0xff; 4]);
        let decoded = Vector2::decode(&bytes);
        assert_eq!(decoded.x.to_bits(), vector.x.to_bits());
        assert_eq!(decoded.y.to_bits(), vector.y.to_bits());
    }

    #[test]
    fn argument_kinds_are_checked() {
        let args = [Val::I32(-1), Val::I64(7), Val::F64(1.5f64.to_bits())];
        assert_eq!(arg_u32(&args, 0).unwrap(), u32::MAX);
        assert_eq!(arg_i64(&args, 1).unwrap(), 7);
        assert!(arg_flag(&args, 1).unwrap());
        assert_eq!(arg_f64(&args, 2).unwrap(), 1.5);
        assert!(arg_i32(&args, 1).is_err());
        assert!(arg_f64(&args, 3).is_err());
    }
}
