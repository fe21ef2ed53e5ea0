//! Value types of the spatial-node object model
//!
//! These mirror the host's in-memory representation (single precision
//! components, row-major bases) so that a raw byte copy at a guest supplied
//! offset round-trips.  The math here is only what the `Node3D` operations
//! need.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use super::EulerOrder;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Below this, lengths and determinants are treated as zero.
const EPSILON: f32 = 1.0e-6;

////////////////////////////////////////////////////////////////////////////////
// Vectors.
////////////////////////////////////////////////////////////////////////////////

/// A 2D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A 3D vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const ONE: Vector3 = Vector3::new(1.0, 1.0, 1.0);
    pub const RIGHT: Vector3 = Vector3::new(1.0, 0.0, 0.0);
    pub const UP: Vector3 = Vector3::new(0.0, 1.0, 0.0);
    pub const BACK: Vector3 = Vector3::new(0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Returns the unit vector, or `None` for a (near) zero vector.
    pub fn try_normalized(self) -> Option<Vector3> {
        let length = self.length();
        if length < EPSILON {
            None
        } else {
            Some(self * (1.0 / length))
        }
    }

    /// Component-wise conversion from radians to degrees.
    pub fn to_degrees(self) -> Vector3 {
        Vector3::new(self.x.to_degrees(), self.y.to_degrees(), self.z.to_degrees())
    }

    /// Component-wise conversion from degrees to radians.
    pub fn to_radians(self) -> Vector3 {
        Vector3::new(self.x.to_radians(), self.y.to_radians(), self.z.to_radians())
    }

    /// Largest absolute difference between components.
    pub fn distance_max(self, other: Vector3) -> f32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    #[inline]
    fn axis(self, index: usize) -> f32 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, other: Vector3) -> Vector3 {
        Vector3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, other: Vector3) {
        *self = *self + other;
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, other: Vector3) -> Vector3 {
        Vector3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, factor: f32) -> Vector3 {
        Vector3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Quaternions.
////////////////////////////////////////////////////////////////////////////////

/// A rotation quaternion, `w` last.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Rotation of `angle` radians around the unit vector `axis`.
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Self {
        let half = angle * 0.5;
        let s = half.sin() as f32;
        Quaternion::new(axis.x * s, axis.y * s, axis.z * s, half.cos() as f32)
    }

    /// Largest absolute difference between components.
    pub fn distance_max(self, other: Quaternion) -> f32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
            .max((self.w - other.w).abs())
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

////////////////////////////////////////////////////////////////////////////////
// Bases.
////////////////////////////////////////////////////////////////////////////////

/// A 3x3 matrix holding rotation, scale and shear, stored as rows.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub rows: [Vector3; 3],
}

impl Default for Basis {
    fn default() -> Self {
        Basis::IDENTITY
    }
}

impl Basis {
    pub const IDENTITY: Basis = Basis::from_rows(Vector3::RIGHT, Vector3::UP, Vector3::BACK);

    #[inline]
    pub const fn from_rows(x: Vector3, y: Vector3, z: Vector3) -> Self {
        Self { rows: [x, y, z] }
    }

    pub fn from_columns(x: Vector3, y: Vector3, z: Vector3) -> Self {
        Basis::from_rows(
            Vector3::new(x.x, y.x, z.x),
            Vector3::new(x.y, y.y, z.y),
            Vector3::new(x.z, y.z, z.z),
        )
    }

    pub fn from_scale(scale: Vector3) -> Self {
        Basis::from_rows(
            Vector3::new(scale.x, 0.0, 0.0),
            Vector3::new(0.0, scale.y, 0.0),
            Vector3::new(0.0, 0.0, scale.z),
        )
    }

    /// Rotation of `angle` radians around the unit vector `axis`.
    pub fn from_axis_angle(axis: Vector3, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let (s, c) = (s as f32, c as f32);
        let t = 1.0 - c;
        let Vector3 { x, y, z } = axis;
        Basis::from_rows(
            Vector3::new(t * x * x + c, t * x * y - s * z, t * x * z + s * y),
            Vector3::new(t * x * y + s * z, t * y * y + c, t * y * z - s * x),
            Vector3::new(t * x * z - s * y, t * y * z + s * x, t * z * z + c),
        )
    }

    pub fn from_quaternion(q: Quaternion) -> Self {
        let d = q.x * q.x + q.y * q.y + q.z * q.z + q.w * q.w;
        if d < EPSILON {
            return Basis::IDENTITY;
        }
        let s = 2.0 / d;
        let (xs, ys, zs) = (q.x * s, q.y * s, q.z * s);
        let (wx, wy, wz) = (q.w * xs, q.w * ys, q.w * zs);
        let (xx, xy, xz) = (q.x * xs, q.x * ys, q.x * zs);
        let (yy, yz, zz) = (q.y * ys, q.y * zs, q.z * zs);
        Basis::from_rows(
            Vector3::new(1.0 - (yy + zz), xy - wz, xz + wy),
            Vector3::new(xy + wz, 1.0 - (xx + zz), yz - wx),
            Vector3::new(xz - wy, yz + wx, 1.0 - (xx + yy)),
        )
    }

    /// Composes per-axis rotations; `EulerOrder::YXZ` yields `Ry * Rx * Rz`.
    pub fn from_euler(euler: Vector3, order: EulerOrder) -> Self {
        let x = Basis::from_axis_angle(Vector3::RIGHT, euler.x as f64);
        let y = Basis::from_axis_angle(Vector3::UP, euler.y as f64);
        let z = Basis::from_axis_angle(Vector3::BACK, euler.z as f64);
        match order {
            EulerOrder::XYZ => x * y * z,
            EulerOrder::XZY => x * z * y,
            EulerOrder::YXZ => y * x * z,
            EulerOrder::YZX => y * z * x,
            EulerOrder::ZXY => z * x * y,
            EulerOrder::ZYX => z * y * x,
        }
    }

    /// A rotation whose -Z axis (or +Z with `use_model_front`) points along
    /// `direction`.  `None` if `direction` is zero or parallel to `up`.
    pub fn looking_at(direction: Vector3, up: Vector3, use_model_front: bool) -> Option<Self> {
        let mut v_z = -direction.try_normalized()?;
        if use_model_front {
            v_z = -v_z;
        }
        let v_x = up.cross(v_z).try_normalized()?;
        let v_y = v_z.cross(v_x);
        Some(Basis::from_columns(v_x, v_y, v_z))
    }

    #[inline]
    fn at(&self, row: usize, column: usize) -> f32 {
        self.rows[row].axis(column)
    }

    pub fn column(&self, index: usize) -> Vector3 {
        Vector3::new(
            self.rows[0].axis(index),
            self.rows[1].axis(index),
            self.rows[2].axis(index),
        )
    }

    pub fn transposed(&self) -> Basis {
        Basis::from_rows(self.column(0), self.column(1), self.column(2))
    }

    pub fn determinant(&self) -> f32 {
        let [a, b, c] = self.rows;
        a.dot(b.cross(c))
    }

    /// `None` if the basis is singular.
    pub fn inverse(&self) -> Option<Basis> {
        let det = self.determinant();
        if det.abs() < EPSILON {
            return None;
        }
        let [a, b, c] = self.rows;
        // The columns of the inverse are the cross products of the rows.
        let inverse = Basis::from_columns(b.cross(c), c.cross(a), a.cross(b));
        Some(inverse.scaled(Vector3::ONE * (1.0 / det)))
    }

    #[inline]
    pub fn xform(&self, v: Vector3) -> Vector3 {
        Vector3::new(self.rows[0].dot(v), self.rows[1].dot(v), self.rows[2].dot(v))
    }

    /// Scale applied in the parent frame: `from_scale(scale) * self`.
    pub fn scaled(&self, scale: Vector3) -> Basis {
        Basis::from_scale(scale) * *self
    }

    /// Scale applied in the local frame: `self * from_scale(scale)`.
    pub fn scaled_local(&self, scale: Vector3) -> Basis {
        *self * Basis::from_scale(scale)
    }

    /// Rotation applied in the parent frame.
    pub fn rotated(&self, axis: Vector3, angle: f64) -> Basis {
        Basis::from_axis_angle(axis, angle) * *self
    }

    /// Rotation applied in the local frame.
    pub fn rotated_local(&self, axis: Vector3, angle: f64) -> Basis {
        *self * Basis::from_axis_angle(axis, angle)
    }

    /// Column lengths, negated when the basis flips handedness.
    pub fn get_scale(&self) -> Vector3 {
        let sign = if self.determinant() < 0.0 { -1.0 } else { 1.0 };
        Vector3::new(
            self.column(0).length(),
            self.column(1).length(),
            self.column(2).length(),
        ) * sign
    }

    /// Gram-Schmidt over the columns.  Degenerate columns collapse to zero.
    pub fn orthonormalized(&self) -> Basis {
        let x = self.column(0);
        let y = self.column(1);
        let z = self.column(2);

        let x = x.try_normalized().unwrap_or(Vector3::ZERO);
        let y = (y - x * x.dot(y)).try_normalized().unwrap_or(Vector3::ZERO);
        let z = (z - x * x.dot(z) - y * y.dot(z))
            .try_normalized()
            .unwrap_or(Vector3::ZERO);
        Basis::from_columns(x, y, z)
    }

    /// Euler angles of an orthonormal basis for the given composition order.
    pub fn get_euler(&self, order: EulerOrder) -> Vector3 {
        // Order "ABC" composes as A * B * C.  (i, j, k) are the axis indices of
        // A, B and C; `parity` is +1 when they are a cyclic permutation.
        let (i, j, k) = order.axes();
        let parity = if (j + 3 - i) % 3 == 1 { 1.0 } else { -1.0 };

        let mut angles = [0.0f32; 3];
        let sin_middle = (parity * self.at(i, k)).max(-1.0).min(1.0);
        angles[j] = sin_middle.asin();
        if sin_middle.abs() < 1.0 - EPSILON {
            angles[i] = (-parity * self.at(j, k)).atan2(self.at(k, k));
            angles[k] = (-parity * self.at(i, j)).atan2(self.at(i, i));
        } else {
            // Gimbal lock: fold the last rotation into the first.
            angles[i] = (parity * self.at(k, j)).atan2(self.at(j, j));
            angles[k] = 0.0;
        }
        Vector3::new(angles[0], angles[1], angles[2])
    }

    /// Rotation quaternion of an orthonormal basis.
    pub fn get_quaternion(&self) -> Quaternion {
        let m = |r, c| self.at(r, c);
        let trace = m(0, 0) + m(1, 1) + m(2, 2);
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            Quaternion::new(
                (m(2, 1) - m(1, 2)) / s,
                (m(0, 2) - m(2, 0)) / s,
                (m(1, 0) - m(0, 1)) / s,
                0.25 * s,
            )
        } else if m(0, 0) > m(1, 1) && m(0, 0) > m(2, 2) {
            let s = (1.0 + m(0, 0) - m(1, 1) - m(2, 2)).sqrt() * 2.0;
            Quaternion::new(
                0.25 * s,
                (m(0, 1) + m(1, 0)) / s,
                (m(0, 2) + m(2, 0)) / s,
                (m(2, 1) - m(1, 2)) / s,
            )
        } else if m(1, 1) > m(2, 2) {
            let s = (1.0 + m(1, 1) - m(0, 0) - m(2, 2)).sqrt() * 2.0;
            Quaternion::new(
                (m(0, 1) + m(1, 0)) / s,
                0.25 * s,
                (m(1, 2) + m(2, 1)) / s,
                (m(0, 2) - m(2, 0)) / s,
            )
        } else {
            let s = (1.0 + m(2, 2) - m(0, 0) - m(1, 1)).sqrt() * 2.0;
            Quaternion::new(
                (m(0, 2) + m(2, 0)) / s,
                (m(1, 2) + m(2, 1)) / s,
                0.25 * s,
                (m(1, 0) - m(0, 1)) / s,
            )
        }
    }

    /// Largest absolute difference between entries.
    pub fn distance_max(&self, other: &Basis) -> f32 {
        (0..3)
            .map(|row| self.rows[row].distance_max(other.rows[row]))
            .fold(0.0, f32::max)
    }
}

impl Mul for Basis {
    type Output = Basis;
    fn mul(self, other: Basis) -> Basis {
        let columns = [other.column(0), other.column(1), other.column(2)];
        let row = |r: Vector3| Vector3::new(r.dot(columns[0]), r.dot(columns[1]), r.dot(columns[2]));
        Basis::from_rows(row(self.rows[0]), row(self.rows[1]), row(self.rows[2]))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Transforms.
////////////////////////////////////////////////////////////////////////////////

/// An affine transform: a basis followed by a translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub basis: Basis,
    pub origin: Vector3,
}

impl Transform3D {
    pub const IDENTITY: Transform3D = Transform3D::new(Basis::IDENTITY, Vector3::ZERO);

    #[inline]
    pub const fn new(basis: Basis, origin: Vector3) -> Self {
        Self { basis, origin }
    }

    #[inline]
    pub fn xform(&self, v: Vector3) -> Vector3 {
        self.basis.xform(v) + self.origin
    }

    /// `None` if the basis is singular.
    pub fn affine_inverse(&self) -> Option<Transform3D> {
        let basis = self.basis.inverse()?;
        Some(Transform3D::new(basis, basis.xform(-self.origin)))
    }
}

impl Mul for Transform3D {
    type Output = Transform3D;
    fn mul(self, other: Transform3D) -> Transform3D {
        Transform3D::new(self.basis * other.basis, self.xform(other.origin))
    }
}
