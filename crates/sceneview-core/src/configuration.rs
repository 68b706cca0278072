//! Rigid transform value type

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A rigid transform: position plus unit orientation.
///
/// The orientation is normalized on every construction path. A quaternion
/// that cannot be normalized (zero length, NaN) is replaced by identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConfiguration")]
pub struct Configuration {
    pub position: Vec3,
    pub quat: Quat,
}

/// Serialized form, normalized on the way in
#[derive(Deserialize)]
struct RawConfiguration {
    position: Vec3,
    quat: Quat,
}

impl From<RawConfiguration> for Configuration {
    fn from(raw: RawConfiguration) -> Self {
        Self::new(raw.position, raw.quat)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Configuration {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        quat: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, quat: Quat) -> Self {
        Self {
            position,
            quat: normalize_quat(quat),
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            quat: Quat::IDENTITY,
        }
    }

    /// Copy with a unit orientation, for values built by struct literal
    pub fn normalized(self) -> Self {
        Self::new(self.position, self.quat)
    }

    pub fn from_rotation(quat: Quat) -> Self {
        Self::new(Vec3::ZERO, quat)
    }

    /// Build from a 7-element array `[x, y, z, qx, qy, qz, qw]`, the layout
    /// used by the scripting and capture interfaces.
    pub fn from_array(values: [f32; 7]) -> Self {
        Self::new(
            Vec3::new(values[0], values[1], values[2]),
            Quat::from_xyzw(values[3], values[4], values[5], values[6]),
        )
    }

    /// `[x, y, z, qw, qx, qy, qz]`, the layout written by transform writers.
    pub fn to_array_wxyz(&self) -> [f32; 7] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.quat.w,
            self.quat.x,
            self.quat.y,
            self.quat.z,
        ]
    }

    /// Compose `self` (outer frame) with `inner`.
    ///
    /// `position = self.p + self.q * inner.p`, `orientation = self.q * inner.q`
    /// (Hamilton product).
    pub fn compose(&self, inner: &Configuration) -> Configuration {
        let outer = normalize_quat(self.quat);
        Configuration {
            position: self.position + outer * inner.position,
            quat: normalize_quat(outer * inner.quat),
        }
    }

    pub fn inverse(&self) -> Configuration {
        let inv = self.quat.conjugate();
        Configuration {
            position: -(inv * self.position),
            quat: inv,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.quat * point
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.quat, self.position)
    }

    /// Equality up to `epsilon`, treating `q` and `-q` as the same rotation.
    pub fn approx_eq(&self, other: &Configuration, epsilon: f32) -> bool {
        self.position.abs_diff_eq(other.position, epsilon)
            && (self.quat.abs_diff_eq(other.quat, epsilon)
                || self.quat.abs_diff_eq(-other.quat, epsilon))
    }
}

fn normalize_quat(quat: Quat) -> Quat {
    let length = quat.length();
    if !length.is_finite() || length <= f32::EPSILON {
        Quat::IDENTITY
    } else {
        quat / length
    }
}

impl From<(Vec3, Quat)> for Configuration {
    fn from((position, quat): (Vec3, Quat)) -> Self {
        Self::new(position, quat)
    }
}
