// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Angles between bond vectors and between points, in degrees.
//!
//! ```text
//!     |  a       c     |
//!     |    \   /   \   |
//!     |      b      d  |
//! ```

use nalgebra::Vector3;

use crate::units::RAD_TO_DEG;

/// Angle between the bond vectors `b0 = a - b` and `b1 = c - b`.
pub fn bond_angle(b0: &Vector3<f64>, b1: &Vector3<f64>) -> f64 {
    let cross = b0.cross(b1).norm();
    let dot = b0.dot(b1);
    cross.atan2(dot) * RAD_TO_DEG
}

/// Signed dihedral angle from three consecutive bond vectors
/// `b0 = b - a`, `b1 = c - b`, `b2 = d - c`, in (-180, 180].
pub fn dihedral_angle(b0: &Vector3<f64>, b1: &Vector3<f64>, b2: &Vector3<f64>) -> f64 {
    let n1 = b0.cross(b1);
    let n2 = b1.cross(b2);
    let m1 = n1.cross(&b1.normalize());
    let x = n1.dot(&n2);
    let y = m1.dot(&n2);
    y.atan2(x) * RAD_TO_DEG
}

/// Angle `v1 - v2 - v3` with `v2` as vertex.
pub fn calculate_angle(v1: &Vector3<f64>, v2: &Vector3<f64>, v3: &Vector3<f64>) -> f64 {
    bond_angle(&(v1 - v2), &(v3 - v2))
}

pub fn calculate_dihedral(
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
    v3: &Vector3<f64>,
    v4: &Vector3<f64>,
) -> f64 {
    dihedral_angle(&(v2 - v1), &(v3 - v2), &(v4 - v3))
}

/// Angle between the bond `point - b` and the plane through `b`, `c`, `d`.
///
/// Returns 0 when the plane is degenerate.
pub fn out_of_plane_angle(
    point: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
    d: &Vector3<f64>,
) -> f64 {
    let bond = point - b;
    let normal = (c - b).cross(&(d - b));
    let denominator = bond.norm() * normal.norm();
    if denominator < f64::EPSILON {
        return 0.0;
    }
    let sin_theta = (normal.dot(&bond) / denominator).clamp(-1.0, 1.0);
    sin_theta.asin() * RAD_TO_DEG
}
