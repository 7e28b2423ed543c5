// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use crate::error::CError;
use crate::units::{DEG_TO_RAD, RAD_TO_DEG};
use nalgebra::{Matrix3, Vector3};

type Vec3D = [f64; 3];

/// Periodic cell spanned by the lattice vectors `a`, `b` and `c`, stored as
/// the columns of `cell_matrix` (Cartesian, Ångström).
#[derive(Debug, Clone, Copy)]
pub struct UnitCell {
    cell_matrix: Matrix3<f64>,
}

/// Entries are compared relative to the largest entry of both cells.
impl PartialEq for UnitCell {
    fn eq(&self, other: &Self) -> bool {
        let scale = self.cell_matrix.amax().max(other.cell_matrix.amax());
        let tolerance = Self::EQUALITY_TOLERANCE * scale.max(1.0);
        self.cell_matrix
            .iter()
            .zip(other.cell_matrix.iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

impl UnitCell {
    const EPSILON: f64 = 1e-5;

    /// Relative tolerance on the volume for the cell to count as regular.
    const REGULAR_TOLERANCE: f64 = 1e-8;

    /// Relative tolerance of `==` between cells.
    const EQUALITY_TOLERANCE: f64 = 1e-9;

    fn cos_degree(theta: f64) -> f64 {
        (theta * DEG_TO_RAD).cos()
    }

    fn sin_degree(theta: f64) -> f64 {
        (theta * DEG_TO_RAD).sin()
    }

    /// Builds a cell from its three lattice vectors.
    ///
    /// No validation happens here; check [`UnitCell::is_regular`] (or use
    /// [`UnitCell::try_new`]) before storing the cell anywhere.
    pub fn new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Self {
        UnitCell {
            cell_matrix: Matrix3::from_columns(&[a, b, c]),
        }
    }

    /// Like [`UnitCell::new`], but rejects linearly dependent vectors.
    pub fn try_new(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Result<Self, CError> {
        let cell = Self::new(a, b, c);
        if cell.is_regular() {
            Ok(cell)
        } else {
            Err(CError::IrregularUnitCell)
        }
    }

    /// Whether the lattice vectors are linearly independent.
    pub fn is_regular(&self) -> bool {
        let scale = self.a_vector().norm() * self.b_vector().norm() * self.c_vector().norm();
        if !scale.is_finite() || scale == 0.0 {
            return false;
        }
        self.cell_matrix.determinant().abs() > Self::REGULAR_TOLERANCE * scale
    }

    pub fn cell_matrix(&self) -> &Matrix3<f64> {
        &self.cell_matrix
    }

    pub fn a_vector(&self) -> Vector3<f64> {
        self.cell_matrix.column(0).into_owned()
    }

    pub fn b_vector(&self) -> Vector3<f64> {
        self.cell_matrix.column(1).into_owned()
    }

    pub fn c_vector(&self) -> Vector3<f64> {
        self.cell_matrix.column(2).into_owned()
    }

    pub fn a(&self) -> f64 {
        self.a_vector().norm()
    }

    pub fn b(&self) -> f64 {
        self.b_vector().norm()
    }

    pub fn c(&self) -> f64 {
        self.c_vector().norm()
    }

    fn angle_between(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
        u.angle(v) * RAD_TO_DEG
    }

    /// Angle between `b` and `c`, in degrees.
    pub fn alpha(&self) -> f64 {
        Self::angle_between(&self.b_vector(), &self.c_vector())
    }

    /// Angle between `a` and `c`, in degrees.
    pub fn beta(&self) -> f64 {
        Self::angle_between(&self.a_vector(), &self.c_vector())
    }

    /// Angle between `a` and `b`, in degrees.
    pub fn gamma(&self) -> f64 {
        Self::angle_between(&self.a_vector(), &self.b_vector())
    }

    pub fn lengths(&self) -> Vec3D {
        [self.a(), self.b(), self.c()]
    }

    pub fn angles(&self) -> Vec3D {
        [self.alpha(), self.beta(), self.gamma()]
    }

    pub fn volume(&self) -> f64 {
        self.cell_matrix.determinant().abs()
    }

    /// Cartesian position to fractional coordinates, `None` for an
    /// irregular cell.
    pub fn to_fractional(&self, cartesian: &Vector3<f64>) -> Option<Vector3<f64>> {
        self.cell_matrix.try_inverse().map(|inverse| inverse * cartesian)
    }

    pub fn to_cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.cell_matrix * fractional
    }

    fn check_lengths(lengths: &Vec3D) -> Result<(), CError> {
        if lengths.iter().any(|&x| x < 0.0) {
            return Err(CError::GenericError(
                "lengths cannot be negative".to_string(),
            ));
        };

        Ok(())
    }

    fn check_angles(angles: &Vec3D) -> Result<(), CError> {
        if angles.iter().any(|&x| x < 0.0) {
            return Err(CError::GenericError(
                "angles cannot be negative".to_string(),
            ));
        };

        if angles.iter().any(|&x| x.abs() < Self::EPSILON) {
            return Err(CError::GenericError(
                "angles cannot be (roughly) zero".to_string(),
            ));
        }

        if angles.iter().any(|&x| x >= 180.0) {
            return Err(CError::GenericError(
                "angles cannot be larger than or equal to 180 degrees".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the cell from lengths `[a, b, c]` and angles `[α, β, γ]` in
    /// degrees, with `a` along x and `b` in the xy plane.
    pub fn from_lengths_angles(lengths: Vec3D, angles: Vec3D) -> Result<Self, CError> {
        Self::check_lengths(&lengths)?;
        Self::check_angles(&angles)?;

        let mut angles = angles;
        if angles.iter().all(|&x| (x - 90.0).abs() < 1e-3) {
            angles.iter_mut().for_each(|x| *x = 90.0);
        }
        let [alpha, beta, gamma] = angles;

        let a = Vector3::new(lengths[0], 0.0, 0.0);
        let b = Vector3::new(
            Self::cos_degree(gamma) * lengths[1],
            Self::sin_degree(gamma) * lengths[1],
            0.0,
        );

        let cx = Self::cos_degree(beta);
        let cy = (Self::cos_degree(alpha) - Self::cos_degree(beta) * Self::cos_degree(gamma))
            / Self::sin_degree(gamma);
        let cz = (1.0 - cx * cx - cy * cy).sqrt();
        if cz.is_nan() {
            return Err(CError::GenericError(format!(
                "no cell has the angles {alpha}, {beta} and {gamma}"
            )));
        }
        let c = Vector3::new(cx, cy, cz) * lengths[2];

        Ok(Self::new(a, b, c))
    }
}
