// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! Unit conversion factors and reserved atomic number ranges.

use std::f64::consts::PI;

/// Bohr radius in Ångström (NIST CODATA 2022).
pub const BOHR_TO_ANGSTROM: f64 = 0.529177210544;
pub const ANGSTROM_TO_BOHR: f64 = 1.0 / BOHR_TO_ANGSTROM;

pub const NM_TO_ANGSTROM: f64 = 10.0;
pub const ANGSTROM_TO_NM: f64 = 0.1;

pub const DEG_TO_RAD: f64 = PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / PI;

/// First atomic number reserved for custom, non-elemental particles.
pub const CUSTOM_ELEMENT_MIN: u8 = 128;

/// Last atomic number reserved for custom, non-elemental particles.
pub const CUSTOM_ELEMENT_MAX: u8 = 254;

pub const CUSTOM_ELEMENT_COUNT: usize = (CUSTOM_ELEMENT_MAX - CUSTOM_ELEMENT_MIN) as usize + 1;

pub fn is_custom_element(atomic_number: u8) -> bool {
    (CUSTOM_ELEMENT_MIN..=CUSTOM_ELEMENT_MAX).contains(&atomic_number)
}
