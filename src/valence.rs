// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

//! The MDL valence model: how many bonds an atom is expected to form, given
//! its element, formal charge and the bonds it already has.
//!
//! A charged atom behaves like the neutral element with the same number of
//! valence electrons, so `N+` is treated like carbon and `O-` like
//! fluorine. Second period elements keep a strict octet; heavier p-block
//! elements may expand it in steps of two (`S`: 2, 4, 6).

use crate::bond::BondOrder;

/// Valence electrons of a p-block element and whether it sits in the
/// second period.
fn p_block(atomic_number: u8) -> Option<(i32, bool)> {
    let number = atomic_number as i32;
    match atomic_number {
        5..=9 => Some((number - 2, true)),
        13..=17 => Some((number - 10, false)),
        31..=35 => Some((number - 28, false)),
        49..=53 => Some((number - 46, false)),
        81..=85 => Some((number - 78, false)),
        _ => None,
    }
}

/// Valences allowed for an atom, in increasing order. Empty when the model
/// does not cover the element or charge.
pub fn allowed_valences(atomic_number: u8, charge: i32) -> Vec<u32> {
    match atomic_number {
        // hydrogen and the alkali metals
        1 | 3 | 11 | 19 | 37 | 55 | 87 => match charge {
            0 => vec![1],
            _ => Vec::new(),
        },
        // alkaline earth metals
        4 | 12 | 20 | 38 | 56 | 88 => match charge {
            0 => vec![2],
            1 => vec![1],
            _ => Vec::new(),
        },
        _ => {
            let Some((group_electrons, second_period)) = p_block(atomic_number) else {
                return Vec::new();
            };
            let electrons = group_electrons - charge;
            if !(1..=7).contains(&electrons) {
                return Vec::new();
            }
            let lowest = electrons.min(8 - electrons) as u32;
            if second_period {
                vec![lowest]
            } else {
                (lowest..=electrons as u32).step_by(2).collect()
            }
        }
    }
}

/// Sum of bond orders in valence units. Aromatic bonds count one and a
/// half and unknown orders count one; a half left over rounds up.
pub fn bond_valence(orders: impl IntoIterator<Item = BondOrder>) -> u32 {
    let halves: u32 = orders
        .into_iter()
        .map(|order| match order {
            BondOrder::Unknown | BondOrder::Single => 2,
            BondOrder::Double => 4,
            BondOrder::Triple => 6,
            BondOrder::Aromatic => 3,
        })
        .sum();
    halves.div_ceil(2)
}

/// Number of bonds the atom is expected to form when it already has
/// `bond_sum`: the smallest allowed valence not below `bond_sum`.
///
/// Atoms the model does not cover get `bond_sum` back. An overbonded atom
/// gets its largest allowed valence, which is less than `bond_sum`.
pub fn atom_valence(atomic_number: u8, charge: i32, bond_sum: u32) -> u32 {
    let valences = allowed_valences(atomic_number, charge);
    match valences.iter().find(|&&valence| valence >= bond_sum) {
        Some(&valence) => valence,
        None => valences.last().copied().unwrap_or(bond_sum),
    }
}

/// Hydrogens to add so the atom reaches its expected valence, `None` when
/// the model does not cover it.
pub fn implicit_hydrogens(atomic_number: u8, charge: i32, bond_sum: u32) -> Option<u32> {
    if allowed_valences(atomic_number, charge).is_empty() {
        return None;
    }
    Some(atom_valence(atomic_number, charge, bond_sum).saturating_sub(bond_sum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_valences() {
        assert_eq!(allowed_valences(1, 0), vec![1]);
        assert_eq!(allowed_valences(6, 0), vec![4]);
        assert_eq!(allowed_valences(7, 0), vec![3]);
        assert_eq!(allowed_valences(8, 0), vec![2]);
        assert_eq!(allowed_valences(15, 0), vec![3, 5]);
        assert_eq!(allowed_valences(16, 0), vec![2, 4, 6]);
        assert_eq!(allowed_valences(53, 0), vec![1, 3, 5, 7]);
        assert_eq!(allowed_valences(13, 0), vec![3]);
        assert_eq!(allowed_valences(12, 0), vec![2]);
        // noble gases, transition metals and custom elements are not covered
        assert!(allowed_valences(2, 0).is_empty());
        assert!(allowed_valences(26, 0).is_empty());
        assert!(allowed_valences(130, 0).is_empty());
    }

    #[test]
    fn charges_shift_the_valence() {
        // ammonium, hydronium, carbanion, carbocation, borohydride
        assert_eq!(allowed_valences(7, 1), vec![4]);
        assert_eq!(allowed_valences(8, 1), vec![3]);
        assert_eq!(allowed_valences(6, -1), vec![3]);
        assert_eq!(allowed_valences(6, 1), vec![3]);
        assert_eq!(allowed_valences(5, -1), vec![4]);
        assert_eq!(allowed_valences(8, -1), vec![1]);
        assert_eq!(allowed_valences(16, 1), vec![3, 5]);
        assert!(allowed_valences(1, 1).is_empty());
        assert!(allowed_valences(9, -1).is_empty());
    }

    #[test]
    fn expected_valence() {
        assert_eq!(atom_valence(6, 0, 2), 4);
        assert_eq!(atom_valence(16, 0, 3), 4);
        assert_eq!(atom_valence(16, 0, 5), 6);
        // overbonded
        assert_eq!(atom_valence(6, 0, 5), 4);
        assert_eq!(atom_valence(26, 0, 6), 6);

        assert_eq!(implicit_hydrogens(6, 0, 1), Some(3));
        assert_eq!(implicit_hydrogens(8, 0, 1), Some(1));
        assert_eq!(implicit_hydrogens(7, 1, 0), Some(4));
        assert_eq!(implicit_hydrogens(6, 0, 5), Some(0));
        assert_eq!(implicit_hydrogens(26, 0, 0), None);
    }

    #[test]
    fn aromatic_bonds() {
        use BondOrder::*;
        assert_eq!(bond_valence([Aromatic, Aromatic]), 3);
        assert_eq!(bond_valence([Aromatic, Aromatic, Aromatic]), 5);
        assert_eq!(bond_valence([Single, Double, Unknown]), 4);
        assert_eq!(bond_valence([]), 0);
    }
}
