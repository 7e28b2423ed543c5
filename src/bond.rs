// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::ops::Index;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    /// Bond order is unknown or unspecified
    #[default]
    Unknown,

    /// Single bond
    Single,

    /// Double bond
    Double,

    /// Triple bond
    Triple,

    /// Aromatic bond (for example the ring bonds in benzene)
    Aromatic,
}

impl BondOrder {
    /// Integer code used by MDL and CJSON (`1`, `2`, `3`, `4` for aromatic,
    /// `0` when unknown).
    pub fn code(self) -> u8 {
        match self {
            BondOrder::Unknown => 0,
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            1 => BondOrder::Single,
            2 => BondOrder::Double,
            3 => BondOrder::Triple,
            4 => BondOrder::Aromatic,
            _ => BondOrder::Unknown,
        }
    }
}

/// A bond between two atoms of the same molecule. The atom indices are
/// stored sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bond {
    data: [usize; 2],
    pub order: BondOrder,
}

impl PartialOrd for BondOrder {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BondOrder {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

impl Index<usize> for Bond {
    type Output = usize;

    /// Access one of the two atom indices in the bond.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 2`.
    fn index(&self, index: usize) -> &Self::Output {
        if index >= 2 {
            panic!("can not access atom n° {} in bond", index);
        }
        &self.data[index]
    }
}

impl Bond {
    /// Create a new bond between `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if `i == j`.
    pub fn new(i: usize, j: usize, order: BondOrder) -> Self {
        if i == j {
            panic!("can not have a bond between an atom and itself");
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        Bond { data: [a, b], order }
    }

    pub fn atoms(&self) -> [usize; 2] {
        self.data
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.data[0] == atom || self.data[1] == atom
    }

    /// The other end of the bond, if `atom` is one of its ends.
    pub fn partner(&self, atom: usize) -> Option<usize> {
        if self.data[0] == atom {
            Some(self.data[1])
        } else if self.data[1] == atom {
            Some(self.data[0])
        } else {
            None
        }
    }

    pub(crate) fn remap(&mut self, i: usize, j: usize) {
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.data = [a, b];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order() {
        let bond = Bond::new(5, 2, BondOrder::Double);
        assert_eq!(bond[0], 2);
        assert_eq!(bond[1], 5);
        assert_eq!(bond.atoms(), [2, 5]);
        assert_eq!(bond.partner(2), Some(5));
        assert_eq!(bond.partner(3), None);
        assert!(bond.contains(5));
    }

    #[test]
    #[should_panic(expected = "can not have a bond between an atom and itself")]
    fn self_bond() {
        let _ = Bond::new(1, 1, BondOrder::Single);
    }

    #[test]
    #[should_panic(expected = "can not access atom n° 2 in bond")]
    fn out_of_bounds_index() {
        let bond = Bond::new(0, 1, BondOrder::Single);
        let _ = bond[2];
    }

    #[test]
    fn codes() {
        for order in [
            BondOrder::Single,
            BondOrder::Double,
            BondOrder::Triple,
            BondOrder::Aromatic,
        ] {
            assert_eq!(BondOrder::from_code(order.code() as i64), order);
        }
        assert_eq!(BondOrder::from_code(8), BondOrder::Unknown);
        assert_eq!(BondOrder::Unknown.code(), 0);
    }
}
