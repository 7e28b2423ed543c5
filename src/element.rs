// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2025 William Bro-Jørgensen
// Copyright (c) 2020 Guillaume Fraux and contributors
//
// See LICENSE at the project root for full text.

use std::collections::{BTreeMap, HashMap};

use phf::phf_map;

use crate::error::CError;
use crate::units::{is_custom_element, CUSTOM_ELEMENT_COUNT, CUSTOM_ELEMENT_MIN};

/// Maps custom atomic numbers (128–254) to human readable labels.
pub type CustomElementMap = BTreeMap<u8, String>;

/// Element symbols indexed by atomic number, `Xx` being the dummy element 0.
pub const SYMBOLS: [&str; 119] = [
    "Xx", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si",
    "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni",
    "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo",
    "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba",
    "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po",
    "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf",
    "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Lower-case element symbol to atomic number.
static SYMBOL_TO_NUMBER: phf::Map<&'static str, u8> = phf_map! {
    "xx" => 0,
    "h" => 1,
    "he" => 2,
    "li" => 3,
    "be" => 4,
    "b" => 5,
    "c" => 6,
    "n" => 7,
    "o" => 8,
    "f" => 9,
    "ne" => 10,
    "na" => 11,
    "mg" => 12,
    "al" => 13,
    "si" => 14,
    "p" => 15,
    "s" => 16,
    "cl" => 17,
    "ar" => 18,
    "k" => 19,
    "ca" => 20,
    "sc" => 21,
    "ti" => 22,
    "v" => 23,
    "cr" => 24,
    "mn" => 25,
    "fe" => 26,
    "co" => 27,
    "ni" => 28,
    "cu" => 29,
    "zn" => 30,
    "ga" => 31,
    "ge" => 32,
    "as" => 33,
    "se" => 34,
    "br" => 35,
    "kr" => 36,
    "rb" => 37,
    "sr" => 38,
    "y" => 39,
    "zr" => 40,
    "nb" => 41,
    "mo" => 42,
    "tc" => 43,
    "ru" => 44,
    "rh" => 45,
    "pd" => 46,
    "ag" => 47,
    "cd" => 48,
    "in" => 49,
    "sn" => 50,
    "sb" => 51,
    "te" => 52,
    "i" => 53,
    "xe" => 54,
    "cs" => 55,
    "ba" => 56,
    "la" => 57,
    "ce" => 58,
    "pr" => 59,
    "nd" => 60,
    "pm" => 61,
    "sm" => 62,
    "eu" => 63,
    "gd" => 64,
    "tb" => 65,
    "dy" => 66,
    "ho" => 67,
    "er" => 68,
    "tm" => 69,
    "yb" => 70,
    "lu" => 71,
    "hf" => 72,
    "ta" => 73,
    "w" => 74,
    "re" => 75,
    "os" => 76,
    "ir" => 77,
    "pt" => 78,
    "au" => 79,
    "hg" => 80,
    "tl" => 81,
    "pb" => 82,
    "bi" => 83,
    "po" => 84,
    "at" => 85,
    "rn" => 86,
    "fr" => 87,
    "ra" => 88,
    "ac" => 89,
    "th" => 90,
    "pa" => 91,
    "u" => 92,
    "np" => 93,
    "pu" => 94,
    "am" => 95,
    "cm" => 96,
    "bk" => 97,
    "cf" => 98,
    "es" => 99,
    "fm" => 100,
    "md" => 101,
    "no" => 102,
    "lr" => 103,
    "rf" => 104,
    "db" => 105,
    "sg" => 106,
    "bh" => 107,
    "hs" => 108,
    "mt" => 109,
    "ds" => 110,
    "rg" => 111,
    "cn" => 112,
    "nh" => 113,
    "fl" => 114,
    "mc" => 115,
    "lv" => 116,
    "ts" => 117,
    "og" => 118,
};

/// Symbol of a real element, `None` for custom or invalid atomic numbers.
pub fn symbol(atomic_number: u8) -> Option<&'static str> {
    SYMBOLS.get(atomic_number as usize).copied()
}

/// Case-insensitive symbol lookup, `None` when `symbol` is not an element.
pub fn atomic_number_from_symbol(symbol: &str) -> Option<u8> {
    let lower = symbol.trim().to_ascii_lowercase();
    SYMBOL_TO_NUMBER.get(lower.as_str()).copied()
}

/// Hands out custom element codes from the reserved range.
///
/// Codes are assigned in the order labels are first seen; asking again for
/// a known label returns its code. Once the 127 reserved codes are used up
/// further new labels are rejected.
#[derive(Debug, Default, Clone)]
pub struct CustomElementPool {
    codes: HashMap<String, u8>,
    map: CustomElementMap,
}

impl CustomElementPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn code_for(&mut self, label: &str) -> Result<u8, CError> {
        if let Some(&code) = self.codes.get(label) {
            return Ok(code);
        }
        let used = self.codes.len();
        if used >= CUSTOM_ELEMENT_COUNT {
            return Err(CError::CustomElementPoolExhausted {
                limit: CUSTOM_ELEMENT_COUNT,
            });
        }
        let code = CUSTOM_ELEMENT_MIN + used as u8;
        debug_assert!(is_custom_element(code));
        self.codes.insert(label.to_string(), code);
        self.map.insert(code, label.to_string());
        Ok(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn map(&self) -> &CustomElementMap {
        &self.map
    }

    pub fn into_map(self) -> CustomElementMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::units::CUSTOM_ELEMENT_MAX;

    #[test]
    fn lookup() {
        assert_eq!(symbol(1), Some("H"));
        assert_eq!(symbol(17), Some("Cl"));
        assert_eq!(symbol(118), Some("Og"));
        assert_eq!(symbol(0), Some("Xx"));
        assert_eq!(symbol(130), None);

        assert_eq!(atomic_number_from_symbol("cl"), Some(17));
        assert_eq!(atomic_number_from_symbol("CL"), Some(17));
        assert_eq!(atomic_number_from_symbol(" h "), Some(1));
        assert_eq!(atomic_number_from_symbol("Qq"), None);

        for (number, sym) in SYMBOLS.iter().enumerate() {
            assert_eq!(atomic_number_from_symbol(sym), Some(number as u8));
        }
    }

    #[test]
    fn pool_assigns_in_order() {
        let mut pool = CustomElementPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.code_for("Atom 0").unwrap(), 128);
        assert_eq!(pool.code_for("Atom 1").unwrap(), 129);
        assert_eq!(pool.code_for("Atom 0").unwrap(), 128);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.map()[&129], "Atom 1");
    }

    #[test]
    fn pool_exhaustion_is_an_error() {
        let mut pool = CustomElementPool::new();
        for i in 0..CUSTOM_ELEMENT_COUNT {
            let code = pool.code_for(&format!("Atom {i}")).unwrap();
            assert!(is_custom_element(code));
        }
        assert_eq!(pool.map().keys().last(), Some(&CUSTOM_ELEMENT_MAX));

        let error = pool.code_for("one too many").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Semantic);
        // existing labels still resolve
        assert_eq!(pool.code_for("Atom 3").unwrap(), 131);
    }
}
